use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

// ── Results kind ─────────────────────────────────────────────────────────

/// Which export flavour a results document comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultsKind {
    /// Batch export: topics come from inline annotations.
    #[default]
    Batch,
    /// API export: topics come from the `properties` column.
    Api,
}

impl ResultsKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Batch => "batch",
            Self::Api => "api",
        }
    }
}

// ── Per-topic summary ────────────────────────────────────────────────────

/// How one topic fared across the aggregated table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TopicSummary {
    /// Display name, e.g. "solar_energy"
    pub name: String,
    pub positive_groups: usize,
    pub negative_groups: usize,
    /// Groups that received evidence text for this topic
    pub evidence_rows: usize,
}

// ── Run summary ──────────────────────────────────────────────────────────

/// Statistics for one scored document, written next to the CSV artifacts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub document: String,
    pub kind: ResultsKind,
    pub rows: usize,
    pub matched_rows: usize,
    pub unmatched_rows: usize,
    pub negated_rows: usize,
    /// Topic attributes seen in the input but absent from the vocabulary
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub unknown_topics: BTreeMap<String, usize>,
    /// Identity columns that were missing and dropped from the grouping key
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dropped_columns: Vec<String>,
    /// Rows left out of aggregation because a grouping value was empty
    pub skipped_rows: usize,
    pub groups: usize,
    pub evidence_rows: usize,
    /// Evidence cells filled with the whole sentence
    pub evidence_fallbacks: usize,
    /// Only topics with at least one non-zero aggregated score
    pub topics: Vec<TopicSummary>,
    pub outputs: Vec<String>,
}
