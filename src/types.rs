use score_types::ResultsKind;

use crate::topics::TopicScores;

// ── Column names ───────────────────────────────────────────────────

pub const COL_MAIN_COMPANY: &str = "Main Company";
pub const COL_ARTICLE_DATE: &str = "Article Date";
pub const COL_COMPANY_NAME: &str = "companyName";
pub const COL_TICKER: &str = "ticker";
pub const COL_EVENT_DATE: &str = "eventDate";
pub const COL_EVENT_TYPE: &str = "Event Type";
pub const COL_EXTRACTION: &str = "Extraction";
pub const COL_SENTENCE: &str = "Sentence";
pub const COL_ANNOTATED: &str = "Sentence(Inc. Annotations)";
pub const COL_PROPERTIES: &str = "properties";
pub const COL_EVENT_NAME: &str = "eventName";

// ── Expected layout per results kind ───────────────────────────────

/// Columns a results kind expects, before checking them against a header.
#[derive(Debug, Clone)]
pub struct ExpectedColumns {
    /// Identity columns carried into the aggregated table, in output order
    pub projection: &'static [&'static str],
    /// Subset of `projection` forming the grouping key, in sort order
    pub grouping: &'static [&'static str],
    /// Column identifying an entity for evidence selection
    pub entity: &'static str,
    /// Content columns the pipeline cannot run without
    pub required: &'static [&'static str],
    /// Column whose text is searched for the negation marker
    pub negation_source: &'static str,
}

impl ExpectedColumns {
    pub fn for_kind(kind: ResultsKind) -> Self {
        match kind {
            ResultsKind::Batch => Self {
                projection: &[COL_MAIN_COMPANY, COL_ARTICLE_DATE],
                grouping: &[COL_MAIN_COMPANY, COL_ARTICLE_DATE],
                entity: COL_MAIN_COMPANY,
                required: &[COL_EVENT_TYPE, COL_EXTRACTION, COL_SENTENCE, COL_ANNOTATED],
                negation_source: COL_ANNOTATED,
            },
            ResultsKind::Api => Self {
                projection: &[COL_COMPANY_NAME, COL_TICKER, COL_EVENT_DATE],
                grouping: &[COL_TICKER, COL_EVENT_DATE],
                entity: COL_TICKER,
                required: &[
                    COL_EVENT_TYPE,
                    COL_EXTRACTION,
                    COL_SENTENCE,
                    COL_PROPERTIES,
                    COL_EVENT_NAME,
                ],
                negation_source: COL_EVENT_NAME,
            },
        }
    }
}

/// Identity layout after missing columns have been dropped.
#[derive(Debug, Clone, PartialEq)]
pub struct IdentityLayout {
    /// Identity columns present in the input, in output order
    pub projection: Vec<String>,
    /// Positions in `projection` forming the grouping key
    pub grouping: Vec<usize>,
    /// Position in `projection` of the entity column
    pub entity: Option<usize>,
    /// Expected identity columns absent from the input
    pub dropped: Vec<String>,
}

impl IdentityLayout {
    /// Keep the expected identity columns that `headers` contains.
    pub fn resolve(expected: &ExpectedColumns, headers: &[String]) -> Self {
        let present = |name: &str| headers.iter().any(|h| h == name);

        let projection: Vec<String> = expected
            .projection
            .iter()
            .filter(|c| present(c))
            .map(|c| c.to_string())
            .collect();
        let dropped: Vec<String> = expected
            .projection
            .iter()
            .filter(|c| !present(c))
            .map(|c| c.to_string())
            .collect();
        let position = |name: &str| projection.iter().position(|p| p == name);
        let grouping: Vec<usize> = expected.grouping.iter().filter_map(|c| position(c)).collect();
        let entity = position(expected.entity).or_else(|| grouping.first().copied());

        Self {
            projection,
            grouping,
            entity,
            dropped,
        }
    }
}

// ── Rows ───────────────────────────────────────────────────────────

/// One extraction moving through the pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractionRow {
    /// Zero-based data row in the input document
    pub index: usize,
    /// Values of the identity projection, aligned with `IdentityLayout::projection`
    pub identity: Vec<String>,
    pub event_type: String,
    pub extraction: String,
    pub sentence: String,
    /// Text carrying the topic signal: the annotated sentence (batch)
    /// or the `properties` cell (api)
    pub annotated: String,
    /// Text searched for the negation marker
    pub negation_source: String,
    pub scores: TopicScores,
}

impl ExtractionRow {
    pub fn key(&self, layout: &IdentityLayout) -> Vec<String> {
        layout
            .grouping
            .iter()
            .map(|&i| self.identity.get(i).cloned().unwrap_or_default())
            .collect()
    }

    pub fn entity(&self, layout: &IdentityLayout) -> &str {
        layout
            .entity
            .and_then(|i| self.identity.get(i))
            .map(String::as_str)
            .unwrap_or("")
    }
}

/// One row per grouping key.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregatedRow {
    pub identity: Vec<String>,
    pub scores: TopicScores,
    /// Evidence text per vocabulary position; only set for non-zero scores
    pub evidence: Vec<Option<String>>,
}

impl AggregatedRow {
    pub fn entity(&self, layout: &IdentityLayout) -> &str {
        layout
            .entity
            .and_then(|i| self.identity.get(i))
            .map(String::as_str)
            .unwrap_or("")
    }
}
