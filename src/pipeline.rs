//! Runs one results document through every scoring stage.
//!
//!   rows → topic hits → weighted scores → groups → evidence
//!
//! Nothing is written here; the caller gets a `PipelineOutput` only when
//! every row has been processed.

use std::collections::BTreeMap;

use score_types::{ResultsKind, RunSummary, TopicSummary};
use tracing::{debug, error, info, warn};

use crate::aggregate::{Aggregation, aggregate};
use crate::config::ScoringConfig;
use crate::error::ScoreError;
use crate::evidence::{EvidenceTable, select_evidence};
use crate::markup::{self, Element, MarkupError};
use crate::matcher::{ExtractionMatcher, TopicHits, topics_from_properties};
use crate::normalize::normalize_annotations;
use crate::table::InputTable;
use crate::topics::{TopicScores, TopicVocabulary};
use crate::types::{
    COL_ANNOTATED, COL_EVENT_TYPE, COL_EXTRACTION, COL_PROPERTIES, COL_SENTENCE, ExpectedColumns,
    ExtractionRow, IdentityLayout,
};
use crate::weights::WeightPolicy;

/// Repair and parse one annotated sentence.
pub fn parse_annotation(raw: &str) -> Result<Element, MarkupError> {
    markup::parse(&normalize_annotations(raw))
}

/// Row-level counters gathered while matching and weighting.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct RowStats {
    pub matched: usize,
    pub unmatched: usize,
    pub negated: usize,
    pub unknown_topics: BTreeMap<String, usize>,
}

#[derive(Debug)]
pub struct PipelineOutput {
    pub layout: IdentityLayout,
    /// Weighted rows in input order
    pub rows: Vec<ExtractionRow>,
    pub aggregation: Aggregation,
    pub evidence: EvidenceTable,
    pub stats: RowStats,
}

pub struct Pipeline<'a> {
    config: &'a ScoringConfig,
    vocab: &'a TopicVocabulary,
    kind: ResultsKind,
}

impl<'a> Pipeline<'a> {
    pub fn new(config: &'a ScoringConfig, vocab: &'a TopicVocabulary, kind: ResultsKind) -> Self {
        Self {
            config,
            vocab,
            kind,
        }
    }

    pub fn run(&self, table: &InputTable) -> Result<PipelineOutput, ScoreError> {
        let expected = ExpectedColumns::for_kind(self.kind);
        let layout = self.layout(table, &expected)?;
        let mut rows = self.initialize(table, &expected, &layout);
        info!(rows = rows.len(), kind = self.kind.as_str(), "scoring document");

        // ── Topic hits ───────────────────────────────────────────────
        let matcher = ExtractionMatcher::new(&self.config.markers, self.vocab);
        let mut stats = RowStats::default();
        for row in &mut rows {
            let Some(hits) = self.hits(&matcher, row)? else {
                debug!(row = row.index, extraction = %row.extraction, "no matching span");
                stats.unmatched += 1;
                continue;
            };
            stats.matched += 1;
            if hits.is_empty() {
                debug!(row = row.index, "matched span carries no topics");
            }
            for &pos in &hits.known {
                row.scores.set(pos, 1.0);
            }
            for id in hits.unknown {
                *stats.unknown_topics.entry(id).or_default() += 1;
            }
        }
        for (topic, count) in &stats.unknown_topics {
            warn!(%topic, count, "topic not in vocabulary, ignored");
        }

        // ── Weighting ────────────────────────────────────────────────
        let policy = WeightPolicy::new(
            &self.config.weights,
            &self.config.event_labels,
            &self.config.markers,
        );
        for row in &mut rows {
            if policy.is_negated(&row.negation_source) {
                stats.negated += 1;
            }
            let class = policy.classify(&row.event_type);
            debug!(row = row.index, class = class.as_str(), "weighting");
            row.scores = policy.apply(&row.scores, &row.event_type, &row.negation_source);
        }

        // ── Aggregation and evidence ─────────────────────────────────
        let aggregation = aggregate(&rows, &layout);
        if aggregation.skipped_rows > 0 {
            warn!(
                rows = aggregation.skipped_rows,
                "rows with an empty grouping value left out of aggregation"
            );
        }
        info!(groups = aggregation.rows.len(), "aggregated");

        let evidence = select_evidence(&aggregation.rows, &rows, &layout);
        if evidence.fallbacks > 0 {
            debug!(
                cells = evidence.fallbacks,
                "evidence fell back to the whole sentence"
            );
        }
        info!(rows = evidence.rows.len(), "evidence selected");

        Ok(PipelineOutput {
            layout,
            rows,
            aggregation,
            evidence,
            stats,
        })
    }

    /// Every row whose annotation cannot be parsed, instead of stopping at
    /// the first. API documents carry no annotations and always pass.
    pub fn check(&self, table: &InputTable) -> Result<Vec<(usize, MarkupError)>, ScoreError> {
        let expected = ExpectedColumns::for_kind(self.kind);
        self.layout(table, &expected)?;
        if self.kind == ResultsKind::Api {
            return Ok(Vec::new());
        }
        let column = table.column(COL_ANNOTATED);
        let mut failures = Vec::new();
        for index in 0..table.len() {
            let raw = table.cell(index, column);
            if raw.trim().is_empty() {
                continue;
            }
            if let Err(e) = parse_annotation(raw) {
                failures.push((index, e));
            }
        }
        Ok(failures)
    }

    /// Summary of a finished run; `document` and `outputs` are filled by the caller.
    pub fn summary(&self, output: &PipelineOutput) -> RunSummary {
        let topics = self
            .vocab
            .presentation_order()
            .into_iter()
            .filter_map(|pos| {
                let values = output.aggregation.rows.iter().map(|r| r.scores.get(pos));
                let positive_groups = values.clone().filter(|&v| v > 0.0).count();
                let negative_groups = values.filter(|&v| v < 0.0).count();
                if positive_groups + negative_groups == 0 {
                    return None;
                }
                let evidence_rows = output
                    .evidence
                    .rows
                    .iter()
                    .filter(|r| r.evidence.get(pos).is_some_and(Option::is_some))
                    .count();
                Some(TopicSummary {
                    name: self.vocab.display_name(&self.vocab.ids()[pos]),
                    positive_groups,
                    negative_groups,
                    evidence_rows,
                })
            })
            .collect();

        RunSummary {
            kind: self.kind,
            rows: output.rows.len(),
            matched_rows: output.stats.matched,
            unmatched_rows: output.stats.unmatched,
            negated_rows: output.stats.negated,
            unknown_topics: output.stats.unknown_topics.clone(),
            dropped_columns: output.layout.dropped.clone(),
            skipped_rows: output.aggregation.skipped_rows,
            groups: output.aggregation.rows.len(),
            evidence_rows: output.evidence.rows.len(),
            evidence_fallbacks: output.evidence.fallbacks,
            topics,
            ..RunSummary::default()
        }
    }

    // ── Stages ───────────────────────────────────────────────────────

    fn layout(
        &self,
        table: &InputTable,
        expected: &ExpectedColumns,
    ) -> Result<IdentityLayout, ScoreError> {
        if let Some(missing) = expected.required.iter().find(|c| table.column(c).is_none()) {
            error!(column = %missing, "required column missing");
            return Err(ScoreError::MissingColumn(missing.to_string()));
        }
        let layout = IdentityLayout::resolve(expected, &table.headers);
        for column in &layout.dropped {
            warn!(%column, "identity column missing, dropped from the grouping key");
        }
        Ok(layout)
    }

    /// One row per record, every topic score zeroed.
    fn initialize(
        &self,
        table: &InputTable,
        expected: &ExpectedColumns,
        layout: &IdentityLayout,
    ) -> Vec<ExtractionRow> {
        let identity_cols: Vec<Option<usize>> =
            layout.projection.iter().map(|c| table.column(c)).collect();
        let signal_col = match self.kind {
            ResultsKind::Batch => table.column(COL_ANNOTATED),
            ResultsKind::Api => table.column(COL_PROPERTIES),
        };
        let event_type = table.column(COL_EVENT_TYPE);
        let extraction = table.column(COL_EXTRACTION);
        let sentence = table.column(COL_SENTENCE);
        let negation = table.column(expected.negation_source);

        (0..table.len())
            .map(|i| ExtractionRow {
                index: i,
                identity: identity_cols
                    .iter()
                    .map(|&c| table.cell(i, c).to_string())
                    .collect(),
                event_type: table.cell(i, event_type).to_string(),
                extraction: table.cell(i, extraction).to_string(),
                sentence: table.cell(i, sentence).to_string(),
                annotated: table.cell(i, signal_col).to_string(),
                negation_source: table.cell(i, negation).to_string(),
                scores: TopicScores::zeroed(self.vocab),
            })
            .collect()
    }

    fn hits(
        &self,
        matcher: &ExtractionMatcher,
        row: &ExtractionRow,
    ) -> Result<Option<TopicHits>, ScoreError> {
        match self.kind {
            ResultsKind::Batch => {
                if row.annotated.trim().is_empty() {
                    return Ok(None);
                }
                let tree = parse_annotation(&row.annotated).map_err(|source| {
                    error!(row = row.index, %source, "annotation cannot be parsed");
                    ScoreError::Parse {
                        row: row.index,
                        source,
                    }
                })?;
                Ok(matcher.match_span(&tree, &row.extraction))
            }
            ResultsKind::Api => {
                let topics = topics_from_properties(&row.annotated);
                if topics.is_empty() {
                    return Ok(None);
                }
                Ok(Some(matcher.resolve(topics)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ScoringConfig {
        ScoringConfig::from_json(r#"{"topics": ["topic_water", "topic_solar"]}"#).unwrap()
    }

    fn table(csv: &str) -> InputTable {
        InputTable::from_reader(csv.as_bytes()).unwrap()
    }

    const BATCH_HEADER: &str =
        "Main Company,Article Date,Event Type,Extraction,Sentence,Sentence(Inc. Annotations)\n";

    fn acme() -> InputTable {
        let rows = [
            "ACME,2019-01-01,OS IS Investment Objective,solar power,\
             The Fund seeks solar power exposure.,\
             \"<s>The Fund seeks <TRUEEVENT_IO prop_topic_solar=sentence>solar power</TRUEEVENT_IO> exposure.</s>\"",
            "ACME,2019-01-01,OS IS Catch_rule,solar,\
             It avoids solar.,\
             \"<s>It avoids <TRUEEVENT_C prop_topic_solar=sentence prop_negation_event=true>solar</TRUEEVENT_C>.</s>\"",
            "ACME,2019-01-01,OS IS Principle Strategy,clean water,\
             Markets rallied. It invests in clean water utilities.,\
             \"<s>Markets rallied. It invests in <TRUEEVENT_PS prop_topic_water=paragraph>clean water</TRUEEVENT_PS> utilities.</s>\"",
        ];
        table(&format!("{BATCH_HEADER}{}\n", rows.join("\n")))
    }

    #[test]
    fn test_end_to_end_acme() {
        let config = config();
        let vocab = config.vocabulary();
        let pipeline = Pipeline::new(&config, &vocab, ResultsKind::Batch);
        let out = pipeline.run(&acme()).unwrap();

        assert_eq!(out.rows[0].scores.values(), &[0.0, 1.0]);
        assert_eq!(out.rows[1].scores.values(), &[0.0, -0.03]);
        assert_eq!(out.rows[2].scores.values(), &[0.6, 0.0]);

        assert_eq!(out.aggregation.rows.len(), 1);
        let group = &out.aggregation.rows[0];
        assert_eq!(group.identity, vec!["ACME", "2019-01-01"]);
        assert_eq!(group.scores.values(), &[0.6, 1.0]);

        assert_eq!(out.evidence.rows.len(), 1);
        let evidence = &out.evidence.rows[0].evidence;
        assert_eq!(
            evidence[0].as_deref(),
            Some("It invests in clean water utilities.")
        );
        assert_eq!(
            evidence[1].as_deref(),
            Some("The Fund seeks solar power exposure.")
        );
        assert_eq!(out.stats.matched, 3);
        assert_eq!(out.stats.negated, 1);
    }

    #[test]
    fn test_summary_counts() {
        let config = config();
        let vocab = config.vocabulary();
        let pipeline = Pipeline::new(&config, &vocab, ResultsKind::Batch);
        let out = pipeline.run(&acme()).unwrap();
        let summary = pipeline.summary(&out);
        assert_eq!(summary.rows, 3);
        assert_eq!(summary.groups, 1);
        assert_eq!(summary.unmatched_rows, 0);
        let names: Vec<&str> = summary.topics.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["solar", "water"]);
        assert!(summary.topics.iter().all(|t| t.evidence_rows == 1));
    }

    #[test]
    fn test_unmatched_row_scores_zero() {
        let csv = format!(
            "{BATCH_HEADER}ACME,2019,OS IS short name,wind,Wind.,\"<s><TRUEEVENT_A prop_topic_solar=sentence>sun</TRUEEVENT_A></s>\"\n"
        );
        let config = config();
        let vocab = config.vocabulary();
        let out = Pipeline::new(&config, &vocab, ResultsKind::Batch)
            .run(&table(&csv))
            .unwrap();
        assert!(out.rows[0].scores.is_all_zero());
        assert_eq!(out.stats.unmatched, 1);
        assert!(out.evidence.rows[0].evidence.iter().all(Option::is_none));
    }

    #[test]
    fn test_html_entities_and_stray_ampersands_parse() {
        assert!(
            parse_annotation(
                "<s>The Fund&rsquo;s <TRUEEVENT_A prop_topic_water=sentence>clean water</TRUEEVENT_A>&nbsp;focus.</s>"
            )
            .is_ok()
        );
        assert!(
            parse_annotation("<s>AT&T; buys <TRUEEVENT_A prop_topic_water=sentence>water</TRUEEVENT_A></s>")
                .is_ok()
        );
    }

    #[test]
    fn test_rows_with_html_entities_still_match() {
        let csv = format!(
            "{BATCH_HEADER}\
             ACME,2019,OS IS short name,clean water,The Fund's clean water focus.,\
             \"<s>The Fund&rsquo;s <TRUEEVENT_A prop_topic_water=sentence>clean water</TRUEEVENT_A>&nbsp;focus.</s>\"\n\
             ACME,2019,OS IS short name,AT&T; solar,AT&T; solar.,\
             \"<s>AT&T; buys <TRUEEVENT_B prop_topic_solar=sentence>AT&T; solar</TRUEEVENT_B>.</s>\"\n"
        );
        let config = config();
        let vocab = config.vocabulary();
        let out = Pipeline::new(&config, &vocab, ResultsKind::Batch)
            .run(&table(&csv))
            .unwrap();
        assert_eq!(out.stats.matched, 2);
        assert_eq!(out.rows[0].scores.values(), &[1.0, 0.0]);
        assert_eq!(out.rows[1].scores.values(), &[0.0, 1.0]);
    }

    #[test]
    fn test_unparseable_annotation_is_fatal_with_row() {
        let csv = format!(
            "{BATCH_HEADER}ACME,2019,OS IS short name,x,X.,<s>fine</s>\nACME,2019,OS IS short name,x,X.,<s><a></s>\n"
        );
        let config = config();
        let vocab = config.vocabulary();
        let err = Pipeline::new(&config, &vocab, ResultsKind::Batch)
            .run(&table(&csv))
            .unwrap_err();
        assert!(matches!(err, ScoreError::Parse { row: 1, .. }));
    }

    #[test]
    fn test_check_reports_every_bad_row() {
        let csv = format!(
            "{BATCH_HEADER}A,1,t,x,X.,<s><a></s>\nA,1,t,x,X.,<s>ok</s>\nA,1,t,x,X.,<s>a</s><t/>\n"
        );
        let config = config();
        let vocab = config.vocabulary();
        let failures = Pipeline::new(&config, &vocab, ResultsKind::Batch)
            .check(&table(&csv))
            .unwrap();
        let rows: Vec<usize> = failures.iter().map(|(row, _)| *row).collect();
        assert_eq!(rows, vec![0, 2]);
    }

    #[test]
    fn test_missing_content_column_is_fatal() {
        let csv = "Main Company,Article Date,Event Type,Extraction,Sentence\nA,1,t,x,X.\n";
        let config = config();
        let vocab = config.vocabulary();
        let err = Pipeline::new(&config, &vocab, ResultsKind::Batch)
            .run(&table(csv))
            .unwrap_err();
        assert!(matches!(err, ScoreError::MissingColumn(c) if c == COL_ANNOTATED));
    }

    #[test]
    fn test_missing_identity_column_degrades() {
        let csv = "Article Date,Event Type,Extraction,Sentence,Sentence(Inc. Annotations)\n\
                   2019,OS IS short name,sun,Sun.,\"<s><TRUEEVENT_A prop_topic_solar=sentence>sun</TRUEEVENT_A></s>\"\n";
        let config = config();
        let vocab = config.vocabulary();
        let pipeline = Pipeline::new(&config, &vocab, ResultsKind::Batch);
        let out = pipeline.run(&table(csv)).unwrap();
        assert_eq!(out.layout.dropped, vec!["Main Company"]);
        assert_eq!(out.aggregation.rows[0].scores.values(), &[0.0, 1.0]);
        assert_eq!(pipeline.summary(&out).dropped_columns, vec!["Main Company"]);
    }

    #[test]
    fn test_unknown_topics_are_counted() {
        let csv = format!(
            "{BATCH_HEADER}A,1,OS IS short name,sun,Sun.,\"<s><TRUEEVENT_A prop_topic_moon=sentence>sun</TRUEEVENT_A></s>\"\n"
        );
        let config = config();
        let vocab = config.vocabulary();
        let out = Pipeline::new(&config, &vocab, ResultsKind::Batch)
            .run(&table(&csv))
            .unwrap();
        assert_eq!(out.stats.unknown_topics.get("topic_moon"), Some(&1));
        assert!(out.rows[0].scores.is_all_zero());
    }

    #[test]
    fn test_api_kind_reads_properties() {
        let csv = "companyName,ticker,eventDate,Event Type,Extraction,Sentence,properties,eventName\n\
                   Acme Corp,ACM,2019,OS IS Investment Objective,water,Clean water.,\"[{'topic_water': 'sentence'}]\",OS IS\n\
                   Acme Corporation,ACM,2019,OS IS Catch_rule,sun,No sun.,\"[{'topic_solar': 'sentence'}]\",prop_negation_event\n";
        let config = config();
        let vocab = config.vocabulary();
        let out = Pipeline::new(&config, &vocab, ResultsKind::Api)
            .run(&table(csv))
            .unwrap();
        assert_eq!(out.aggregation.rows.len(), 1);
        let group = &out.aggregation.rows[0];
        assert_eq!(group.identity, vec!["Acme Corporation", "ACM", "2019"]);
        assert_eq!(group.scores.values(), &[1.0, -0.03]);
        assert_eq!(out.evidence.rows[0].evidence[1].as_deref(), Some("No sun."));
    }
}
