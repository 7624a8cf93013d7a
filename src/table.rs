//! CSV input table and the three output renderings.
//!
//! Outputs are rendered into memory; the caller writes them to disk only
//! after the whole pipeline has succeeded.

use std::fs::File;
use std::io;
use std::path::Path;

use csv::{QuoteStyle, ReaderBuilder, WriterBuilder};

use crate::error::ScoreError;
use crate::topics::{TopicVocabulary, format_score};
use crate::types::{AggregatedRow, ExtractionRow, IdentityLayout};

// ── Input ────────────────────────────────────────────────────────────

/// The raw input document: header plus string cells.
#[derive(Debug, Clone, Default)]
pub struct InputTable {
    pub headers: Vec<String>,
    pub records: Vec<Vec<String>>,
}

impl InputTable {
    pub fn read_path(path: &Path) -> Result<Self, ScoreError> {
        let file = File::open(path).map_err(|source| ScoreError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_reader(file).map_err(|source| ScoreError::Csv {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_reader<R: io::Read>(reader: R) -> Result<Self, csv::Error> {
        let mut reader = ReaderBuilder::new().flexible(true).from_reader(reader);
        let headers = reader.headers()?.iter().map(String::from).collect();
        let mut records = Vec::new();
        for record in reader.records() {
            records.push(record?.iter().map(String::from).collect());
        }
        Ok(Self { headers, records })
    }

    pub fn column(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    /// Cell text, empty when the row is short or the column is absent.
    pub fn cell(&self, row: usize, column: Option<usize>) -> &str {
        column
            .and_then(|c| self.records.get(row)?.get(c))
            .map(String::as_str)
            .unwrap_or("")
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }
}

// ── Output ───────────────────────────────────────────────────────────

fn writer() -> csv::Writer<Vec<u8>> {
    WriterBuilder::new()
        .quote_style(QuoteStyle::Always)
        .flexible(true)
        .from_writer(Vec::new())
}

fn finish(writer: csv::Writer<Vec<u8>>) -> Result<Vec<u8>, csv::Error> {
    writer
        .into_inner()
        .map_err(|e| csv::Error::from(e.into_error()))
}

/// Input columns followed by one score column per topic, in vocabulary order.
pub fn render_scored(
    table: &InputTable,
    rows: &[ExtractionRow],
    vocab: &TopicVocabulary,
) -> Result<Vec<u8>, csv::Error> {
    let mut w = writer();
    let mut header = table.headers.clone();
    header.extend(vocab.ids().iter().map(|id| vocab.display_name(id)));
    w.write_record(&header)?;

    for row in rows {
        let mut record: Vec<String> = (0..table.headers.len())
            .map(|c| table.cell(row.index, Some(c)).to_string())
            .collect();
        record.extend(row.scores.values().iter().map(|&v| format_score(v)));
        w.write_record(&record)?;
    }
    finish(w)
}

/// Identity columns followed by topic scores in presentation order.
pub fn render_aggregated(
    rows: &[AggregatedRow],
    layout: &IdentityLayout,
    vocab: &TopicVocabulary,
) -> Result<Vec<u8>, csv::Error> {
    let order = vocab.presentation_order();
    let mut w = writer();
    let mut header = layout.projection.clone();
    header.extend(order.iter().map(|&i| vocab.display_name(&vocab.ids()[i])));
    w.write_record(&header)?;

    for row in rows {
        let mut record = row.identity.clone();
        record.extend(order.iter().map(|&i| format_score(row.scores.get(i))));
        w.write_record(&record)?;
    }
    finish(w)
}

/// Aggregated scores plus a `<topic>_text` evidence column per topic.
pub fn render_evidence(
    rows: &[AggregatedRow],
    layout: &IdentityLayout,
    vocab: &TopicVocabulary,
) -> Result<Vec<u8>, csv::Error> {
    let order = vocab.presentation_order();
    let names: Vec<String> = order
        .iter()
        .map(|&i| vocab.display_name(&vocab.ids()[i]))
        .collect();

    let mut w = writer();
    let mut header = layout.projection.clone();
    header.extend(names.iter().cloned());
    header.extend(names.iter().map(|n| format!("{n}_text")));
    w.write_record(&header)?;

    for row in rows {
        let mut record = row.identity.clone();
        record.extend(order.iter().map(|&i| format_score(row.scores.get(i))));
        record.extend(
            order
                .iter()
                .map(|&i| row.evidence.get(i).cloned().flatten().unwrap_or_default()),
        );
        w.write_record(&record)?;
    }
    finish(w)
}
