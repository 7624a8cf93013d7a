use std::path::PathBuf;

use thiserror::Error;

use crate::markup::MarkupError;

#[derive(Debug, Error)]
pub enum ScoreError {
    /// An annotation that stays unparseable after repair. Fatal for the run.
    #[error("row {row}: annotation cannot be parsed: {source}")]
    Parse {
        row: usize,
        #[source]
        source: MarkupError,
    },

    #[error("required column missing: {0}")]
    MissingColumn(String),

    #[error("{path}: csv error: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{path}: invalid config: {source}")]
    Config {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}
