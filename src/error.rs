//! Error types for batch loading and scoring

use thiserror::Error;

/// The batch columns do not line up with what the classifier was trained on.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SchemaError {
    #[error("batch has no columns")]
    NoColumns,

    #[error("missing feature columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),

    #[error("unexpected columns not known to the classifier: {}", .0.join(", "))]
    UnexpectedColumns(Vec<String>),

    #[error("feature columns out of order: expected [{}], found [{}]", .expected.join(", "), .found.join(", "))]
    ColumnOrder {
        expected: Vec<String>,
        found: Vec<String>,
    },

    #[error("row {row} has {found} fields, header has {expected}")]
    RaggedRow {
        row: usize,
        expected: usize,
        found: usize,
    },
}

/// Errors produced by the scoring pipeline.
#[derive(Debug, Error)]
pub enum ScoringError {
    #[error("schema error: {0}")]
    Schema(#[from] SchemaError),

    #[error("invalid value {value:?} in column '{column}' at row {row}")]
    InvalidFeature {
        column: String,
        row: usize,
        value: String,
    },

    #[error("normalizer returned {actual} values for {expected} rows of '{column}'")]
    Normalizer {
        column: String,
        expected: usize,
        actual: usize,
    },

    #[error("classifier {output} returned {actual} values for {expected} rows")]
    OutputShape {
        output: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("classifier probability {value} at row {row} is outside [0, 1]")]
    InvalidProbability { row: usize, value: f64 },

    #[error("classifier label {value} at row {row} is not binary")]
    InvalidLabel { row: usize, value: i64 },

    #[error("classifier failed: {0:#}")]
    Classifier(anyhow::Error),
}

impl ScoringError {
    /// Short label for metrics and logs
    pub fn kind(&self) -> &'static str {
        match self {
            ScoringError::Schema(_) => "schema",
            ScoringError::InvalidFeature { .. } => "invalid_feature",
            ScoringError::Normalizer { .. } => "normalizer",
            ScoringError::OutputShape { .. }
            | ScoringError::InvalidProbability { .. }
            | ScoringError::InvalidLabel { .. }
            | ScoringError::Classifier(_) => "classifier",
        }
    }
}

/// Errors produced while reading or writing a transaction CSV.
#[derive(Debug, Error)]
pub enum BatchError {
    #[error("failed to read batch: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("{0}")]
    Schema(#[from] SchemaError),
}
