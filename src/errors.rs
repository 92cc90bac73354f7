// src/errors.rs
use thiserror::Error;

/// Failures raised while scoring a single table. Every variant is fatal for the
/// table it came from; the batch driver decides whether the run continues.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ScoringError {
    #[error("required column '{column}' is missing from the table")]
    MissingField { column: String },

    /// `row` is the zero-based data row (header excluded).
    #[error("row {row}: column '{column}' holds non-numeric value '{value}'")]
    InvalidNumber {
        column: String,
        row: usize,
        value: String,
    },

    #[error("row {row}: summed distance {value} is negative, upstream distances must be non-negative")]
    NegativeDistance { row: usize, value: f64 },

    #[error("row {row}: expected {expected} fields, found {found}")]
    RaggedRow {
        row: usize,
        expected: usize,
        found: usize,
    },

    #[error("column '{column}' has {found} values but the table has {expected} rows")]
    ColumnLength {
        column: String,
        expected: usize,
        found: usize,
    },

    #[error("invalid sentinel distance: {0}")]
    InvalidSentinel(String),
}
