//! Error types for panel operations.

use chrono::NaiveDate;
use thiserror::Error;

/// Result type for panel operations.
pub type Result<T> = std::result::Result<T, DataError>;

/// Errors that can occur while loading or assembling the panel.
#[derive(Debug, Error)]
pub enum DataError {
    /// Two rows share the same (store, department, week) key
    #[error("Duplicate row for store {store}, department {department}, week {week}")]
    DuplicateRow {
        /// Store id
        store: u32,
        /// Department id
        department: u32,
        /// Week date
        week: NaiveDate,
    },

    /// A date cell could not be parsed
    #[error("Invalid date '{0}' (expected dd/mm/YYYY or YYYY-mm-dd)")]
    InvalidDate(String),

    /// A store type outside A/B/C
    #[error("Unknown store type: {0}")]
    UnknownStoreType(String),

    /// A required cell was empty after the merge
    #[error("Missing value in column '{column}' at row {row}")]
    MissingValue {
        /// Column name
        column: String,
        /// Zero-based row index in the merged table
        row: usize,
    },

    /// A value did not fit the target integer type
    #[error("Value out of range in column '{column}': {value}")]
    OutOfRange {
        /// Column name
        column: String,
        /// Offending value
        value: i64,
    },

    /// Data parsing error
    #[error("Data parsing error: {0}")]
    Parse(String),

    /// Polars error
    #[error("Polars error: {0}")]
    Polars(#[from] polars::prelude::PolarsError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
