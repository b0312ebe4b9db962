//! Feature construction errors.

use thiserror::Error;

/// Errors raised while windowing, joining, scaling or splitting a segment.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum FeatureError {
    /// Segment too short for the requested lag order
    #[error("Insufficient history: need at least {required} weeks, got {actual}")]
    InsufficientHistory {
        /// Minimum number of rows (lag order + 1)
        required: usize,
        /// Rows available
        actual: usize,
    },

    /// Join and drop steps removed every row
    #[error("Empty segment: all {dropped} rows dropped while joining features")]
    EmptySegment {
        /// Rows removed by the join and drop steps
        dropped: usize,
    },

    /// Split leaves one side empty
    #[error("Insufficient rows for split: {rows} rows give boundary {boundary}")]
    InsufficientRows {
        /// Rows in the table
        rows: usize,
        /// Computed boundary index
        boundary: usize,
    },

    /// Table width does not match the fitted state
    #[error("Dimension mismatch: expected {expected} columns, got {actual}")]
    DimensionMismatch {
        /// Expected column count
        expected: usize,
        /// Actual column count
        actual: usize,
    },

    /// Fitting on a table with no rows
    #[error("Cannot fit on an empty table")]
    EmptyTable,

    /// Series has zero variance
    #[error("Series has zero variance")]
    ConstantSeries,

    /// Invalid parameter
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
}
