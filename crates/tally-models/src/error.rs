//! Model and sensitivity errors.

use thiserror::Error;

/// Errors raised while fitting or evaluating a regressor.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ModelError {
    /// `predict` called before a successful `fit`
    #[error("Model '{0}' has not been fitted")]
    NotFitted(String),

    /// Training set has no rows
    #[error("Cannot fit on an empty training set")]
    EmptyTrainingSet,

    /// Input shape does not match what the model expects
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Expected size
        expected: usize,
        /// Actual size
        actual: usize,
    },

    /// Numerical failure (non-finite weights, failed decomposition)
    #[error("Numerical error: {0}")]
    Numerical(String),

    /// Invalid parameter
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Fit stopped by a [`crate::CancelFlag`]
    #[error("Fit cancelled")]
    Cancelled,
}

/// Errors raised by the sensitivity analyzer.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SensitivityError {
    /// Baseline prediction is exactly zero, so a relative change is undefined
    #[error("Baseline prediction is zero for feature {feature}")]
    ZeroBaseline {
        /// Feature being perturbed
        feature: usize,
    },

    /// No rows to take a baseline from
    #[error("No rows available for sensitivity analysis")]
    EmptyRows,

    /// Feature index outside the row width
    #[error("Feature index {index} out of range for {width} columns")]
    FeatureOutOfRange {
        /// Requested column
        index: usize,
        /// Row width
        width: usize,
    },

    /// Prediction failed
    #[error("Model error: {0}")]
    Model(#[from] ModelError),
}
