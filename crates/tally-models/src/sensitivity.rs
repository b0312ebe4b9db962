//! Sensitivity Analysis
//!
//! Finite-difference sensitivity of a fitted regressor's prediction to each
//! input feature. The baseline is the most recent row of the supplied table;
//! one feature is scaled by `1 + relative_delta` and the relative change of
//! the prediction is reported in percent:
//!
//! ```text
//! sensitivity = (f(x') - f(x)) / f(x) * 100
//! ```
//!
//! The holiday-restricted variant first keeps only rows whose holiday column
//! is at or above `holiday_threshold`, so the baseline is the most recent
//! holiday week.

use crate::error::SensitivityError;
use crate::regressor::Regressor;
use ndarray::{Array2, Axis, s};
use serde::{Deserialize, Serialize};

/// Configuration for the sensitivity analyzer
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SensitivityConfig {
    /// Relative perturbation applied to the feature (default: 0.1)
    pub relative_delta: f64,
    /// Minimum holiday-column value for a row to count as a holiday (default: 0.99)
    pub holiday_threshold: f64,
    /// Column holding the holiday flag (default: 0)
    pub holiday_column: usize,
}

impl Default for SensitivityConfig {
    fn default() -> Self {
        Self {
            relative_delta: 0.1,
            holiday_threshold: 0.99,
            holiday_column: 0,
        }
    }
}

/// Outcome of a holiday-restricted sensitivity.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "value")]
pub enum SensitivityValue {
    /// Relative change in percent
    Percent(f64),
    /// No row passed the holiday filter
    NoHolidayRows,
}

impl SensitivityValue {
    /// Percentage, if one was computed.
    pub const fn percent(&self) -> Option<f64> {
        match self {
            Self::Percent(p) => Some(*p),
            Self::NoHolidayRows => None,
        }
    }
}

/// Sensitivities of one feature.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureSensitivity {
    /// Feature column index
    pub feature: usize,
    /// Sensitivity at the most recent row
    pub overall: f64,
    /// Sensitivity at the most recent holiday row
    pub holiday: SensitivityValue,
}

/// Computes finite-difference sensitivities.
#[derive(Debug, Clone, Default)]
pub struct SensitivityAnalyzer {
    config: SensitivityConfig,
}

impl SensitivityAnalyzer {
    /// Create an analyzer with the given configuration.
    pub const fn new(config: SensitivityConfig) -> Self {
        Self { config }
    }

    /// Current configuration.
    pub const fn config(&self) -> &SensitivityConfig {
        &self.config
    }

    /// Percent change in prediction when `feature` of the last row of `rows`
    /// is scaled by `1 + relative_delta`.
    ///
    /// # Errors
    /// - [`SensitivityError::EmptyRows`] if `rows` is empty
    /// - [`SensitivityError::FeatureOutOfRange`] if `feature` is not a column
    /// - [`SensitivityError::ZeroBaseline`] if the baseline prediction is exactly zero
    /// - [`SensitivityError::Model`] if prediction fails
    pub fn sensitivity<R: Regressor + ?Sized>(
        &self,
        regressor: &R,
        rows: &Array2<f64>,
        feature: usize,
    ) -> Result<f64, SensitivityError> {
        let n = rows.nrows();
        if n == 0 {
            return Err(SensitivityError::EmptyRows);
        }
        if feature >= rows.ncols() {
            return Err(SensitivityError::FeatureOutOfRange {
                index: feature,
                width: rows.ncols(),
            });
        }

        let baseline_row = rows.slice(s![n - 1..n, ..]).to_owned();
        let mut perturbed_row = baseline_row.clone();
        perturbed_row[[0, feature]] *= 1.0 + self.config.relative_delta;

        let baseline = regressor.predict(&baseline_row)?[0];
        if baseline == 0.0 {
            return Err(SensitivityError::ZeroBaseline { feature });
        }
        let perturbed = regressor.predict(&perturbed_row)?[0];

        Ok((perturbed - baseline) / baseline * 100.0)
    }

    /// Rows whose holiday column is at or above the threshold, in order.
    pub fn holiday_rows(&self, rows: &Array2<f64>) -> Array2<f64> {
        let column = self.config.holiday_column;
        if column >= rows.ncols() {
            return Array2::zeros((0, rows.ncols()));
        }
        let keep: Vec<usize> = rows
            .axis_iter(Axis(0))
            .enumerate()
            .filter(|(_, row)| row[column] >= self.config.holiday_threshold)
            .map(|(i, _)| i)
            .collect();
        rows.select(Axis(0), &keep)
    }

    /// Sensitivity restricted to holiday rows.
    ///
    /// Returns [`SensitivityValue::NoHolidayRows`] when no row passes the filter.
    ///
    /// # Errors
    /// Same conditions as [`Self::sensitivity`], evaluated on the filtered rows.
    pub fn holiday_sensitivity<R: Regressor + ?Sized>(
        &self,
        regressor: &R,
        rows: &Array2<f64>,
        feature: usize,
    ) -> Result<SensitivityValue, SensitivityError> {
        let holidays = self.holiday_rows(rows);
        if holidays.nrows() == 0 {
            return Ok(SensitivityValue::NoHolidayRows);
        }
        self.sensitivity(regressor, &holidays, feature)
            .map(SensitivityValue::Percent)
    }

    /// Overall and holiday sensitivities for every column except the holiday flag.
    ///
    /// # Errors
    /// The first error from [`Self::sensitivity`] or [`Self::holiday_sensitivity`].
    pub fn profile<R: Regressor + ?Sized>(
        &self,
        regressor: &R,
        rows: &Array2<f64>,
    ) -> Result<Vec<FeatureSensitivity>, SensitivityError> {
        let profile = (0..rows.ncols())
            .filter(|j| *j != self.config.holiday_column)
            .map(|feature| {
                Ok(FeatureSensitivity {
                    feature,
                    overall: self.sensitivity(regressor, rows, feature)?,
                    holiday: self.holiday_sensitivity(regressor, rows, feature)?,
                })
            })
            .collect::<Result<Vec<_>, SensitivityError>>()?;

        tracing::trace!(features = profile.len(), rows = rows.nrows(), "sensitivity profile");

        Ok(profile)
    }
}
