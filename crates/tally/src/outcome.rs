//! Per-segment results.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use tally_data::SegmentKey;
use tally_features::FeatureError;
use tally_models::{Evaluation, ModelError, SensitivityError, SensitivityValue};

/// Sensitivities of one named feature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedSensitivity {
    /// Feature name
    pub feature: String,
    /// Percent change at the most recent evaluation row
    pub overall: f64,
    /// Percent change at the most recent holiday row among the evaluation rows
    pub holiday: SensitivityValue,
}

/// Row accounting of one segment run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowCounts {
    /// Weeks in the raw segment
    pub segment: usize,
    /// Rows of the joined feature table
    pub features: usize,
    /// Leading weeks consumed by the lag window
    pub windowed: usize,
    /// Windowed rows dropped by the join
    pub dropped: usize,
    /// Training rows (the evaluation rows start here)
    pub boundary: usize,
}

/// Completed sensitivity analysis of one segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensitivityRecord {
    /// Segment
    pub key: SegmentKey,
    /// Regressor name
    pub model: String,
    /// Sensitivities, one per feature except the holiday flag, in column order
    pub sensitivities: Vec<NamedSensitivity>,
    /// Fit on the training rows, in sales units
    pub train: Evaluation,
    /// Fit on the evaluation rows, in sales units
    pub test: Evaluation,
    /// Row accounting
    pub rows: RowCounts,
}

impl SensitivityRecord {
    /// Sensitivity of the named feature.
    pub fn get(&self, feature: &str) -> Option<&NamedSensitivity> {
        self.sensitivities.iter().find(|s| s.feature == feature)
    }
}

/// Why a segment produced no record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SkipReason {
    /// Segment not present in the panel
    UnknownSegment,
    /// Too few weeks to build one lagged row
    InsufficientHistory {
        /// Minimum weeks required
        required: usize,
        /// Weeks available
        actual: usize,
    },
    /// Every row was dropped by the join
    EmptySegment {
        /// Rows dropped
        dropped: usize,
    },
    /// The split left the training or evaluation side empty
    InsufficientRows {
        /// Feature rows
        rows: usize,
        /// Split boundary
        boundary: usize,
    },
    /// A baseline prediction was exactly zero
    ZeroBaseline {
        /// Feature being perturbed
        feature: String,
    },
    /// The segment exceeded its time budget
    Timeout {
        /// Budget in milliseconds
        budget_ms: u64,
    },
    /// Fitting or predicting failed
    ModelFailure {
        /// Error message
        message: String,
    },
}

impl SkipReason {
    /// Short label, stable across segments, for grouping.
    pub const fn label(&self) -> &'static str {
        match self {
            Self::UnknownSegment => "unknown segment",
            Self::InsufficientHistory { .. } => "insufficient history",
            Self::EmptySegment { .. } => "empty segment",
            Self::InsufficientRows { .. } => "insufficient rows",
            Self::ZeroBaseline { .. } => "zero baseline",
            Self::Timeout { .. } => "timeout",
            Self::ModelFailure { .. } => "model failure",
        }
    }

    /// Map a sensitivity error, naming the perturbed feature.
    pub(crate) fn from_sensitivity(error: SensitivityError, names: &[String]) -> Self {
        match error {
            SensitivityError::ZeroBaseline { feature } => Self::ZeroBaseline {
                feature: names
                    .get(feature)
                    .cloned()
                    .unwrap_or_else(|| format!("column {feature}")),
            },
            other => Self::ModelFailure {
                message: other.to_string(),
            },
        }
    }
}

impl From<FeatureError> for SkipReason {
    fn from(error: FeatureError) -> Self {
        match error {
            FeatureError::InsufficientHistory { required, actual } => {
                Self::InsufficientHistory { required, actual }
            }
            FeatureError::EmptySegment { dropped } => Self::EmptySegment { dropped },
            FeatureError::InsufficientRows { rows, boundary } => {
                Self::InsufficientRows { rows, boundary }
            }
            other => Self::ModelFailure {
                message: other.to_string(),
            },
        }
    }
}

impl From<ModelError> for SkipReason {
    fn from(error: ModelError) -> Self {
        Self::ModelFailure {
            message: error.to_string(),
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownSegment => write!(f, "segment not in panel"),
            Self::InsufficientHistory { required, actual } => write!(
                f,
                "insufficient history: need {required} weeks, have {actual}"
            ),
            Self::EmptySegment { dropped } => {
                write!(f, "empty segment: all {dropped} rows dropped by the join")
            }
            Self::InsufficientRows { rows, boundary } => write!(
                f,
                "insufficient rows: boundary {boundary} leaves an empty side of {rows} rows"
            ),
            Self::ZeroBaseline { feature } => {
                write!(f, "zero baseline prediction while perturbing {feature}")
            }
            Self::Timeout { budget_ms } => write!(f, "timed out after {budget_ms} ms"),
            Self::ModelFailure { message } => write!(f, "model failure: {message}"),
        }
    }
}

/// Terminal state of one segment run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SegmentOutcome {
    /// Sensitivity record produced
    Completed(SensitivityRecord),
    /// Segment skipped
    Skipped {
        /// Segment
        key: SegmentKey,
        /// Reason
        reason: SkipReason,
    },
}

impl SegmentOutcome {
    /// Segment this outcome belongs to.
    pub const fn key(&self) -> SegmentKey {
        match self {
            Self::Completed(record) => record.key,
            Self::Skipped { key, .. } => *key,
        }
    }

    /// Whether a record was produced.
    pub const fn is_completed(&self) -> bool {
        matches!(self, Self::Completed(_))
    }

    /// Record, if completed.
    pub const fn record(&self) -> Option<&SensitivityRecord> {
        match self {
            Self::Completed(record) => Some(record),
            Self::Skipped { .. } => None,
        }
    }

    /// Skip reason, if skipped.
    pub const fn skip_reason(&self) -> Option<&SkipReason> {
        match self {
            Self::Completed(_) => None,
            Self::Skipped { reason, .. } => Some(reason),
        }
    }
}

impl fmt::Display for SegmentOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Completed(record) => write!(
                f,
                "{}: completed ({} features, test rmse {:.2})",
                record.key,
                record.sensitivities.len(),
                record.test.rmse
            ),
            Self::Skipped { key, reason } => write!(f, "{key}: skipped ({reason})"),
        }
    }
}

/// Which side of the split a forecast point falls on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SplitSide {
    /// Training prefix
    Train,
    /// Evaluation suffix
    Test,
}

impl SplitSide {
    /// Lowercase name.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Train => "train",
            Self::Test => "test",
        }
    }
}

/// One predicted week.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
    /// Target week
    pub week: NaiveDate,
    /// Side of the split
    pub side: SplitSide,
    /// Observed weekly sales
    pub actual: f64,
    /// Predicted weekly sales
    pub predicted: f64,
}

/// One-step forecast of a segment from its own lagged sales.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastReport {
    /// Segment
    pub key: SegmentKey,
    /// Regressor name
    pub model: String,
    /// Lag order used
    pub lag_order: usize,
    /// Training rows (the evaluation rows start here)
    pub boundary: usize,
    /// Every windowed week, in date order
    pub points: Vec<ForecastPoint>,
    /// Fit on the training rows
    pub train: Evaluation,
    /// Fit on the evaluation rows
    pub test: Evaluation,
}

impl ForecastReport {
    /// Points on one side of the split.
    pub fn side(&self, side: SplitSide) -> impl Iterator<Item = &ForecastPoint> {
        self.points.iter().filter(move |p| p.side == side)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tally_models::SensitivityError;

    #[test]
    fn test_feature_errors_map_to_reasons() {
        let reason = SkipReason::from(FeatureError::InsufficientHistory {
            required: 5,
            actual: 3,
        });
        assert_eq!(
            reason,
            SkipReason::InsufficientHistory {
                required: 5,
                actual: 3
            }
        );
        assert_eq!(reason.label(), "insufficient history");

        let reason = SkipReason::from(FeatureError::EmptyTable);
        assert!(matches!(reason, SkipReason::ModelFailure { .. }));
    }

    #[test]
    fn test_zero_baseline_names_feature() {
        let names = vec!["is_holiday".to_string(), "temperature".to_string()];
        let reason =
            SkipReason::from_sensitivity(SensitivityError::ZeroBaseline { feature: 1 }, &names);
        assert_eq!(
            reason,
            SkipReason::ZeroBaseline {
                feature: "temperature".to_string()
            }
        );
        assert_eq!(
            reason.to_string(),
            "zero baseline prediction while perturbing temperature"
        );
    }

    #[test]
    fn test_skipped_display() {
        let outcome = SegmentOutcome::Skipped {
            key: SegmentKey::new(2, 7),
            reason: SkipReason::Timeout { budget_ms: 250 },
        };
        assert_eq!(outcome.to_string(), "store 2 / dept 7: skipped (timed out after 250 ms)");
        assert!(!outcome.is_completed());
        assert_eq!(outcome.key(), SegmentKey::new(2, 7));
        assert!(outcome.record().is_none());
    }

    #[test]
    fn test_outcome_serializes_with_status_tag() {
        let outcome = SegmentOutcome::Skipped {
            key: SegmentKey::new(1, 1),
            reason: SkipReason::UnknownSegment,
        };
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["status"], "skipped");
        assert_eq!(json["reason"]["kind"], "unknown_segment");
    }
}
