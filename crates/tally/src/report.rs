//! Conversion of pipeline results into flat export rows.

use crate::outcome::{ForecastReport, SegmentOutcome};
use tally_output::{BatchSummary, ForecastPointExport, SensitivityExport};

impl SegmentOutcome {
    /// One row per feature when completed, one row carrying the reason when skipped.
    pub fn to_exports(&self) -> Vec<SensitivityExport> {
        match self {
            Self::Completed(record) => record
                .sensitivities
                .iter()
                .map(|s| {
                    SensitivityExport::feature(
                        record.key.store,
                        record.key.department,
                        s.feature.clone(),
                        s.overall,
                        s.holiday.percent(),
                    )
                })
                .collect(),
            Self::Skipped { key, reason } => vec![SensitivityExport::skipped(
                key.store,
                key.department,
                reason.label(),
            )],
        }
    }
}

/// Flatten a batch into export rows, keeping outcome order.
pub fn batch_exports(outcomes: &[SegmentOutcome]) -> Vec<SensitivityExport> {
    outcomes.iter().flat_map(SegmentOutcome::to_exports).collect()
}

/// Summarise a batch.
pub fn batch_summary(outcomes: &[SegmentOutcome]) -> BatchSummary {
    BatchSummary::from_rows(&batch_exports(outcomes))
}

impl ForecastReport {
    /// One row per forecast week.
    pub fn to_exports(&self) -> Vec<ForecastPointExport> {
        self.points
            .iter()
            .map(|p| ForecastPointExport::new(p.week, p.side.name(), p.actual, p.predicted))
            .collect()
    }
}
