//! Batch summary.
//!
//! Aggregates flat [`SensitivityExport`] rows into segment counts, skip
//! reasons and per-feature mean sensitivities for terminal or Markdown
//! display.

use crate::export::SensitivityExport;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Mean sensitivity of one feature across completed segments.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FeatureAverage {
    /// Feature name.
    pub feature: String,

    /// Mean overall sensitivity, in percent.
    pub mean_overall_pct: f64,

    /// Mean holiday sensitivity over segments that had holiday rows.
    pub mean_holiday_pct: Option<f64>,

    /// Number of segments contributing.
    pub segments: usize,
}

/// Summary of one batch run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BatchSummary {
    /// Segments requested.
    pub total: usize,

    /// Segments that produced a sensitivity profile.
    pub completed: usize,

    /// Segments that were skipped.
    pub skipped: usize,

    /// Skipped segments per reason.
    pub skip_reasons: BTreeMap<String, usize>,

    /// Per-feature averages, ordered by descending mean absolute overall sensitivity.
    pub features: Vec<FeatureAverage>,
}

impl BatchSummary {
    /// Build a summary from export rows.
    pub fn from_rows(rows: &[SensitivityExport]) -> Self {
        let mut completed_keys = BTreeSet::new();
        let mut skipped_keys = BTreeSet::new();
        let mut skip_reasons: BTreeMap<String, usize> = BTreeMap::new();
        // feature -> (overall values, holiday values)
        let mut by_feature: BTreeMap<&str, (Vec<f64>, Vec<f64>)> = BTreeMap::new();

        for row in rows {
            let key = (row.store, row.department);
            if row.is_completed() {
                completed_keys.insert(key);
                if let (Some(feature), Some(overall)) = (row.feature.as_deref(), row.overall_pct) {
                    let entry = by_feature.entry(feature).or_default();
                    entry.0.push(overall);
                    if let Some(holiday) = row.holiday_pct {
                        entry.1.push(holiday);
                    }
                }
            } else if skipped_keys.insert(key) {
                let reason = row.reason.clone().unwrap_or_else(|| "unknown".to_string());
                *skip_reasons.entry(reason).or_insert(0) += 1;
            }
        }

        let mut features: Vec<FeatureAverage> = by_feature
            .into_iter()
            .map(|(feature, (overall, holiday))| FeatureAverage {
                feature: feature.to_string(),
                mean_overall_pct: mean(&overall).unwrap_or(0.0),
                mean_holiday_pct: mean(&holiday),
                segments: overall.len(),
            })
            .collect();
        features.sort_by(|a, b| {
            b.mean_overall_pct
                .abs()
                .total_cmp(&a.mean_overall_pct.abs())
        });

        Self {
            total: completed_keys.len() + skipped_keys.len(),
            completed: completed_keys.len(),
            skipped: skipped_keys.len(),
            skip_reasons,
            features,
        }
    }

    /// Fraction of segments that completed.
    pub fn completion_ratio(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.completed as f64 / self.total as f64
    }

    /// Format as ASCII table for terminal display.
    pub fn to_ascii_table(&self) -> String {
        let mut output = String::new();

        output.push_str("\nBatch Summary\n");
        output.push_str(&"=".repeat(72));
        output.push('\n');
        output.push_str(&format!("  Segments:   {}\n", self.total));
        output.push_str(&format!(
            "  Completed:  {} ({:.1}%)\n",
            self.completed,
            self.completion_ratio() * 100.0
        ));
        output.push_str(&format!("  Skipped:    {}\n", self.skipped));

        for (reason, count) in &self.skip_reasons {
            output.push_str(&format!("    {reason:<28} {count:>6}\n"));
        }

        if !self.features.is_empty() {
            output.push_str("\nMean Sensitivities:\n");
            output.push_str(&"-".repeat(72));
            output.push('\n');
            output.push_str(&format!(
                "{:<24} {:>14} {:>14} {:>10}\n",
                "Feature", "Overall %", "Holiday %", "Segments"
            ));
            output.push_str(&"-".repeat(72));
            output.push('\n');

            for f in &self.features {
                let holiday = f
                    .mean_holiday_pct
                    .map_or_else(|| "n/a".to_string(), |h| format!("{h:.4}"));
                output.push_str(&format!(
                    "{:<24} {:>14.4} {:>14} {:>10}\n",
                    f.feature, f.mean_overall_pct, holiday, f.segments
                ));
            }
        }

        output.push_str(&"=".repeat(72));
        output.push('\n');

        output
    }

    /// Format as Markdown for documentation.
    pub fn to_markdown(&self) -> String {
        let mut output = String::new();

        output.push_str("# Batch Summary\n\n");
        output.push_str(&format!("- **Segments:** {}\n", self.total));
        output.push_str(&format!(
            "- **Completed:** {} ({:.1}%)\n",
            self.completed,
            self.completion_ratio() * 100.0
        ));
        output.push_str(&format!("- **Skipped:** {}\n\n", self.skipped));

        if !self.skip_reasons.is_empty() {
            output.push_str("## Skip Reasons\n\n");
            output.push_str("| Reason | Segments |\n");
            output.push_str("|--------|----------|\n");
            for (reason, count) in &self.skip_reasons {
                output.push_str(&format!("| {reason} | {count} |\n"));
            }
            output.push('\n');
        }

        if !self.features.is_empty() {
            output.push_str("## Mean Sensitivities\n\n");
            output.push_str("| Feature | Overall % | Holiday % | Segments |\n");
            output.push_str("|---------|-----------|-----------|----------|\n");
            for f in &self.features {
                let holiday = f
                    .mean_holiday_pct
                    .map_or_else(|| "n/a".to_string(), |h| format!("{h:.4}"));
                output.push_str(&format!(
                    "| {} | {:.4} | {} | {} |\n",
                    f.feature, f.mean_overall_pct, holiday, f.segments
                ));
            }
        }

        output
    }
}

impl fmt::Display for BatchSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} segments: {} completed, {} skipped",
            self.total, self.completed, self.skipped
        )
    }
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows() -> Vec<SensitivityExport> {
        vec![
            SensitivityExport::feature(1, 1, "cpi", 1.0, Some(2.0)),
            SensitivityExport::feature(1, 1, "markdown_1", -6.0, None),
            SensitivityExport::feature(1, 2, "cpi", 3.0, None),
            SensitivityExport::feature(1, 2, "markdown_1", -2.0, Some(4.0)),
            SensitivityExport::skipped(2, 1, "insufficient history"),
            SensitivityExport::skipped(3, 9, "insufficient history"),
            SensitivityExport::skipped(4, 4, "zero baseline"),
        ]
    }

    #[test]
    fn test_counts() {
        let summary = BatchSummary::from_rows(&rows());
        assert_eq!(summary.total, 5);
        assert_eq!(summary.completed, 2);
        assert_eq!(summary.skipped, 3);
        assert_eq!(summary.skip_reasons["insufficient history"], 2);
        assert_eq!(summary.skip_reasons["zero baseline"], 1);
        assert!((summary.completion_ratio() - 0.4).abs() < 1e-12);
    }

    #[test]
    fn test_feature_averages_sorted_by_magnitude() {
        let summary = BatchSummary::from_rows(&rows());
        assert_eq!(summary.features[0].feature, "markdown_1");
        assert_eq!(summary.features[0].mean_overall_pct, -4.0);
        assert_eq!(summary.features[0].mean_holiday_pct, Some(4.0));
        assert_eq!(summary.features[1].feature, "cpi");
        assert_eq!(summary.features[1].mean_overall_pct, 2.0);
        assert_eq!(summary.features[1].segments, 2);
    }

    #[test]
    fn test_empty_batch() {
        let summary = BatchSummary::from_rows(&[]);
        assert_eq!(summary.total, 0);
        assert_eq!(summary.completion_ratio(), 0.0);
        assert!(summary.features.is_empty());
    }

    #[test]
    fn test_ascii_table() {
        let table = BatchSummary::from_rows(&rows()).to_ascii_table();
        assert!(table.contains("Batch Summary"));
        assert!(table.contains("Completed:  2 (40.0%)"));
        assert!(table.contains("insufficient history"));
        assert!(table.contains("markdown_1"));
    }

    #[test]
    fn test_markdown() {
        let markdown = BatchSummary::from_rows(&rows()).to_markdown();
        assert!(markdown.contains("# Batch Summary"));
        assert!(markdown.contains("| zero baseline | 1 |"));
        assert!(markdown.contains("| cpi | 2.0000 | 2.0000 | 2 |"));
    }

    #[test]
    fn test_display() {
        let summary = BatchSummary::from_rows(&rows());
        assert_eq!(summary.to_string(), "5 segments: 2 completed, 3 skipped");
    }
}
