//! Terminal rendering of command results.
//!
//! Each view is a [`fmt::Display`] wrapper; the public functions render it to
//! a `String`.

use clap::ValueEnum;
use std::collections::BTreeMap;
use std::fmt;
use tally::data::SegmentKey;
use tally::regressors::{Evaluation, SensitivityValue};
use tally::{ForecastReport, SensitivityRecord, SplitSide};

const RULE: &str = "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━";

/// Output format for result-producing commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    /// Human-readable tables
    Text,
    /// Compact JSON
    Json,
    /// Pretty-printed JSON
    PrettyJson,
    /// Comma-separated values
    Csv,
    /// Markdown (batch summary only)
    Markdown,
}

fn banner(f: &mut impl fmt::Write, title: &str) -> fmt::Result {
    writeln!(f, "\n╔══════════════════════════════════════════════════════════════╗")?;
    writeln!(f, "║{title:^62}║")?;
    writeln!(f, "╚══════════════════════════════════════════════════════════════╝\n")
}

fn section(f: &mut impl fmt::Write, title: &str) -> fmt::Result {
    writeln!(f, "{RULE}")?;
    writeln!(f, "{title}")?;
    writeln!(f, "{RULE}\n")
}

fn evaluation_line(f: &mut impl fmt::Write, label: &str, eval: &Evaluation) -> fmt::Result {
    let correlation = eval
        .correlation
        .map_or_else(|| "n/a".to_string(), |r| format!("{r:.4}"));
    writeln!(
        f,
        "  {label:<6} corr {correlation:>8}   MAE {:>12.2}   RMSE {:>12.2}",
        eval.mae, eval.rmse
    )
}

struct LengthsView<'a> {
    lengths: &'a BTreeMap<SegmentKey, usize>,
    top: usize,
}

impl fmt::Display for LengthsView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut counts: BTreeMap<usize, usize> = BTreeMap::new();
        for length in self.lengths.values() {
            *counts.entry(*length).or_insert(0) += 1;
        }
        let mut counts: Vec<(usize, usize)> = counts.into_iter().collect();
        counts.sort_by(|a, b| b.1.cmp(&a.1).then(b.0.cmp(&a.0)));

        writeln!(f, "Segments: {}\n", self.lengths.len())?;
        writeln!(f, "{:>8} {:>10}", "Weeks", "Segments")?;
        writeln!(f, "{}", "-".repeat(19))?;
        for (length, count) in counts.iter().take(self.top) {
            writeln!(f, "{length:>8} {count:>10}")?;
        }
        if counts.len() > self.top {
            writeln!(f, "{:>8} {:>10}", "...", counts.len() - self.top)?;
        }
        Ok(())
    }
}

/// Segment length distribution, most common lengths first.
pub(crate) fn segment_lengths(lengths: &BTreeMap<SegmentKey, usize>, top: usize) -> String {
    LengthsView { lengths, top }.to_string()
}

struct KeysView<'a> {
    length: usize,
    keys: &'a [SegmentKey],
}

impl fmt::Display for KeysView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} segments with {} weeks:\n", self.keys.len(), self.length)?;
        for chunk in self.keys.chunks(8) {
            f.write_str(" ")?;
            for k in chunk {
                write!(f, " {:>3}:{:<3} ", k.store, k.department)?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

/// Keys of one length, several per line.
pub(crate) fn segment_keys(length: usize, keys: &[SegmentKey]) -> String {
    KeysView { length, keys }.to_string()
}

struct LagsView<'a> {
    key: SegmentKey,
    acf: &'a [f64],
    pacf: &'a [f64],
    significant: &'a [usize],
    band: f64,
}

impl fmt::Display for LagsView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        banner(f, &format!("LAG DIAGNOSTICS: {}", self.key))?;

        writeln!(f, "Significance band: ±{:.4}\n", self.band)?;
        writeln!(f, "{:>5} {:>10} {:>10}", "Lag", "ACF", "PACF")?;
        writeln!(f, "{}", "-".repeat(29))?;
        for (lag, (a, p)) in self.acf.iter().zip(self.pacf).enumerate().skip(1) {
            let mark = if self.significant.contains(&lag) { " *" } else { "" };
            writeln!(f, "{lag:>5} {a:>10.4} {p:>10.4}{mark}")?;
        }

        f.write_str("\nSignificant lags: ")?;
        if self.significant.is_empty() {
            writeln!(f, "none")?;
        } else {
            let listed: Vec<String> = self.significant.iter().map(ToString::to_string).collect();
            writeln!(f, "{}", listed.join(", "))?;
        }
        if let Some(last) = self.significant.last() {
            writeln!(f, "Suggested --lag-order: {last}")?;
        }
        Ok(())
    }
}

/// ACF and PACF side by side, significant lags marked.
pub(crate) fn lag_diagnostics(
    key: SegmentKey,
    acf: &[f64],
    pacf: &[f64],
    significant: &[usize],
    band: f64,
) -> String {
    LagsView {
        key,
        acf,
        pacf,
        significant,
        band,
    }
    .to_string()
}

struct ForecastView<'a>(&'a ForecastReport);

impl fmt::Display for ForecastView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let report = self.0;
        banner(f, &format!("SALES FORECAST: {}", report.key))?;

        writeln!(f, "Model:      {}", report.model)?;
        writeln!(f, "Lag order:  {}", report.lag_order)?;
        writeln!(
            f,
            "Rows:       {} ({} train / {} test)\n",
            report.points.len(),
            report.boundary,
            report.points.len() - report.boundary
        )?;
        evaluation_line(f, "train", &report.train)?;
        evaluation_line(f, "test", &report.test)?;
        writeln!(f)?;

        section(f, "EVALUATION WEEKS")?;
        writeln!(f, "{:<12} {:>14} {:>14} {:>10}", "Week", "Actual", "Predicted", "Error %")?;
        for point in report.side(SplitSide::Test) {
            let error = if point.actual == 0.0 {
                "n/a".to_string()
            } else {
                format!("{:.2}", (point.predicted - point.actual) / point.actual * 100.0)
            };
            writeln!(
                f,
                "{:<12} {:>14.2} {:>14.2} {:>10}",
                point.week.format("%Y-%m-%d"),
                point.actual,
                point.predicted,
                error
            )?;
        }
        Ok(())
    }
}

/// Forecast summary and the evaluation weeks.
pub(crate) fn forecast(report: &ForecastReport) -> String {
    ForecastView(report).to_string()
}

struct SensitivityView<'a>(&'a SensitivityRecord);

impl fmt::Display for SensitivityView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let record = self.0;
        banner(f, &format!("SENSITIVITY ANALYSIS: {}", record.key))?;

        let rows = &record.rows;
        writeln!(f, "Model:      {}", record.model)?;
        writeln!(
            f,
            "Rows:       {} weeks -> {} rows ({} lag window, {} dropped), {} train / {} test\n",
            rows.segment,
            rows.features,
            rows.windowed,
            rows.dropped,
            rows.boundary,
            rows.features - rows.boundary
        )?;
        evaluation_line(f, "train", &record.train)?;
        evaluation_line(f, "test", &record.test)?;
        writeln!(f)?;

        section(f, "PREDICTED SALES CHANGE PER FEATURE")?;
        writeln!(f, "{:<24} {:>14} {:>18}", "Feature", "Latest week %", "Latest holiday %")?;
        writeln!(f, "{}", "-".repeat(58))?;
        for s in &record.sensitivities {
            let holiday = match s.holiday {
                SensitivityValue::Percent(p) => format!("{p:.4}"),
                SensitivityValue::NoHolidayRows => "no holiday rows".to_string(),
            };
            writeln!(f, "{:<24} {:>14.4} {:>18}", s.feature, s.overall, holiday)?;
        }
        Ok(())
    }
}

/// Sensitivity profile of one segment.
pub(crate) fn sensitivity(record: &SensitivityRecord) -> String {
    SensitivityView(record).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use tally::{ForecastPoint, NamedSensitivity, RowCounts};

    fn eval() -> Evaluation {
        Evaluation {
            correlation: None,
            mae: 12.5,
            mse: 200.0,
            rmse: 14.1421,
        }
    }

    #[test]
    fn test_segment_lengths_sorted_by_count() {
        let lengths: BTreeMap<SegmentKey, usize> = [
            (SegmentKey::new(1, 1), 143),
            (SegmentKey::new(1, 2), 143),
            (SegmentKey::new(1, 3), 20),
        ]
        .into_iter()
        .collect();

        let text = segment_lengths(&lengths, 10);
        let first_row = text.lines().nth(4).unwrap();
        assert!(first_row.contains("143"));
        assert!(first_row.trim_end().ends_with('2'));
    }

    #[test]
    fn test_segment_keys_wrap_rows() {
        let keys: Vec<SegmentKey> = (1..=9).map(|d| SegmentKey::new(2, d)).collect();
        let text = segment_keys(143, &keys);

        assert!(text.starts_with("9 segments with 143 weeks:"));
        // header, blank line, then 8 keys and 1 key
        assert_eq!(text.lines().count(), 4);
        assert!(text.lines().nth(3).unwrap().contains("2:9"));
    }

    #[test]
    fn test_lag_diagnostics_without_significant_lags() {
        let text = lag_diagnostics(SegmentKey::new(1, 1), &[1.0, 0.05], &[1.0, 0.05], &[], 0.2);
        assert!(text.contains("Significant lags: none"));
        assert!(!text.contains("Suggested"));
    }

    #[test]
    fn test_lag_diagnostics_marks_significant() {
        let text = lag_diagnostics(
            SegmentKey::new(1, 1),
            &[1.0, 0.8, 0.3],
            &[1.0, 0.8, 0.05],
            &[1],
            0.2,
        );
        assert!(text.contains("0.8000 *"));
        assert!(text.contains("Suggested --lag-order: 1"));
    }

    #[test]
    fn test_forecast_lists_test_weeks() {
        let week = NaiveDate::from_ymd_opt(2012, 10, 26).unwrap();
        let report = ForecastReport {
            key: SegmentKey::new(3, 7),
            model: "mean".to_string(),
            lag_order: 4,
            boundary: 1,
            points: vec![
                ForecastPoint {
                    week: week - chrono::Duration::weeks(1),
                    side: SplitSide::Train,
                    actual: 90.0,
                    predicted: 95.0,
                },
                ForecastPoint {
                    week,
                    side: SplitSide::Test,
                    actual: 100.0,
                    predicted: 110.0,
                },
            ],
            train: eval(),
            test: eval(),
        };

        let text = forecast(&report);
        assert!(text.contains("store 3 / dept 7"));
        assert!(text.contains("2012-10-26"));
        assert!(text.contains("10.00"));
        assert!(!text.contains("2012-10-19"));
    }

    #[test]
    fn test_sensitivity_notes_missing_holidays() {
        let record = SensitivityRecord {
            key: SegmentKey::new(1, 1),
            model: "linear".to_string(),
            sensitivities: vec![NamedSensitivity {
                feature: "markdown_5".to_string(),
                overall: 3.25,
                holiday: SensitivityValue::NoHolidayRows,
            }],
            train: eval(),
            test: eval(),
            rows: RowCounts {
                segment: 20,
                features: 16,
                windowed: 4,
                dropped: 0,
                boundary: 11,
            },
        };

        let text = sensitivity(&record);
        assert!(text.contains("markdown_5"));
        assert!(text.contains("3.2500"));
        assert!(text.contains("no holiday rows"));
        assert!(text.contains("(4 lag window, 0 dropped)"));
        assert!(text.contains("11 train / 5 test"));
    }
}
