//! Lag Windowing
//!
//! Turns a time-ordered series into a supervised-learning table whose rows hold
//! the series at several past offsets plus a target column. Row `i` of the
//! output corresponds to position `i + lag_order` of the input; the first
//! `lag_order` positions have no full history and are dropped.
//!
//! Two layouts are supported:
//!
//! - [`Alignment::Forecasting`]: columns `x(t-0) .. x(t-k)` followed by the
//!   unshifted target. The `t-0` column is a copy of the target; callers that
//!   want leakage-free features go through [`LagTable::forecasting_pair`],
//!   which is the only place that column is discarded.
//! - [`Alignment::TargetAligned`]: columns `x(t-1) .. x(t-k)` followed by the
//!   target at offsets `k .. 0`, the last being the target itself.

use crate::error::FeatureError;
use chrono::NaiveDate;
use ndarray::{Array1, Array2, ArrayView1, s};
use serde::{Deserialize, Serialize};

/// Column layout of the windowed table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Alignment {
    /// Offsets `0..=k` then the target (offset-0 duplicates the target).
    Forecasting,
    /// Offsets `1..=k` then target offsets `k..=0`.
    TargetAligned,
}

/// Configuration for the lag windower
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LagWindowConfig {
    /// Number of preceding periods used as features (default: 4)
    pub lag_order: usize,
    /// Column layout (default: forecasting)
    pub alignment: Alignment,
}

impl Default for LagWindowConfig {
    fn default() -> Self {
        Self {
            lag_order: 4,
            alignment: Alignment::Forecasting,
        }
    }
}

/// Supervised table produced by [`LagWindower::window`].
///
/// The last column is always the target.
#[derive(Debug, Clone, PartialEq)]
pub struct LagTable {
    dates: Vec<NaiveDate>,
    columns: Vec<String>,
    values: Array2<f64>,
    lag_order: usize,
    alignment: Alignment,
}

impl LagTable {
    /// Target dates, ascending.
    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    /// Column names, target last.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Raw table values (rows x columns).
    pub const fn values(&self) -> &Array2<f64> {
        &self.values
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.values.nrows()
    }

    /// Whether the table has no rows.
    pub fn is_empty(&self) -> bool {
        self.values.nrows() == 0
    }

    /// Lag order used to build the table.
    pub const fn lag_order(&self) -> usize {
        self.lag_order
    }

    /// Column layout.
    pub const fn alignment(&self) -> Alignment {
        self.alignment
    }

    /// Target column.
    pub fn target(&self) -> ArrayView1<'_, f64> {
        self.values.column(self.values.ncols() - 1)
    }

    /// Range of the strictly historical lag columns `x(t-1) .. x(t-k)`.
    fn history_range(&self) -> std::ops::Range<usize> {
        match self.alignment {
            Alignment::Forecasting => 1..self.lag_order + 1,
            Alignment::TargetAligned => 0..self.lag_order,
        }
    }

    /// Names of the historical lag columns.
    pub fn history_columns(&self) -> &[String] {
        &self.columns[self.history_range()]
    }

    /// Historical lag columns `x(t-1) .. x(t-k)` only.
    pub fn history(&self) -> Array2<f64> {
        self.values.slice(s![.., self.history_range()]).to_owned()
    }

    /// Feature matrix and target for one-step forecasting.
    ///
    /// Features are the historical lag columns; in the forecasting layout this
    /// discards the offset-0 column, which equals the target.
    pub fn forecasting_pair(&self) -> (Array2<f64>, Array1<f64>) {
        (self.history(), self.target().to_owned())
    }
}

/// Builds lagged supervised tables from a single series.
#[derive(Debug, Clone, Default)]
pub struct LagWindower {
    config: LagWindowConfig,
}

impl LagWindower {
    /// Create a windower with the given configuration.
    pub const fn with_config(config: LagWindowConfig) -> Self {
        Self { config }
    }

    /// Current configuration.
    pub const fn config(&self) -> &LagWindowConfig {
        &self.config
    }

    /// Window `series` (ascending by date) into a lag table.
    ///
    /// `name` is used to label columns, e.g. `weekly_sales(t-2)`.
    ///
    /// # Errors
    /// - [`FeatureError::InvalidParameter`] if the lag order is zero
    /// - [`FeatureError::InsufficientHistory`] if the series has `lag_order` rows or fewer
    pub fn window(&self, name: &str, series: &[(NaiveDate, f64)]) -> Result<LagTable, FeatureError> {
        let k = self.config.lag_order;
        if k == 0 {
            return Err(FeatureError::InvalidParameter(
                "lag order must be at least 1".to_string(),
            ));
        }

        let n = series.len();
        if n <= k {
            return Err(FeatureError::InsufficientHistory {
                required: k + 1,
                actual: n,
            });
        }

        let offsets: Vec<usize> = match self.config.alignment {
            Alignment::Forecasting => (0..=k).collect(),
            Alignment::TargetAligned => (1..=k).chain((0..=k).rev()).collect(),
        };

        let mut columns: Vec<String> = Vec::with_capacity(offsets.len() + 1);
        match self.config.alignment {
            Alignment::Forecasting => {
                columns.extend((0..=k).map(|j| format!("{name}(t-{j})")));
                columns.push(name.to_string());
            }
            Alignment::TargetAligned => {
                columns.extend((1..=k).map(|j| format!("{name}(t-{j})")));
                columns.extend((0..=k).rev().map(|j| format!("target:{name}(t-{j})")));
            }
        }

        let rows = n - k;
        let width = columns.len();
        let mut values = Array2::<f64>::zeros((rows, width));

        for r in 0..rows {
            let t = r + k;
            match self.config.alignment {
                Alignment::Forecasting => {
                    for (c, &offset) in offsets.iter().enumerate() {
                        values[[r, c]] = series[t - offset].1;
                    }
                    values[[r, width - 1]] = series[t].1;
                }
                Alignment::TargetAligned => {
                    for (c, &offset) in offsets.iter().enumerate() {
                        values[[r, c]] = series[t - offset].1;
                    }
                }
            }
        }

        let dates = series[k..].iter().map(|(d, _)| *d).collect();

        tracing::trace!(name, rows, width, lag_order = k, "series windowed");

        Ok(LagTable {
            dates,
            columns,
            values,
            lag_order: k,
            alignment: self.config.alignment,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use rstest::rstest;

    fn weekly(values: &[f64]) -> Vec<(NaiveDate, f64)> {
        let start = NaiveDate::from_ymd_opt(2010, 2, 5).unwrap();
        values
            .iter()
            .enumerate()
            .map(|(i, v)| (start + Duration::weeks(i as i64), *v))
            .collect()
    }

    fn windower(lag_order: usize, alignment: Alignment) -> LagWindower {
        LagWindower::with_config(LagWindowConfig {
            lag_order,
            alignment,
        })
    }

    #[test]
    fn test_forecasting_layout() {
        let series = weekly(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        let table = windower(2, Alignment::Forecasting)
            .window("s", &series)
            .unwrap();

        assert_eq!(table.columns(), ["s(t-0)", "s(t-1)", "s(t-2)", "s"]);
        assert_eq!(table.len(), 4);
        // First row targets position 2 (value 3.0)
        assert_eq!(table.values().row(0).to_vec(), vec![3.0, 2.0, 1.0, 3.0]);
        assert_eq!(table.values().row(3).to_vec(), vec![6.0, 5.0, 4.0, 6.0]);
        assert_eq!(table.dates()[0], series[2].0);
    }

    #[test]
    fn test_offset_zero_duplicates_target() {
        let series = weekly(&[9.0, 8.0, 7.0, 6.0, 5.0]);
        let table = windower(3, Alignment::Forecasting)
            .window("s", &series)
            .unwrap();

        let values = table.values();
        for r in 0..table.len() {
            assert_eq!(values[[r, 0]], values[[r, values.ncols() - 1]]);
        }
    }

    #[test]
    fn test_target_aligned_layout() {
        let series = weekly(&[1.0, 2.0, 3.0, 4.0, 5.0]);
        let table = windower(2, Alignment::TargetAligned)
            .window("s", &series)
            .unwrap();

        assert_eq!(
            table.columns(),
            [
                "s(t-1)",
                "s(t-2)",
                "target:s(t-2)",
                "target:s(t-1)",
                "target:s(t-0)"
            ]
        );
        assert_eq!(table.values().row(0).to_vec(), vec![2.0, 1.0, 1.0, 2.0, 3.0]);
        assert_eq!(table.target().to_vec(), vec![3.0, 4.0, 5.0]);
        assert_eq!(table.history_columns(), ["s(t-1)", "s(t-2)"]);
    }

    #[test]
    fn test_forecasting_pair_drops_offset_zero() {
        let series = weekly(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0]);
        let table = windower(4, Alignment::Forecasting)
            .window("s", &series)
            .unwrap();

        let (x, y) = table.forecasting_pair();
        assert_eq!(x.ncols(), 4);
        assert_eq!(x.row(0).to_vec(), vec![4.0, 3.0, 2.0, 1.0]);
        assert_eq!(y.to_vec(), vec![5.0, 6.0, 7.0]);
    }

    #[rstest]
    #[case(20, 4)]
    #[case(5, 4)]
    #[case(143, 4)]
    #[case(10, 1)]
    #[case(10, 9)]
    fn test_row_count_and_no_leakage(#[case] len: usize, #[case] lag_order: usize) {
        let values: Vec<f64> = (0..len).map(|i| i as f64).collect();
        let series = weekly(&values);
        let table = windower(lag_order, Alignment::Forecasting)
            .window("s", &series)
            .unwrap();

        assert_eq!(table.len(), len - lag_order);

        // Values encode their own position, so each lag value identifies its source date.
        let history = table.history();
        for (r, target_date) in table.dates().iter().enumerate() {
            for value in history.row(r) {
                let source_date = series[*value as usize].0;
                assert!(source_date < *target_date);
            }
        }
    }

    #[rstest]
    #[case(4, 4)]
    #[case(3, 4)]
    #[case(0, 1)]
    fn test_insufficient_history(#[case] len: usize, #[case] lag_order: usize) {
        let series = weekly(&vec![1.0; len]);
        let err = windower(lag_order, Alignment::Forecasting)
            .window("s", &series)
            .unwrap_err();
        assert_eq!(
            err,
            FeatureError::InsufficientHistory {
                required: lag_order + 1,
                actual: len
            }
        );
    }

    #[test]
    fn test_zero_lag_rejected() {
        let series = weekly(&[1.0, 2.0]);
        let err = windower(0, Alignment::Forecasting)
            .window("s", &series)
            .unwrap_err();
        assert!(matches!(err, FeatureError::InvalidParameter(_)));
    }

    #[test]
    fn test_input_untouched() {
        let series = weekly(&[1.0, 2.0, 3.0]);
        let before = series.clone();
        windower(1, Alignment::TargetAligned).window("s", &series).unwrap();
        assert_eq!(series, before);
    }
}
