//! Segment Feature Builder
//!
//! Joins a segment's weekly exogenous regressors with its lagged sales history
//! into one feature matrix with weekly sales as the target. Store, department,
//! type and size are constant within a segment and carry no weekly signal, so
//! they never become features.

use crate::error::FeatureError;
use crate::window::{Alignment, LagWindowConfig, LagWindower};
use chrono::NaiveDate;
use ndarray::{Array1, Array2};
use std::collections::BTreeMap;
use tally_data::{PanelRow, Segment, SegmentKey};

/// Exogenous feature columns, in matrix order.
pub const EXOGENOUS_COLUMNS: [&str; 10] = [
    "is_holiday",
    "temperature",
    "fuel_price",
    "markdown_1",
    "markdown_2",
    "markdown_3",
    "markdown_4",
    "markdown_5",
    "cpi",
    "unemployment",
];

/// Index of the holiday flag in the feature matrix.
pub const HOLIDAY_COLUMN: usize = 0;

/// Name of the target column.
pub const TARGET_COLUMN: &str = "weekly_sales";

/// Joined feature table for one segment.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentFeatures {
    /// Segment the table was built from
    pub key: SegmentKey,
    /// Week of each row, ascending
    pub dates: Vec<NaiveDate>,
    /// Feature column names: exogenous columns then sales lags
    pub feature_names: Vec<String>,
    /// Feature matrix (rows x features)
    pub features: Array2<f64>,
    /// Weekly sales for each row
    pub target: Array1<f64>,
    /// Leading weeks without a full sales history (the lag order)
    pub windowed_rows: usize,
    /// Windowed rows removed by the join because a value was missing or non-finite
    pub dropped_rows: usize,
}

impl SegmentFeatures {
    /// Number of rows.
    pub fn len(&self) -> usize {
        self.features.nrows()
    }

    /// Whether the table has no rows.
    pub fn is_empty(&self) -> bool {
        self.features.nrows() == 0
    }
}

/// Builds [`SegmentFeatures`] for a fixed lag order.
#[derive(Debug, Clone)]
pub struct SegmentFeatureBuilder {
    lag_order: usize,
}

impl Default for SegmentFeatureBuilder {
    fn default() -> Self {
        Self::new(LagWindowConfig::default().lag_order)
    }
}

impl SegmentFeatureBuilder {
    /// Create a builder using `lag_order` weeks of sales history.
    pub const fn new(lag_order: usize) -> Self {
        Self { lag_order }
    }

    /// Lag order in use.
    pub const fn lag_order(&self) -> usize {
        self.lag_order
    }

    /// Build the joined feature table for `segment`.
    ///
    /// The first `lag_order` weeks have no full sales history and are counted in
    /// [`SegmentFeatures::windowed_rows`]. Remaining rows with any non-finite
    /// value are dropped and counted in [`SegmentFeatures::dropped_rows`].
    ///
    /// # Errors
    /// - [`FeatureError::InsufficientHistory`] if the segment is too short for the lag order
    /// - [`FeatureError::EmptySegment`] if no row survives the join
    pub fn build(&self, segment: &Segment<'_>) -> Result<SegmentFeatures, FeatureError> {
        let windower = LagWindower::with_config(LagWindowConfig {
            lag_order: self.lag_order,
            alignment: Alignment::Forecasting,
        });
        let lags = windower.window(TARGET_COLUMN, &segment.sales_series())?;
        let history = lags.history();

        let lag_rows: BTreeMap<NaiveDate, usize> = lags
            .dates()
            .iter()
            .enumerate()
            .map(|(i, d)| (*d, i))
            .collect();

        let feature_names: Vec<String> = EXOGENOUS_COLUMNS
            .iter()
            .map(|c| (*c).to_string())
            .chain(lags.history_columns().iter().cloned())
            .collect();
        let width = feature_names.len();

        let mut dates = Vec::with_capacity(lags.len());
        let mut flat = Vec::with_capacity(lags.len() * width);
        let mut target = Vec::with_capacity(lags.len());

        for row in segment.rows() {
            let Some(&lag_row) = lag_rows.get(&row.week) else {
                continue;
            };

            let mut values = exogenous_values(row).to_vec();
            values.extend(history.row(lag_row).iter().copied());

            if !row.weekly_sales.is_finite() || values.iter().any(|v| !v.is_finite()) {
                continue;
            }

            dates.push(row.week);
            flat.extend(values);
            target.push(row.weekly_sales);
        }

        let kept = dates.len();
        let windowed_rows = segment.len() - lags.len();
        let dropped_rows = lags.len() - kept;

        if kept == 0 {
            return Err(FeatureError::EmptySegment {
                dropped: dropped_rows,
            });
        }

        if dropped_rows > 0 {
            tracing::warn!(
                segment = %segment.key(),
                dropped = dropped_rows,
                "rows with incomplete values dropped from feature table"
            );
        } else {
            tracing::debug!(segment = %segment.key(), kept, windowed = windowed_rows, "features joined");
        }

        let features = Array2::from_shape_vec((kept, width), flat).map_err(|_| {
            FeatureError::DimensionMismatch {
                expected: width,
                actual: kept,
            }
        })?;

        Ok(SegmentFeatures {
            key: segment.key(),
            dates,
            feature_names,
            features,
            target: Array1::from_vec(target),
            windowed_rows,
            dropped_rows,
        })
    }
}

/// Exogenous values of a row in [`EXOGENOUS_COLUMNS`] order.
fn exogenous_values(row: &PanelRow) -> [f64; 10] {
    let [m1, m2, m3, m4, m5] = row.markdowns;
    [
        if row.is_holiday { 1.0 } else { 0.0 },
        row.temperature,
        row.fuel_price,
        m1,
        m2,
        m3,
        m4,
        m5,
        row.cpi,
        row.unemployment,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use tally_data::Panel;

    fn panel(sales: &[f64]) -> Panel {
        let start = NaiveDate::from_ymd_opt(2011, 1, 7).unwrap();
        let rows = sales.iter().enumerate().map(|(i, s)| {
            PanelRow::new(1, 1, start + Duration::weeks(i as i64), *s)
                .with_holiday(i % 5 == 0)
                .with_weather(40.0 + i as f64, 3.0)
                .with_markdowns([i as f64, 0.0, 0.0, 0.0, 10.0])
                .with_macro(211.0, 8.1)
        });
        Panel::from_rows(rows).unwrap()
    }

    #[test]
    fn test_build_shapes_and_names() {
        let sales: Vec<f64> = (0..10).map(|i| 100.0 + i as f64).collect();
        let panel = panel(&sales);
        let segment = panel.segment(SegmentKey::new(1, 1)).unwrap();

        let features = SegmentFeatureBuilder::new(4).build(&segment).unwrap();

        assert_eq!(features.len(), 6);
        assert_eq!(features.features.ncols(), 14);
        assert_eq!(features.feature_names[HOLIDAY_COLUMN], "is_holiday");
        assert_eq!(features.feature_names[10], "weekly_sales(t-1)");
        assert_eq!(features.feature_names[13], "weekly_sales(t-4)");
        assert_eq!(features.windowed_rows, 4);
        assert_eq!(features.dropped_rows, 0);
    }

    #[test]
    fn test_target_and_lags_align_by_date() {
        let sales: Vec<f64> = (0..8).map(|i| 10.0 * i as f64).collect();
        let panel = panel(&sales);
        let segment = panel.segment(SegmentKey::new(1, 1)).unwrap();

        let features = SegmentFeatureBuilder::new(2).build(&segment).unwrap();

        // Row 0 is week 2: target 20, lags 10 and 0
        assert_eq!(features.dates[0], segment.rows()[2].week);
        assert_eq!(features.target[0], 20.0);
        assert_eq!(features.features[[0, 10]], 10.0);
        assert_eq!(features.features[[0, 11]], 0.0);
        // Exogenous values come from the target week
        assert_eq!(features.features[[0, 1]], 42.0);
        assert_eq!(features.features[[0, 3]], 2.0);
    }

    #[test]
    fn test_holiday_encoded_as_unit() {
        let sales = vec![1.0; 12];
        let panel = panel(&sales);
        let segment = panel.segment(SegmentKey::new(1, 1)).unwrap();

        let features = SegmentFeatureBuilder::new(4).build(&segment).unwrap();
        // Week 5 and week 10 are holidays
        let flags: Vec<f64> = features.features.column(HOLIDAY_COLUMN).to_vec();
        assert_eq!(flags, vec![0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0]);
    }

    #[test]
    fn test_non_finite_rows_dropped() {
        let start = NaiveDate::from_ymd_opt(2011, 1, 7).unwrap();
        let rows = (0..7).map(|i| {
            let row = PanelRow::new(2, 3, start + Duration::weeks(i), 5.0);
            if i == 5 {
                row.with_macro(f64::NAN, 7.0)
            } else {
                row
            }
        });
        let panel = Panel::from_rows(rows).unwrap();
        let segment = panel.segment(SegmentKey::new(2, 3)).unwrap();

        let features = SegmentFeatureBuilder::new(2).build(&segment).unwrap();
        assert_eq!(features.len(), 4);
        assert_eq!(features.windowed_rows, 2);
        assert_eq!(features.dropped_rows, 1);
        assert_eq!(
            features.windowed_rows + features.dropped_rows + features.len(),
            segment.len()
        );
    }

    #[test]
    fn test_empty_segment_when_everything_dropped() {
        let start = NaiveDate::from_ymd_opt(2011, 1, 7).unwrap();
        let rows = (0..4).map(|i| {
            PanelRow::new(2, 3, start + Duration::weeks(i), 5.0).with_weather(f64::NAN, 1.0)
        });
        let panel = Panel::from_rows(rows).unwrap();
        let segment = panel.segment(SegmentKey::new(2, 3)).unwrap();

        let err = SegmentFeatureBuilder::new(2).build(&segment).unwrap_err();
        // Two weeks go to the lag window, the other two to the join.
        assert_eq!(err, FeatureError::EmptySegment { dropped: 2 });
    }

    #[test]
    fn test_short_segment_rejected() {
        let panel = panel(&[1.0, 2.0, 3.0]);
        let segment = panel.segment(SegmentKey::new(1, 1)).unwrap();

        let err = SegmentFeatureBuilder::new(4).build(&segment).unwrap_err();
        assert_eq!(
            err,
            FeatureError::InsufficientHistory {
                required: 5,
                actual: 3
            }
        );
    }
}
