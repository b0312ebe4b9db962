//! Min-Max Scaling
//!
//! Per-column min/max normalisation to `[0, 1]` over a designated fit table.
//! A [`ScalerState`] is an ordinary value owned by whoever fitted it; there is
//! no shared scaler.

use crate::error::FeatureError;
use ndarray::{Array1, Array2, ArrayView1, Axis};
use serde::{Deserialize, Serialize};

/// Which rows the scaler statistics are learned from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScalerFit {
    /// Fit on every row of the feature table, including the evaluation rows
    #[default]
    FullTable,
    /// Fit on the training prefix only
    TrainOnly,
}

/// Fits [`ScalerState`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct MinMaxScaler;

impl MinMaxScaler {
    /// Learn per-column minima and maxima of `table`.
    ///
    /// # Errors
    /// Returns [`FeatureError::EmptyTable`] if `table` has no rows or columns.
    pub fn fit(table: &Array2<f64>) -> Result<ScalerState, FeatureError> {
        if table.nrows() == 0 || table.ncols() == 0 {
            return Err(FeatureError::EmptyTable);
        }

        let (mins, maxs) = table
            .axis_iter(Axis(1))
            .map(column_bounds)
            .unzip();

        Ok(ScalerState { mins, maxs })
    }

    /// Learn the bounds of a single column (typically the target).
    ///
    /// # Errors
    /// Returns [`FeatureError::EmptyTable`] if `column` is empty.
    pub fn fit_column(column: &Array1<f64>) -> Result<ScalerState, FeatureError> {
        if column.is_empty() {
            return Err(FeatureError::EmptyTable);
        }
        let (min, max) = column_bounds(column.view());
        Ok(ScalerState {
            mins: vec![min],
            maxs: vec![max],
        })
    }
}

fn column_bounds(column: ArrayView1<'_, f64>) -> (f64, f64) {
    column.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
        (lo.min(v), hi.max(v))
    })
}

/// Per-column `(min, max)` learned by [`MinMaxScaler`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalerState {
    mins: Vec<f64>,
    maxs: Vec<f64>,
}

impl ScalerState {
    /// Number of columns the state was fitted on.
    pub fn width(&self) -> usize {
        self.mins.len()
    }

    /// Column minima.
    pub fn mins(&self) -> &[f64] {
        &self.mins
    }

    /// Column maxima.
    pub fn maxs(&self) -> &[f64] {
        &self.maxs
    }

    /// Whether column `index` had zero width (min == max) at fit time.
    pub fn is_degenerate(&self, index: usize) -> bool {
        self.mins
            .get(index)
            .zip(self.maxs.get(index))
            .is_some_and(|(lo, hi)| hi - lo == 0.0)
    }

    fn check_width(&self, actual: usize) -> Result<(), FeatureError> {
        if actual != self.width() {
            return Err(FeatureError::DimensionMismatch {
                expected: self.width(),
                actual,
            });
        }
        Ok(())
    }

    fn scale(&self, index: usize, value: f64) -> f64 {
        let range = self.maxs[index] - self.mins[index];
        if range == 0.0 {
            0.0
        } else {
            (value - self.mins[index]) / range
        }
    }

    fn unscale(&self, index: usize, value: f64) -> f64 {
        let range = self.maxs[index] - self.mins[index];
        value * range + self.mins[index]
    }

    /// Map `table` into fitted units; zero-width columns map to 0.
    ///
    /// Values outside the fitted range land outside `[0, 1]`.
    ///
    /// # Errors
    /// Returns [`FeatureError::DimensionMismatch`] if the column count differs.
    pub fn transform(&self, table: &Array2<f64>) -> Result<Array2<f64>, FeatureError> {
        self.check_width(table.ncols())?;
        let mut out = table.clone();
        for (j, mut column) in out.axis_iter_mut(Axis(1)).enumerate() {
            column.mapv_inplace(|v| self.scale(j, v));
        }
        Ok(out)
    }

    /// Reverse [`Self::transform`]. Zero-width columns invert to their minimum.
    ///
    /// # Errors
    /// Returns [`FeatureError::DimensionMismatch`] if the column count differs.
    pub fn invert(&self, table: &Array2<f64>) -> Result<Array2<f64>, FeatureError> {
        self.check_width(table.ncols())?;
        let mut out = table.clone();
        for (j, mut column) in out.axis_iter_mut(Axis(1)).enumerate() {
            column.mapv_inplace(|v| self.unscale(j, v));
        }
        Ok(out)
    }

    /// Transform a single column with a one-column state.
    ///
    /// # Errors
    /// Returns [`FeatureError::DimensionMismatch`] unless the state has one column.
    pub fn transform_column(&self, column: &Array1<f64>) -> Result<Array1<f64>, FeatureError> {
        self.check_width(1)?;
        Ok(column.mapv(|v| self.scale(0, v)))
    }

    /// Invert a single column with a one-column state.
    ///
    /// # Errors
    /// Returns [`FeatureError::DimensionMismatch`] unless the state has one column.
    pub fn invert_column(&self, column: &Array1<f64>) -> Result<Array1<f64>, FeatureError> {
        self.check_width(1)?;
        Ok(column.mapv(|v| self.unscale(0, v)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn test_fit_bounds() {
        let table = array![[1.0, 10.0], [3.0, -2.0], [2.0, 4.0]];
        let state = MinMaxScaler::fit(&table).unwrap();
        assert_eq!(state.mins(), &[1.0, -2.0]);
        assert_eq!(state.maxs(), &[3.0, 10.0]);
        assert_eq!(state.width(), 2);
    }

    #[test]
    fn test_transform_unit_interval() {
        let table = array![[1.0, 10.0], [3.0, -2.0], [2.0, 4.0]];
        let state = MinMaxScaler::fit(&table).unwrap();
        let scaled = state.transform(&table).unwrap();

        assert_abs_diff_eq!(scaled, array![[0.0, 1.0], [1.0, 0.0], [0.5, 0.5]], epsilon = 1e-12);
    }

    #[test]
    fn test_round_trip() {
        let table = array![[1.5, 200.0, 7.0], [-3.25, 150.0, 7.0], [8.0, 175.5, 7.0]];
        let state = MinMaxScaler::fit(&table).unwrap();
        let restored = state.invert(&state.transform(&table).unwrap()).unwrap();
        assert_abs_diff_eq!(restored, table, epsilon = 1e-9);
    }

    #[test]
    fn test_zero_width_column_maps_to_zero() {
        let table = array![[5.0, 1.0], [5.0, 2.0]];
        let state = MinMaxScaler::fit(&table).unwrap();
        assert!(state.is_degenerate(0));
        assert!(!state.is_degenerate(1));

        let scaled = state.transform(&table).unwrap();
        assert_eq!(scaled.column(0).to_vec(), vec![0.0, 0.0]);

        let restored = state.invert(&scaled).unwrap();
        assert_eq!(restored.column(0).to_vec(), vec![5.0, 5.0]);
    }

    #[test]
    fn test_out_of_range_extrapolates() {
        let fit = array![[0.0], [10.0]];
        let state = MinMaxScaler::fit(&fit).unwrap();
        let scaled = state.transform(&array![[15.0], [-5.0]]).unwrap();
        assert_abs_diff_eq!(scaled, array![[1.5], [-0.5]], epsilon = 1e-12);
        assert_abs_diff_eq!(state.invert(&scaled).unwrap(), array![[15.0], [-5.0]], epsilon = 1e-12);
    }

    #[test]
    fn test_width_mismatch() {
        let state = MinMaxScaler::fit(&array![[1.0, 2.0]]).unwrap();
        let err = state.transform(&array![[1.0, 2.0, 3.0]]).unwrap_err();
        assert_eq!(
            err,
            FeatureError::DimensionMismatch {
                expected: 2,
                actual: 3
            }
        );
        assert!(state.transform_column(&array![1.0]).is_err());
    }

    #[test]
    fn test_empty_fit_table() {
        let empty = Array2::<f64>::zeros((0, 3));
        assert_eq!(MinMaxScaler::fit(&empty).unwrap_err(), FeatureError::EmptyTable);
        assert_eq!(
            MinMaxScaler::fit_column(&Array1::zeros(0)).unwrap_err(),
            FeatureError::EmptyTable
        );
    }

    #[test]
    fn test_column_helpers() {
        let target = array![100.0, 300.0, 200.0];
        let state = MinMaxScaler::fit_column(&target).unwrap();
        let scaled = state.transform_column(&target).unwrap();
        assert_abs_diff_eq!(scaled, array![0.0, 1.0, 0.5], epsilon = 1e-12);
        assert_abs_diff_eq!(state.invert_column(&scaled).unwrap(), target, epsilon = 1e-9);
    }

    #[test]
    fn test_scaler_fit_serde() {
        let fit: ScalerFit = serde_json::from_str("\"train_only\"").unwrap();
        assert_eq!(fit, ScalerFit::TrainOnly);
        assert_eq!(ScalerFit::default(), ScalerFit::FullTable);
    }
}
