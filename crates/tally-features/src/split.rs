//! Time-Ordered Split
//!
//! Splits a time-ordered table into a training prefix and an evaluation
//! suffix. Rows are never shuffled.

use crate::error::FeatureError;
use ndarray::{Array1, Array2, s};

/// Guards `floor` against products such as `0.7 * 100 = 69.99999999999999`.
const BOUNDARY_EPSILON: f64 = 1e-9;

/// Training and evaluation partitions of a feature table.
#[derive(Debug, Clone, PartialEq)]
pub struct SplitData {
    /// Training features, rows `[0, boundary)`
    pub train_x: Array2<f64>,
    /// Evaluation features, rows `[boundary, n)`
    pub test_x: Array2<f64>,
    /// Training target
    pub train_y: Array1<f64>,
    /// Evaluation target
    pub test_y: Array1<f64>,
    /// First evaluation row
    pub boundary: usize,
}

/// Prefix/suffix split with a fixed evaluation fraction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeOrderedSplit {
    ratio: f64,
}

impl Default for TimeOrderedSplit {
    fn default() -> Self {
        Self { ratio: 0.3 }
    }
}

impl TimeOrderedSplit {
    /// Create a split holding out `ratio` of the rows for evaluation.
    ///
    /// # Errors
    /// Returns [`FeatureError::InvalidParameter`] unless `0 < ratio < 1`.
    pub fn new(ratio: f64) -> Result<Self, FeatureError> {
        if !(ratio > 0.0 && ratio < 1.0) {
            return Err(FeatureError::InvalidParameter(format!(
                "test ratio must be in (0, 1), got {ratio}"
            )));
        }
        Ok(Self { ratio })
    }

    /// Evaluation fraction.
    pub const fn ratio(&self) -> f64 {
        self.ratio
    }

    /// Boundary index: `floor((1 - ratio) * rows)`.
    pub fn boundary(&self, rows: usize) -> usize {
        let raw = (1.0 - self.ratio) * rows as f64;
        ((raw + BOUNDARY_EPSILON).floor() as usize).min(rows)
    }

    /// Split `x` and `y` at the boundary.
    ///
    /// # Errors
    /// - [`FeatureError::DimensionMismatch`] if `x` and `y` differ in length
    /// - [`FeatureError::InsufficientRows`] if either side would be empty
    pub fn split(&self, x: &Array2<f64>, y: &Array1<f64>) -> Result<SplitData, FeatureError> {
        let rows = x.nrows();
        if y.len() != rows {
            return Err(FeatureError::DimensionMismatch {
                expected: rows,
                actual: y.len(),
            });
        }

        let boundary = self.boundary(rows);
        if boundary == 0 || boundary == rows {
            return Err(FeatureError::InsufficientRows { rows, boundary });
        }

        tracing::debug!(rows, boundary, "time-ordered split");

        Ok(SplitData {
            train_x: x.slice(s![..boundary, ..]).to_owned(),
            test_x: x.slice(s![boundary.., ..]).to_owned(),
            train_y: y.slice(s![..boundary]).to_owned(),
            test_y: y.slice(s![boundary..]).to_owned(),
            boundary,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Axis, concatenate};
    use rstest::rstest;

    fn table(rows: usize) -> (Array2<f64>, Array1<f64>) {
        let x = Array2::from_shape_fn((rows, 3), |(i, j)| (i * 10 + j) as f64);
        let y = Array1::from_shape_fn(rows, |i| i as f64);
        (x, y)
    }

    #[rstest]
    #[case(100, 0.3, 70)]
    #[case(16, 0.3, 11)]
    #[case(139, 0.3, 97)]
    #[case(10, 0.5, 5)]
    #[case(3, 0.3, 2)]
    fn test_boundary(#[case] rows: usize, #[case] ratio: f64, #[case] expected: usize) {
        let split = TimeOrderedSplit::new(ratio).unwrap();
        assert_eq!(split.boundary(rows), expected);
    }

    #[test]
    fn test_split_reassembles_table() {
        let (x, y) = table(100);
        let data = TimeOrderedSplit::default().split(&x, &y).unwrap();

        assert_eq!(data.boundary, 70);
        assert_eq!(data.train_x.nrows(), 70);
        assert_eq!(data.test_x.nrows(), 30);

        let x_back = concatenate(Axis(0), &[data.train_x.view(), data.test_x.view()]).unwrap();
        let y_back = concatenate(Axis(0), &[data.train_y.view(), data.test_y.view()]).unwrap();
        assert_eq!(x_back, x);
        assert_eq!(y_back, y);
    }

    #[test]
    fn test_training_precedes_evaluation() {
        let (x, y) = table(20);
        let data = TimeOrderedSplit::default().split(&x, &y).unwrap();
        let last_train = data.train_y[data.train_y.len() - 1];
        assert!(data.test_y.iter().all(|v| *v > last_train));
    }

    #[rstest]
    #[case(1)]
    #[case(0)]
    fn test_insufficient_rows(#[case] rows: usize) {
        let (x, y) = table(rows);
        let err = TimeOrderedSplit::default().split(&x, &y).unwrap_err();
        assert!(matches!(err, FeatureError::InsufficientRows { .. }));
    }

    #[rstest]
    #[case(0.0)]
    #[case(1.0)]
    #[case(-0.2)]
    #[case(f64::NAN)]
    fn test_invalid_ratio(#[case] ratio: f64) {
        assert!(matches!(
            TimeOrderedSplit::new(ratio),
            Err(FeatureError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_length_mismatch() {
        let (x, _) = table(10);
        let err = TimeOrderedSplit::default()
            .split(&x, &Array1::zeros(9))
            .unwrap_err();
        assert_eq!(
            err,
            FeatureError::DimensionMismatch {
                expected: 10,
                actual: 9
            }
        );
    }
}
