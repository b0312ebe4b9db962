//! Evaluation metrics on real-scale predictions.

use crate::error::ModelError;
use ndarray::Array1;
use serde::{Deserialize, Serialize};

/// Goodness-of-fit summary for one set of predictions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    /// Pearson correlation; `None` when either side has zero variance
    pub correlation: Option<f64>,
    /// Mean absolute error
    pub mae: f64,
    /// Mean squared error
    pub mse: f64,
    /// Root mean squared error
    pub rmse: f64,
}

/// Compare `predicted` against `actual`.
///
/// # Errors
/// - [`ModelError::DimensionMismatch`] if the lengths differ
/// - [`ModelError::InvalidParameter`] if both are empty
pub fn evaluate(actual: &Array1<f64>, predicted: &Array1<f64>) -> Result<Evaluation, ModelError> {
    if actual.len() != predicted.len() {
        return Err(ModelError::DimensionMismatch {
            expected: actual.len(),
            actual: predicted.len(),
        });
    }
    if actual.is_empty() {
        return Err(ModelError::InvalidParameter(
            "cannot evaluate an empty prediction set".to_string(),
        ));
    }

    let n = actual.len() as f64;
    let residuals = predicted - actual;
    let mae = residuals.mapv(f64::abs).sum() / n;
    let mse = residuals.mapv(|r| r * r).sum() / n;

    Ok(Evaluation {
        correlation: pearson(actual, predicted),
        mae,
        mse,
        rmse: mse.sqrt(),
    })
}

/// Pearson correlation, or `None` if either series is constant.
pub fn pearson(a: &Array1<f64>, b: &Array1<f64>) -> Option<f64> {
    if a.len() != b.len() || a.len() < 2 {
        return None;
    }

    let n = a.len() as f64;
    let mean_a = a.sum() / n;
    let mean_b = b.sum() / n;

    let mut cov = 0.0;
    let mut var_a = 0.0;
    let mut var_b = 0.0;
    for (x, y) in a.iter().zip(b) {
        let da = x - mean_a;
        let db = y - mean_b;
        cov += da * db;
        var_a += da * da;
        var_b += db * db;
    }

    if var_a == 0.0 || var_b == 0.0 {
        None
    } else {
        Some(cov / (var_a.sqrt() * var_b.sqrt()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    #[test]
    fn test_perfect_prediction() {
        let actual = array![1.0, 2.0, 3.0];
        let eval = evaluate(&actual, &actual).unwrap();
        assert_eq!(eval.mae, 0.0);
        assert_eq!(eval.rmse, 0.0);
        assert_relative_eq!(eval.correlation.unwrap(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_error_metrics() {
        let actual = array![10.0, 20.0, 30.0, 40.0];
        let predicted = array![12.0, 18.0, 33.0, 40.0];
        let eval = evaluate(&actual, &predicted).unwrap();

        assert_relative_eq!(eval.mae, 7.0 / 4.0);
        assert_relative_eq!(eval.mse, 17.0 / 4.0);
        assert_relative_eq!(eval.rmse, (17.0_f64 / 4.0).sqrt());
    }

    #[test]
    fn test_constant_side_has_no_correlation() {
        let eval = evaluate(&array![5.0, 5.0, 5.0], &array![1.0, 2.0, 3.0]).unwrap();
        assert_eq!(eval.correlation, None);
    }

    #[test]
    fn test_anti_correlated() {
        let r = pearson(&array![1.0, 2.0, 3.0], &array![3.0, 2.0, 1.0]).unwrap();
        assert_relative_eq!(r, -1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_length_mismatch() {
        assert!(matches!(
            evaluate(&array![1.0], &array![1.0, 2.0]),
            Err(ModelError::DimensionMismatch { .. })
        ));
    }
}
