//! Training-mean baseline.

use crate::error::ModelError;
use crate::regressor::{Regressor, check_training_set, check_width};
use ndarray::{Array1, Array2};

/// Predicts the mean of the training target for every row.
///
/// Useful as a floor for comparing other models, and exact on constant
/// targets.
#[derive(Debug, Clone, Default)]
pub struct MeanRegressor {
    fitted: Option<(f64, usize)>,
}

impl MeanRegressor {
    /// Create an unfitted regressor.
    pub const fn new() -> Self {
        Self { fitted: None }
    }

    /// Fitted mean, if any.
    pub fn mean(&self) -> Option<f64> {
        self.fitted.map(|(mean, _)| mean)
    }
}

impl Regressor for MeanRegressor {
    fn name(&self) -> &str {
        "mean"
    }

    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<(), ModelError> {
        check_training_set(x, y)?;
        let mean = y.sum() / y.len() as f64;
        self.fitted = Some((mean, x.ncols()));
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>, ModelError> {
        let (mean, width) = self
            .fitted
            .ok_or_else(|| ModelError::NotFitted(self.name().to_string()))?;
        check_width(x, width)?;
        Ok(Array1::from_elem(x.nrows(), mean))
    }
}
