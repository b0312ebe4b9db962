//! Linear Regression
//!
//! Ordinary least squares with an intercept, optionally ridge-penalised.
//!
//! # Solution
//!
//! With centred features `Xc` and centred target `yc`:
//!
//! ```text
//! beta      = (Xc^T Xc + lambda I)^+ Xc^T yc
//! intercept = mean(y) - mean(X) . beta
//! ```
//!
//! `^+` is the pseudo-inverse, so constant or collinear columns receive the
//! minimum-norm coefficients instead of failing.

use crate::error::ModelError;
use crate::linalg::symmetric_pseudo_inverse;
use crate::regressor::{Regressor, check_training_set, check_width};
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

/// Configuration for linear regression
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LinearConfig {
    /// L2 penalty on the coefficients, not the intercept (default: 0.0)
    pub ridge: f64,
}

impl Default for LinearConfig {
    fn default() -> Self {
        Self { ridge: 0.0 }
    }
}

#[derive(Debug, Clone)]
struct LinearFit {
    coefficients: Array1<f64>,
    intercept: f64,
}

/// Least-squares linear regression.
#[derive(Debug, Clone, Default)]
pub struct LinearRegression {
    config: LinearConfig,
    fit: Option<LinearFit>,
}

impl LinearRegression {
    /// Create an unfitted model with the given configuration.
    pub const fn with_config(config: LinearConfig) -> Self {
        Self { config, fit: None }
    }

    /// Fitted coefficients, one per feature.
    pub fn coefficients(&self) -> Option<&Array1<f64>> {
        self.fit.as_ref().map(|f| &f.coefficients)
    }

    /// Fitted intercept.
    pub fn intercept(&self) -> Option<f64> {
        self.fit.as_ref().map(|f| f.intercept)
    }
}

impl Regressor for LinearRegression {
    fn name(&self) -> &str {
        "linear"
    }

    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<(), ModelError> {
        check_training_set(x, y)?;
        if self.config.ridge.is_nan() || self.config.ridge < 0.0 {
            return Err(ModelError::InvalidParameter(format!(
                "ridge penalty must be non-negative, got {}",
                self.config.ridge
            )));
        }

        let n = x.nrows() as f64;
        let x_mean = x.sum_axis(Axis(0)) / n;
        let y_mean = y.sum() / n;

        let xc = x - &x_mean.view().insert_axis(Axis(0));
        let yc = y - y_mean;

        let mut gram = xc.t().dot(&xc);
        if self.config.ridge > 0.0 {
            for i in 0..gram.nrows() {
                gram[[i, i]] += self.config.ridge;
            }
        }

        let coefficients = symmetric_pseudo_inverse(&gram)?.dot(&xc.t().dot(&yc));
        let intercept = y_mean - x_mean.dot(&coefficients);

        if !intercept.is_finite() || coefficients.iter().any(|c| !c.is_finite()) {
            return Err(ModelError::Numerical(
                "least-squares solution is not finite".to_string(),
            ));
        }

        tracing::trace!(features = x.ncols(), rows = x.nrows(), intercept, "linear model fitted");

        self.fit = Some(LinearFit {
            coefficients,
            intercept,
        });
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>, ModelError> {
        let fit = self
            .fit
            .as_ref()
            .ok_or_else(|| ModelError::NotFitted(self.name().to_string()))?;
        check_width(x, fit.coefficients.len())?;
        Ok(x.dot(&fit.coefficients) + fit.intercept)
    }
}
