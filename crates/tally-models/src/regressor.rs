//! Regressor Capability
//!
//! Any model that can be fitted on a feature matrix and a target vector and
//! then predict one value per row. Callers never look inside a model; feature
//! effects are measured by perturbing inputs (see [`crate::sensitivity`]).

use crate::error::ModelError;
use ndarray::{Array1, Array2};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Shared stop request for a fit running on another thread.
///
/// Clones share one flag. Once cancelled it stays cancelled.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    /// A flag that has not been cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask every holder of this flag to stop.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    /// Whether [`Self::cancel`] has been called.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    /// `Err(ModelError::Cancelled)` once cancelled.
    pub fn check(&self) -> Result<(), ModelError> {
        if self.is_cancelled() {
            return Err(ModelError::Cancelled);
        }
        Ok(())
    }
}

/// Fit/predict capability shared by all models.
///
/// Implementations must be deterministic: the same training data and the same
/// configuration produce the same predictions.
pub trait Regressor: Send {
    /// Short model name used in logs and reports
    fn name(&self) -> &str;

    /// Fit the model to `x` (rows x features) and `y` (one value per row).
    ///
    /// Refitting replaces any previous state.
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<(), ModelError>;

    /// [`Self::fit`], stopping with [`ModelError::Cancelled`] once `cancel` is set.
    ///
    /// The default only checks before fitting. Models with long training loops
    /// should override it and check between iterations.
    fn fit_until(
        &mut self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        cancel: &CancelFlag,
    ) -> Result<(), ModelError> {
        cancel.check()?;
        self.fit(x, y)
    }

    /// Predict one value per row of `x`.
    ///
    /// Returns [`ModelError::NotFitted`] before a successful [`Self::fit`].
    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>, ModelError>;
}

impl<R: Regressor + ?Sized> Regressor for Box<R> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<(), ModelError> {
        (**self).fit(x, y)
    }

    fn fit_until(
        &mut self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        cancel: &CancelFlag,
    ) -> Result<(), ModelError> {
        (**self).fit_until(x, y, cancel)
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>, ModelError> {
        (**self).predict(x)
    }
}

/// Check that `x` and `y` describe the same non-empty set of rows.
pub(crate) fn check_training_set(x: &Array2<f64>, y: &Array1<f64>) -> Result<(), ModelError> {
    if x.nrows() == 0 {
        return Err(ModelError::EmptyTrainingSet);
    }
    if x.nrows() != y.len() {
        return Err(ModelError::DimensionMismatch {
            expected: x.nrows(),
            actual: y.len(),
        });
    }
    Ok(())
}

/// Check that `x` has the width seen during fitting.
pub(crate) fn check_width(x: &Array2<f64>, expected: usize) -> Result<(), ModelError> {
    if x.ncols() != expected {
        return Err(ModelError::DimensionMismatch {
            expected,
            actual: x.ncols(),
        });
    }
    Ok(())
}
