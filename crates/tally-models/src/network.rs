//! Feed-Forward Network
//!
//! Dense ReLU network with a single linear output, trained on mean squared
//! error with Adam. Dropout follows every hidden layer during training.
//!
//! Training holds out the most recent rows of the training set as a
//! validation tail and stops once the validation loss has not improved for
//! `patience` epochs, restoring the best weights seen.
//!
//! All randomness (initial weights, dropout masks, batch order) comes from a
//! single generator seeded by [`NetworkConfig::seed`], so two fits on the same
//! data produce identical predictions.

use crate::error::ModelError;
use crate::regressor::{CancelFlag, Regressor, check_training_set, check_width};
use ndarray::{Array1, Array2, Axis, s};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand_distr::{Bernoulli, Distribution, Normal};
use serde::{Deserialize, Serialize};

/// Adam first-moment decay.
const BETA1: f64 = 0.9;
/// Adam second-moment decay.
const BETA2: f64 = 0.999;
/// Adam denominator guard.
const ADAM_EPSILON: f64 = 1e-7;

/// Configuration for the feed-forward network
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Hidden layer widths (default: [100, 50])
    pub hidden_layers: Vec<usize>,
    /// Dropout rate after each hidden layer (default: 0.2)
    pub dropout: f64,
    /// Adam learning rate (default: 0.001)
    pub learning_rate: f64,
    /// Maximum training epochs (default: 1000)
    pub max_epochs: usize,
    /// Mini-batch size as a fraction of training rows (default: 0.1)
    pub batch_fraction: f64,
    /// Fraction of training rows held out, from the end, for early stopping (default: 0.2)
    pub validation_fraction: f64,
    /// Epochs without validation improvement before stopping (default: 10)
    pub patience: usize,
    /// Standard deviation of the normal weight initialiser (default: 0.05)
    pub init_std: f64,
    /// Random seed (default: 42)
    pub seed: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            hidden_layers: vec![100, 50],
            dropout: 0.2,
            learning_rate: 0.001,
            max_epochs: 1000,
            batch_fraction: 0.1,
            validation_fraction: 0.2,
            patience: 10,
            init_std: 0.05,
            seed: 42,
        }
    }
}

impl NetworkConfig {
    /// Check parameter ranges.
    ///
    /// # Errors
    /// Returns [`ModelError::InvalidParameter`] describing the first bad field.
    pub fn validate(&self) -> Result<(), ModelError> {
        let invalid = |msg: String| Err(ModelError::InvalidParameter(msg));

        if self.hidden_layers.iter().any(|w| *w == 0) {
            return invalid("hidden layer widths must be positive".to_string());
        }
        if !(0.0..1.0).contains(&self.dropout) {
            return invalid(format!("dropout must be in [0, 1), got {}", self.dropout));
        }
        if !(self.learning_rate > 0.0) {
            return invalid(format!(
                "learning rate must be positive, got {}",
                self.learning_rate
            ));
        }
        if self.max_epochs == 0 {
            return invalid("max epochs must be at least 1".to_string());
        }
        if !(self.batch_fraction > 0.0 && self.batch_fraction <= 1.0) {
            return invalid(format!(
                "batch fraction must be in (0, 1], got {}",
                self.batch_fraction
            ));
        }
        if !(0.0..1.0).contains(&self.validation_fraction) {
            return invalid(format!(
                "validation fraction must be in [0, 1), got {}",
                self.validation_fraction
            ));
        }
        if !(self.init_std > 0.0) {
            return invalid(format!(
                "initialiser std must be positive, got {}",
                self.init_std
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
struct Dense {
    weights: Array2<f64>,
    bias: Array1<f64>,
}

impl Dense {
    fn new(inputs: usize, outputs: usize, init: &Normal<f64>, rng: &mut StdRng) -> Self {
        Self {
            weights: Array2::from_shape_simple_fn((inputs, outputs), || init.sample(&mut *rng)),
            bias: Array1::zeros(outputs),
        }
    }

    fn forward(&self, input: &Array2<f64>) -> Array2<f64> {
        input.dot(&self.weights) + &self.bias
    }
}

#[derive(Debug, Clone)]
struct Moments {
    m_w: Array2<f64>,
    v_w: Array2<f64>,
    m_b: Array1<f64>,
    v_b: Array1<f64>,
}

impl Moments {
    fn for_layer(layer: &Dense) -> Self {
        Self {
            m_w: Array2::zeros(layer.weights.raw_dim()),
            v_w: Array2::zeros(layer.weights.raw_dim()),
            m_b: Array1::zeros(layer.bias.len()),
            v_b: Array1::zeros(layer.bias.len()),
        }
    }
}

/// Cached activations of one training forward pass.
struct Trace {
    /// Input to each layer (post-activation, post-dropout of the previous one)
    inputs: Vec<Array2<f64>>,
    /// Pre-activation of each hidden layer
    pre_activations: Vec<Array2<f64>>,
    /// Inverted dropout mask of each hidden layer
    masks: Vec<Array2<f64>>,
    output: Array1<f64>,
}

/// Dense feed-forward regressor.
#[derive(Debug, Clone, Default)]
pub struct FeedForwardNetwork {
    config: NetworkConfig,
    layers: Vec<Dense>,
    input_width: Option<usize>,
    epochs_trained: usize,
}

impl FeedForwardNetwork {
    /// Create an unfitted network.
    pub fn with_config(config: NetworkConfig) -> Self {
        Self {
            config,
            layers: Vec::new(),
            input_width: None,
            epochs_trained: 0,
        }
    }

    /// Current configuration.
    pub const fn config(&self) -> &NetworkConfig {
        &self.config
    }

    /// Epochs run by the last fit, including those after the best epoch.
    pub const fn epochs_trained(&self) -> usize {
        self.epochs_trained
    }

    fn forward(&self, x: &Array2<f64>) -> Array1<f64> {
        let last = self.layers.len() - 1;
        let mut activation = x.clone();
        for layer in &self.layers[..last] {
            activation = layer.forward(&activation).mapv(relu);
        }
        self.layers[last].forward(&activation).column(0).to_owned()
    }

    fn forward_train(&self, x: &Array2<f64>, keep: Option<&Bernoulli>, rng: &mut StdRng) -> Trace {
        let last = self.layers.len() - 1;
        let scale = 1.0 / (1.0 - self.config.dropout);

        let mut inputs = Vec::with_capacity(self.layers.len());
        let mut pre_activations = Vec::with_capacity(last);
        let mut masks = Vec::with_capacity(last);

        let mut activation = x.clone();
        for layer in &self.layers[..last] {
            let z = layer.forward(&activation);
            let mask = match keep {
                Some(dist) => Array2::from_shape_simple_fn(z.raw_dim(), || {
                    if dist.sample(&mut *rng) { scale } else { 0.0 }
                }),
                None => Array2::ones(z.raw_dim()),
            };
            inputs.push(activation);
            activation = z.mapv(relu) * &mask;
            pre_activations.push(z);
            masks.push(mask);
        }
        let output = self.layers[last].forward(&activation).column(0).to_owned();
        inputs.push(activation);

        Trace {
            inputs,
            pre_activations,
            masks,
            output,
        }
    }

    fn gradients(&self, trace: &Trace, y: &Array1<f64>) -> Vec<(Array2<f64>, Array1<f64>)> {
        let rows = y.len() as f64;
        let mut delta = ((&trace.output - y) * (2.0 / rows)).insert_axis(Axis(1));
        let mut grads = Vec::with_capacity(self.layers.len());

        for l in (0..self.layers.len()).rev() {
            let grad_w = trace.inputs[l].t().dot(&delta);
            let grad_b = delta.sum_axis(Axis(0));
            if l > 0 {
                let relu_grad = trace.pre_activations[l - 1].mapv(|z| if z > 0.0 { 1.0 } else { 0.0 });
                delta = delta.dot(&self.layers[l].weights.t()) * &trace.masks[l - 1] * &relu_grad;
            }
            grads.push((grad_w, grad_b));
        }

        grads.reverse();
        grads
    }

    fn adam_step(&mut self, grads: &[(Array2<f64>, Array1<f64>)], moments: &mut [Moments], step: i32) {
        let lr = self.config.learning_rate;
        let correction1 = 1.0 - BETA1.powi(step);
        let correction2 = 1.0 - BETA2.powi(step);

        for ((layer, (grad_w, grad_b)), m) in self.layers.iter_mut().zip(grads).zip(moments) {
            m.m_w = &m.m_w * BETA1 + grad_w * (1.0 - BETA1);
            m.v_w = &m.v_w * BETA2 + &grad_w.mapv(|g| g * g) * (1.0 - BETA2);
            m.m_b = &m.m_b * BETA1 + grad_b * (1.0 - BETA1);
            m.v_b = &m.v_b * BETA2 + &grad_b.mapv(|g| g * g) * (1.0 - BETA2);

            ndarray::Zip::from(&mut layer.weights)
                .and(&m.m_w)
                .and(&m.v_w)
                .for_each(|w, &mw, &vw| {
                    *w -= lr * (mw / correction1) / ((vw / correction2).sqrt() + ADAM_EPSILON);
                });
            ndarray::Zip::from(&mut layer.bias)
                .and(&m.m_b)
                .and(&m.v_b)
                .for_each(|b, &mb, &vb| {
                    *b -= lr * (mb / correction1) / ((vb / correction2).sqrt() + ADAM_EPSILON);
                });
        }
    }

    fn loss(&self, x: &Array2<f64>, y: &Array1<f64>) -> f64 {
        let residual = self.forward(x) - y;
        residual.mapv(|r| r * r).mean().unwrap_or(f64::INFINITY)
    }
}

const fn relu(z: f64) -> f64 {
    if z > 0.0 { z } else { 0.0 }
}

impl Regressor for FeedForwardNetwork {
    fn name(&self) -> &str {
        "network"
    }

    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<(), ModelError> {
        self.fit_until(x, y, &CancelFlag::new())
    }

    fn fit_until(
        &mut self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        cancel: &CancelFlag,
    ) -> Result<(), ModelError> {
        check_training_set(x, y)?;
        self.config.validate()?;

        let mut rng = StdRng::seed_from_u64(self.config.seed);
        let init = Normal::new(0.0, self.config.init_std)
            .map_err(|e| ModelError::InvalidParameter(e.to_string()))?;
        let keep = if self.config.dropout > 0.0 {
            Some(
                Bernoulli::new(1.0 - self.config.dropout)
                    .map_err(|e| ModelError::InvalidParameter(e.to_string()))?,
            )
        } else {
            None
        };

        let mut widths = vec![x.ncols()];
        widths.extend(&self.config.hidden_layers);
        widths.push(1);
        self.layers = widths
            .windows(2)
            .map(|pair| Dense::new(pair[0], pair[1], &init, &mut rng))
            .collect();
        self.input_width = Some(x.ncols());

        let rows = x.nrows();
        let holdout = (rows as f64 * self.config.validation_fraction).floor() as usize;
        let (train_rows, validation) = if holdout > 0 && holdout < rows {
            let boundary = rows - holdout;
            (
                boundary,
                Some((
                    x.slice(s![boundary.., ..]).to_owned(),
                    y.slice(s![boundary..]).to_owned(),
                )),
            )
        } else {
            (rows, None)
        };
        let train_x = x.slice(s![..train_rows, ..]).to_owned();
        let train_y = y.slice(s![..train_rows]).to_owned();

        let batch_size = ((train_rows as f64 * self.config.batch_fraction).floor() as usize).max(1);
        let mut order: Vec<usize> = (0..train_rows).collect();
        let mut moments: Vec<Moments> = self.layers.iter().map(Moments::for_layer).collect();

        let mut best_loss = f64::INFINITY;
        let mut best_layers = self.layers.clone();
        let mut stale = 0;
        let mut step = 0_i32;
        self.epochs_trained = 0;

        for epoch in 0..self.config.max_epochs {
            if let Err(e) = cancel.check() {
                self.input_width = None;
                return Err(e);
            }
            order.shuffle(&mut rng);

            for batch in order.chunks(batch_size) {
                let batch_x = train_x.select(Axis(0), batch);
                let batch_y = train_y.select(Axis(0), batch);

                let trace = self.forward_train(&batch_x, keep.as_ref(), &mut rng);
                let grads = self.gradients(&trace, &batch_y);
                step = step.saturating_add(1);
                self.adam_step(&grads, &mut moments, step);
            }

            self.epochs_trained = epoch + 1;

            let monitored = match &validation {
                Some((vx, vy)) => self.loss(vx, vy),
                None => self.loss(&train_x, &train_y),
            };
            if !monitored.is_finite() {
                return Err(ModelError::Numerical(format!(
                    "training loss diverged at epoch {}",
                    epoch + 1
                )));
            }

            if monitored < best_loss {
                best_loss = monitored;
                best_layers.clone_from(&self.layers);
                stale = 0;
            } else {
                stale += 1;
                if stale >= self.config.patience {
                    tracing::debug!(epoch = epoch + 1, best_loss, "early stopping");
                    break;
                }
            }
        }

        self.layers = best_layers;

        tracing::debug!(
            epochs = self.epochs_trained,
            best_loss,
            train_rows,
            validation_rows = rows - train_rows,
            "network trained"
        );

        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>, ModelError> {
        let width = self
            .input_width
            .ok_or_else(|| ModelError::NotFitted(self.name().to_string()))?;
        check_width(x, width)?;
        Ok(self.forward(x))
    }
}
