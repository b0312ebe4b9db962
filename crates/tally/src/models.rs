//! Regressor selection.
//!
//! The pipeline never names a concrete model. It asks a [`RegressorFactory`]
//! for a fresh, unfitted instance per segment, so no fitted state leaks from
//! one segment into the next.

use crate::config::PipelineConfig;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tally_models::{
    FeedForwardNetwork, LinearConfig, LinearRegression, MeanRegressor, NetworkConfig, Regressor,
};

/// Built-in regressors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    /// Predicts the training mean
    Mean,
    /// Least-squares linear regression
    Linear,
    /// Dense ReLU network
    #[default]
    Network,
}

impl ModelKind {
    /// Every built-in model.
    pub const fn all() -> [Self; 3] {
        [Self::Mean, Self::Linear, Self::Network]
    }

    /// Short name used on the command line and in configuration files.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Mean => "mean",
            Self::Linear => "linear",
            Self::Network => "network",
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ModelKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mean" | "baseline" => Ok(Self::Mean),
            "linear" | "ols" => Ok(Self::Linear),
            "network" | "mlp" | "nn" => Ok(Self::Network),
            other => Err(format!(
                "Unknown model '{other}' (expected one of: mean, linear, network)"
            )),
        }
    }
}

/// Produces fresh, unfitted regressors.
pub trait RegressorFactory: Send + Sync {
    /// Create a new regressor.
    fn create(&self) -> Box<dyn Regressor>;
}

impl<F> RegressorFactory for F
where
    F: Fn() -> Box<dyn Regressor> + Send + Sync,
{
    fn create(&self) -> Box<dyn Regressor> {
        self()
    }
}

/// Factory for the built-in regressors.
#[derive(Debug, Clone, Default)]
pub struct ModelFactory {
    kind: ModelKind,
    linear: LinearConfig,
    network: NetworkConfig,
}

impl ModelFactory {
    /// Factory for `kind` with default model settings.
    pub fn new(kind: ModelKind) -> Self {
        Self {
            kind,
            ..Self::default()
        }
    }

    /// Factory for the model named in a pipeline configuration.
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self {
            kind: config.model,
            linear: config.linear.clone(),
            network: config.network.clone(),
        }
    }

    /// Model produced by this factory.
    pub const fn kind(&self) -> ModelKind {
        self.kind
    }
}

impl RegressorFactory for ModelFactory {
    fn create(&self) -> Box<dyn Regressor> {
        match self.kind {
            ModelKind::Mean => Box::new(MeanRegressor::new()),
            ModelKind::Linear => Box::new(LinearRegression::with_config(self.linear.clone())),
            ModelKind::Network => Box::new(FeedForwardNetwork::with_config(self.network.clone())),
        }
    }
}
