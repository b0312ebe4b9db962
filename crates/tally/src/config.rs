//! Pipeline and batch configuration.
//!
//! Every field has a default, so a configuration file only needs to name the
//! values it overrides:
//!
//! ```json
//! { "lag_order": 6, "model": "linear", "network": { "max_epochs": 200 } }
//! ```

use crate::models::ModelKind;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use tally_features::{FeatureError, ScalerFit, TimeOrderedSplit};
use tally_models::{LinearConfig, ModelError, NetworkConfig, SensitivityConfig};
use thiserror::Error;

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Configuration file could not be read
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration file is not valid JSON for this schema
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A value is out of range
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Split settings rejected
    #[error(transparent)]
    Feature(#[from] FeatureError),

    /// Model settings rejected
    #[error(transparent)]
    Model(#[from] ModelError),
}

/// Configuration of one segment pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Number of preceding weeks used as features (default: 4)
    pub lag_order: usize,
    /// Fraction of rows held out for evaluation (default: 0.3)
    pub test_ratio: f64,
    /// Which rows the scalers learn their bounds from (default: full table)
    pub scaler_fit: ScalerFit,
    /// Regressor used for every segment (default: network)
    pub model: ModelKind,
    /// Sensitivity perturbation settings
    pub sensitivity: SensitivityConfig,
    /// Settings for [`ModelKind::Linear`]
    pub linear: LinearConfig,
    /// Settings for [`ModelKind::Network`]
    pub network: NetworkConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            lag_order: 4,
            test_ratio: 0.3,
            scaler_fit: ScalerFit::default(),
            model: ModelKind::default(),
            sensitivity: SensitivityConfig::default(),
            linear: LinearConfig::default(),
            network: NetworkConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Load overrides from a JSON file and validate the result.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Check every value the pipeline depends on.
    ///
    /// # Errors
    /// Returns the first out-of-range value found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.lag_order == 0 {
            return Err(ConfigError::InvalidParameter(
                "lag_order must be at least 1".to_string(),
            ));
        }
        TimeOrderedSplit::new(self.test_ratio)?;

        let sensitivity = &self.sensitivity;
        if !sensitivity.relative_delta.is_finite() || sensitivity.relative_delta == 0.0 {
            return Err(ConfigError::InvalidParameter(format!(
                "sensitivity.relative_delta must be finite and non-zero, got {}",
                sensitivity.relative_delta
            )));
        }
        if !sensitivity.holiday_threshold.is_finite() {
            return Err(ConfigError::InvalidParameter(
                "sensitivity.holiday_threshold must be finite".to_string(),
            ));
        }

        if self.linear.ridge.is_nan() || self.linear.ridge < 0.0 {
            return Err(ConfigError::InvalidParameter(format!(
                "linear.ridge must be non-negative, got {}",
                self.linear.ridge
            )));
        }
        self.network.validate()?;

        Ok(())
    }
}

/// Configuration of a concurrent batch run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Maximum segments in flight (default: 4)
    pub concurrency: usize,
    /// Per-segment time budget in milliseconds; `None` means unbounded
    pub timeout_ms: Option<u64>,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            concurrency: 4,
            timeout_ms: None,
        }
    }
}

impl BatchConfig {
    /// Per-segment time budget.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }

    /// Check the batch settings.
    ///
    /// # Errors
    /// Returns [`ConfigError::InvalidParameter`] if `concurrency` is zero.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.concurrency == 0 {
            return Err(ConfigError::InvalidParameter(
                "concurrency must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let config = PipelineConfig::default();
        assert_eq!(config.lag_order, 4);
        assert_eq!(config.test_ratio, 0.3);
        assert_eq!(config.scaler_fit, ScalerFit::FullTable);
        assert!(config.validate().is_ok());
        assert!(BatchConfig::default().validate().is_ok());
    }

    #[test]
    fn test_partial_json_overrides() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{ "lag_order": 6, "model": "linear", "network": {{ "max_epochs": 20 }} }}"#
        )
        .unwrap();

        let config = PipelineConfig::from_json_file(file.path()).unwrap();
        assert_eq!(config.lag_order, 6);
        assert_eq!(config.model, ModelKind::Linear);
        assert_eq!(config.network.max_epochs, 20);
        assert_eq!(config.network.patience, 10);
        assert_eq!(config.test_ratio, 0.3);
    }

    #[test]
    fn test_rejects_zero_lag_order() {
        let config = PipelineConfig {
            lag_order: 0,
            ..PipelineConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_rejects_bad_ratio() {
        let config = PipelineConfig {
            test_ratio: 1.0,
            ..PipelineConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Feature(_))));
    }

    #[test]
    fn test_rejects_zero_delta() {
        let mut config = PipelineConfig::default();
        config.sensitivity.relative_delta = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_batch_timeout() {
        let batch = BatchConfig {
            concurrency: 2,
            timeout_ms: Some(1500),
        };
        assert_eq!(batch.timeout(), Some(Duration::from_millis(1500)));
        assert!(BatchConfig::default().timeout().is_none());

        let zero = BatchConfig {
            concurrency: 0,
            timeout_ms: None,
        };
        assert!(zero.validate().is_err());
    }
}
