#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/tally/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod error;
pub mod linalg;
pub mod linear;
pub mod mean;
pub mod metrics;
pub mod network;
pub mod regressor;
pub mod sensitivity;

pub use error::{ModelError, SensitivityError};
pub use linear::{LinearConfig, LinearRegression};
pub use mean::MeanRegressor;
pub use metrics::{Evaluation, evaluate, pearson};
pub use network::{FeedForwardNetwork, NetworkConfig};
pub use regressor::{CancelFlag, Regressor};
pub use sensitivity::{
    FeatureSensitivity, SensitivityAnalyzer, SensitivityConfig, SensitivityValue,
};

/// Version information.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
