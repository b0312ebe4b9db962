#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/tally/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod autocorrelation;
pub mod builder;
pub mod error;
pub mod scaler;
pub mod split;
pub mod window;

pub use autocorrelation::{autocorrelation, partial_autocorrelation, significant_lags};
pub use builder::{
    EXOGENOUS_COLUMNS, HOLIDAY_COLUMN, SegmentFeatureBuilder, SegmentFeatures, TARGET_COLUMN,
};
pub use error::FeatureError;
pub use scaler::{MinMaxScaler, ScalerFit, ScalerState};
pub use split::{SplitData, TimeOrderedSplit};
pub use window::{Alignment, LagTable, LagWindowConfig, LagWindower};

/// Version information.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
