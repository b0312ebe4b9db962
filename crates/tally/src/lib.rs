#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/tally/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod batch;
pub mod config;
pub mod models;
pub mod outcome;
pub mod pipeline;
pub mod report;

// Re-export main types from sub-crates
pub use tally_data as data;
pub use tally_features as features;
pub use tally_models as regressors;
pub use tally_output as output;

pub use batch::{run_batch_concurrent, run_batch_concurrent_with_progress};
pub use config::{BatchConfig, ConfigError, PipelineConfig};
pub use models::{ModelFactory, ModelKind, RegressorFactory};
pub use outcome::{
    ForecastPoint, ForecastReport, NamedSensitivity, RowCounts, SegmentOutcome,
    SensitivityRecord, SkipReason, SplitSide,
};
pub use pipeline::SegmentPipeline;
pub use report::{batch_exports, batch_summary};

/// Version information.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
