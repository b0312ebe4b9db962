#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/tally/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod export;
pub mod summary;

pub use export::{
    ExportError, ExportFormat, Exporter, ForecastPointExport, NO_HOLIDAY_ROWS, SensitivityExport,
};
pub use summary::{BatchSummary, FeatureAverage};

/// Version information.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
