#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/tally/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod error;
pub mod loader;
pub mod panel;

pub use error::{DataError, Result};
pub use loader::{PanelSources, load_panel};
pub use panel::{Panel, PanelRow, Segment, SegmentKey, StoreType, sample_keys};

/// Version information.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
