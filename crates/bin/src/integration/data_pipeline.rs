//! Data pipeline for loading the panel and choosing segments.
//!
//! Resolves the pipeline configuration (file, then command-line overrides),
//! loads the three source tables with a spinner, and turns the user's segment
//! selection into an ordered key list.

use indicatif::ProgressBar;
use std::path::Path;
use std::time::{Duration, Instant};
use tally::data::{DataError, Panel, PanelSources, SegmentKey, load_panel, sample_keys};
use tally::{ConfigError, ModelKind, PipelineConfig};

/// Error type for data pipeline operations.
#[derive(Debug, thiserror::Error)]
pub(crate) enum DataPipelineError {
    /// Panel could not be loaded.
    #[error("Data error: {0}")]
    Data(#[from] DataError),
    /// Configuration could not be loaded or is invalid.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    /// Segment key not in `STORE:DEPT` form.
    #[error("Invalid segment key '{0}' (expected STORE:DEPT)")]
    InvalidKey(String),
    /// Selection matched nothing.
    #[error("No segments selected: {0}")]
    NoSegments(String),
}

/// Command-line values that override the configuration file.
#[derive(Debug, Clone, Default)]
pub(crate) struct ConfigOverrides {
    /// `--lag-order`
    pub lag_order: Option<usize>,
    /// `--model`
    pub model: Option<ModelKind>,
}

/// How the batch keys are chosen.
#[derive(Debug, Clone, Default)]
pub(crate) struct KeySelection {
    /// Explicit keys, used as given when non-empty.
    pub keys: Vec<SegmentKey>,
    /// Keep only segments with this many weeks (default: the most common length).
    pub length: Option<usize>,
    /// Sample this many of the candidates.
    pub sample: Option<usize>,
    /// Sampling seed.
    pub seed: u64,
}

/// Load the configuration file, if any, and apply the overrides.
pub(crate) fn resolve_config(
    path: Option<&Path>,
    overrides: &ConfigOverrides,
) -> Result<PipelineConfig, DataPipelineError> {
    let mut config = match path {
        Some(path) => PipelineConfig::from_json_file(path)?,
        None => PipelineConfig::default(),
    };
    if let Some(lag_order) = overrides.lag_order {
        config.lag_order = lag_order;
    }
    if let Some(model) = overrides.model {
        config.model = model;
    }
    config.validate()?;
    Ok(config)
}

/// Load the panel from the canonical files in `data_dir`, with a spinner.
pub(crate) fn load_panel_with_spinner(data_dir: &Path) -> Result<Panel, DataPipelineError> {
    let sources = PanelSources::in_dir(data_dir);

    let spinner = ProgressBar::new_spinner();
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner.set_message(format!("Loading panel from {}...", data_dir.display()));

    let started = Instant::now();
    match load_panel(&sources) {
        Ok(panel) => {
            spinner.finish_with_message(format!(
                "Loaded {} rows in {} segments ({:.1}s)",
                panel.len(),
                panel.segment_count(),
                started.elapsed().as_secs_f64()
            ));
            Ok(panel)
        }
        Err(e) => {
            spinner.finish_with_message("Failed!");
            Err(e.into())
        }
    }
}

/// Parse `STORE:DEPT` (a `/` separator is also accepted).
pub(crate) fn parse_key(text: &str) -> Result<SegmentKey, DataPipelineError> {
    let invalid = || DataPipelineError::InvalidKey(text.to_string());

    let (store, dept) = text
        .split_once(':')
        .or_else(|| text.split_once('/'))
        .ok_or_else(invalid)?;
    let store = store.trim().parse().map_err(|_| invalid())?;
    let dept = dept.trim().parse().map_err(|_| invalid())?;

    Ok(SegmentKey::new(store, dept))
}

/// Resolve a selection against the panel.
///
/// Explicit keys are returned as given, in order, even if some are not in the
/// panel; the pipeline reports those as skipped.
pub(crate) fn select_keys(
    panel: &Panel,
    selection: &KeySelection,
) -> Result<Vec<SegmentKey>, DataPipelineError> {
    if !selection.keys.is_empty() {
        return Ok(selection.keys.clone());
    }

    let length = match selection.length {
        Some(length) => length,
        None => panel
            .modal_length()
            .map(|(length, _)| length)
            .ok_or_else(|| DataPipelineError::NoSegments("panel is empty".to_string()))?,
    };

    let candidates = panel.keys_with_length(length);
    if candidates.is_empty() {
        return Err(DataPipelineError::NoSegments(format!(
            "no segment has {length} weeks"
        )));
    }

    let keys = match selection.sample {
        Some(n) => sample_keys(&candidates, n, selection.seed),
        None => candidates,
    };
    tracing::debug!(length, selected = keys.len(), "selected segments");

    Ok(keys)
}
