//! Export functionality for Tally results.
//!
//! Batch outcomes and forecasts are flattened into plain rows so that every
//! format (CSV, JSON) sees the same shape.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

/// Note written in place of a holiday sensitivity when no holiday row exists.
pub const NO_HOLIDAY_ROWS: &str = "no holiday rows";

/// Errors that can occur during export operations.
#[derive(Debug, Error)]
pub enum ExportError {
    /// CSV serialization error.
    #[error("CSV serialization error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON serialization error.
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid format error.
    #[error("Invalid format: {0}")]
    InvalidFormat(String),
}

/// Export format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    /// Comma-separated values format.
    Csv,

    /// Compact JSON format.
    Json,

    /// Pretty-printed JSON format.
    PrettyJson,
}

impl ExportFormat {
    /// Get the file extension for this format.
    pub const fn extension(&self) -> &str {
        match self {
            Self::Csv => "csv",
            Self::Json | Self::PrettyJson => "json",
        }
    }
}

impl FromStr for ExportFormat {
    type Err = ExportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "csv" => Ok(Self::Csv),
            "json" => Ok(Self::Json),
            "pretty-json" | "pretty_json" | "pretty" => Ok(Self::PrettyJson),
            other => Err(ExportError::InvalidFormat(other.to_string())),
        }
    }
}

/// One row of a batch sensitivity export.
///
/// A completed segment produces one row per feature; a skipped segment
/// produces a single row carrying the reason.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SensitivityExport {
    /// Store id.
    pub store: u32,

    /// Department id.
    pub department: u32,

    /// `completed` or `skipped`.
    pub status: String,

    /// Feature name, for completed segments.
    pub feature: Option<String>,

    /// Sensitivity at the most recent row, in percent.
    pub overall_pct: Option<f64>,

    /// Sensitivity at the most recent holiday row, in percent.
    pub holiday_pct: Option<f64>,

    /// Set to [`NO_HOLIDAY_ROWS`] when no holiday sensitivity exists.
    pub holiday_note: Option<String>,

    /// Skip reason, for skipped segments.
    pub reason: Option<String>,
}

impl SensitivityExport {
    /// Row for one feature of a completed segment.
    ///
    /// A `holiday_pct` of `None` records the no-holiday-rows note.
    pub fn feature(
        store: u32,
        department: u32,
        feature: impl Into<String>,
        overall_pct: f64,
        holiday_pct: Option<f64>,
    ) -> Self {
        Self {
            store,
            department,
            status: "completed".to_string(),
            feature: Some(feature.into()),
            overall_pct: Some(overall_pct),
            holiday_pct,
            holiday_note: holiday_pct.is_none().then(|| NO_HOLIDAY_ROWS.to_string()),
            reason: None,
        }
    }

    /// Row for a skipped segment.
    pub fn skipped(store: u32, department: u32, reason: impl Into<String>) -> Self {
        Self {
            store,
            department,
            status: "skipped".to_string(),
            feature: None,
            overall_pct: None,
            holiday_pct: None,
            holiday_note: None,
            reason: Some(reason.into()),
        }
    }

    /// Whether the row belongs to a completed segment.
    pub fn is_completed(&self) -> bool {
        self.status == "completed"
    }
}

/// One predicted week of a forecast export.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ForecastPointExport {
    /// Target week.
    pub week: NaiveDate,

    /// `train` or `test`.
    pub split: String,

    /// Observed weekly sales.
    pub actual: f64,

    /// Predicted weekly sales.
    pub predicted: f64,
}

impl ForecastPointExport {
    /// Create a new forecast point.
    pub fn new(week: NaiveDate, split: impl Into<String>, actual: f64, predicted: f64) -> Self {
        Self {
            week,
            split: split.into(),
            actual,
            predicted,
        }
    }
}

/// Trait for exporting data in various formats.
pub trait Exporter {
    /// Export data to a string in the specified format.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    fn export_to_string(&self, format: ExportFormat) -> Result<String, ExportError>;

    /// Export data to a file in the specified format.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or file writing fails.
    fn export_to_file(&self, path: &Path, format: ExportFormat) -> Result<(), ExportError> {
        let content = self.export_to_string(format)?;
        let mut file = File::create(path)?;
        file.write_all(content.as_bytes())?;
        Ok(())
    }
}

fn records_to_string<T: Serialize>(records: &[T], format: ExportFormat) -> Result<String, ExportError> {
    match format {
        ExportFormat::Csv => {
            let mut wtr = csv::Writer::from_writer(vec![]);
            for record in records {
                wtr.serialize(record)?;
            }
            let bytes = wtr.into_inner().map_err(|e| e.into_error())?;
            String::from_utf8(bytes).map_err(|e| ExportError::InvalidFormat(e.to_string()))
        }
        ExportFormat::Json => Ok(serde_json::to_string(records)?),
        ExportFormat::PrettyJson => Ok(serde_json::to_string_pretty(records)?),
    }
}

impl Exporter for Vec<SensitivityExport> {
    fn export_to_string(&self, format: ExportFormat) -> Result<String, ExportError> {
        records_to_string(self, format)
    }
}

impl Exporter for Vec<ForecastPointExport> {
    fn export_to_string(&self, format: ExportFormat) -> Result<String, ExportError> {
        records_to_string(self, format)
    }
}
