//! Export module for CSV and JSON export functionality
//!
//! Flattens a profile's history into `(date, phrase, count)` rows and writes
//! them as CSV or as a JSON document with a streak summary.

pub mod csv_export;
pub mod json_export;

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{DayRecord, History, Profile};

pub use csv_export::write_history_csv;
pub use json_export::{write_history_json, HistoryExportJson};

/// Export errors
#[derive(Error, Debug)]
pub enum ExportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid export format: {0}. Use 'csv' or 'json'")]
    UnknownFormat(String),
}

/// Export format options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Csv,
    Json,
}

impl std::str::FromStr for ExportFormat {
    type Err = ExportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "csv" => Ok(ExportFormat::Csv),
            "json" => Ok(ExportFormat::Json),
            _ => Err(ExportError::UnknownFormat(s.to_string())),
        }
    }
}

impl ExportFormat {
    /// Get file extension for format
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Json => "json",
        }
    }
}

/// One exported count
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryRow {
    pub date: String,
    /// Empty for days recorded before per-phrase counts existed
    pub phrase: String,
    pub count: u64,
}

/// Flatten a history into rows ordered by date, then phrase
pub fn history_rows(history: &History) -> Vec<HistoryRow> {
    let mut rows = Vec::new();

    for (date, record) in history {
        match record {
            DayRecord::Legacy(count) => rows.push(HistoryRow {
                date: date.clone(),
                phrase: String::new(),
                count: *count,
            }),
            DayRecord::ByPhrase(counts) => {
                rows.extend(counts.iter().map(|(phrase, count)| HistoryRow {
                    date: date.clone(),
                    phrase: phrase.clone(),
                    count: *count,
                }));
            }
        }
    }

    rows
}

/// Write a profile's history to `path` in the given format
pub fn export_history(
    profile: &Profile,
    format: ExportFormat,
    path: &Path,
) -> Result<(), ExportError> {
    let rows = history_rows(&profile.history);

    match format {
        ExportFormat::Csv => write_history_csv(&rows, path)?,
        ExportFormat::Json => write_history_json(profile, &rows, path)?,
    }

    tracing::info!("Exported {} history rows to {:?}", rows.len(), path);
    Ok(())
}

/// Get the default export directory (Downloads folder or temp dir)
pub fn get_export_directory() -> PathBuf {
    dirs::download_dir()
        .or_else(dirs::document_dir)
        .unwrap_or_else(std::env::temp_dir)
}

/// Generate a timestamped filename for exports
pub fn generate_export_filename(prefix: &str, format: ExportFormat) -> String {
    let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
    format!("{}_{}.{}", prefix, timestamp, format.extension())
}
