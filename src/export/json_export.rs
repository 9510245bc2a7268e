//! JSON export functionality
//!
//! Writes the history rows inside an envelope carrying export metadata and
//! the profile's streak figures.

use std::io::Write;
use std::path::Path;

use serde::Serialize;

use super::{ExportError, HistoryRow};
use crate::models::Profile;
use crate::trends::daily::highest_day_total;

const EXPORT_VERSION: &str = "1.0.0";

/// Complete export structure for JSON
#[derive(Debug, Clone, Serialize)]
pub struct HistoryExportJson {
    pub export_date: String,
    pub export_version: &'static str,
    pub summary: HistorySummary,
    pub rows: Vec<HistoryRow>,
}

/// Streak figures and totals at export time
#[derive(Debug, Clone, Serialize)]
pub struct HistorySummary {
    pub phrases: Vec<String>,
    pub daily_goal: u32,
    pub streak: u32,
    pub max_streak: u32,
    pub last_active_date: Option<String>,
    pub days_recorded: usize,
    pub total_count: u64,
    pub highest_day_total: u64,
    pub date_range: Option<(String, String)>,
}

impl HistoryExportJson {
    pub fn new(profile: &Profile, rows: &[HistoryRow]) -> Self {
        // History keys are date-ordered
        let date_range = profile
            .history
            .keys()
            .next()
            .zip(profile.history.keys().next_back())
            .map(|(first, last)| (first.clone(), last.clone()));

        Self {
            export_date: chrono::Utc::now().to_rfc3339(),
            export_version: EXPORT_VERSION,
            summary: HistorySummary {
                phrases: profile.phrases.clone(),
                daily_goal: profile.daily_goal,
                streak: profile.streak,
                max_streak: profile.max_streak,
                last_active_date: profile.last_active_date.clone(),
                days_recorded: profile.history.len(),
                total_count: rows.iter().fold(0u64, |sum, r| sum.saturating_add(r.count)),
                highest_day_total: highest_day_total(&profile.history),
                date_range,
            },
            rows: rows.to_vec(),
        }
    }
}

/// Write the history export envelope to `path`
pub fn write_history_json(
    profile: &Profile,
    rows: &[HistoryRow],
    path: &Path,
) -> Result<(), ExportError> {
    let export = HistoryExportJson::new(profile, rows);
    let json = serde_json::to_string_pretty(&export)?;

    let mut file = std::fs::File::create(path)?;
    file.write_all(json.as_bytes())?;

    Ok(())
}
