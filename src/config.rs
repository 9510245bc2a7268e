//! Tracker configuration
//!
//! Loaded from `<config dir>/naamjap/config.json`. Every field has a
//! default, so a missing file or a partial file is fine.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::profile::DEFAULT_DAILY_GOAL;

/// Phrases every new profile starts with
pub const DEFAULT_PHRASES: [&str; 4] = ["Om Namah Shivaya", "Hare Krishna", "Jai Shri Ram", "Om"];

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid config file {path:?}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// First day of the displayed week
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WeekStart {
    #[default]
    Sunday,
    Monday,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Phrase list seeded into new profiles; the first one becomes active
    pub default_phrases: Vec<String>,
    /// Round size seeded into new profiles
    pub default_daily_goal: u32,
    pub week_starts_on: WeekStart,
    /// SQLite file holding profile documents
    pub database_path: Option<PathBuf>,
    /// `tracing` level name
    pub log_level: String,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            default_phrases: DEFAULT_PHRASES.iter().map(|p| p.to_string()).collect(),
            default_daily_goal: DEFAULT_DAILY_GOAL,
            week_starts_on: WeekStart::Sunday,
            database_path: None,
            log_level: "info".to_string(),
        }
    }
}

impl TrackerConfig {
    /// Load from the default location, falling back to defaults when the
    /// file does not exist
    pub fn load() -> Result<Self, ConfigError> {
        match default_config_path() {
            Some(path) => Self::load_from(&path),
            None => Ok(Self::default()),
        }
    }

    /// Load from an explicit path
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::debug!("No config file at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        Self::from_json(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_json(content: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(content)
    }

    /// Non-empty phrase list for new profiles
    pub fn phrases(&self) -> Vec<String> {
        let phrases: Vec<String> = self
            .default_phrases
            .iter()
            .filter(|p| !p.trim().is_empty())
            .cloned()
            .collect();

        if phrases.is_empty() {
            DEFAULT_PHRASES.iter().map(|p| p.to_string()).collect()
        } else {
            phrases
        }
    }

    /// Phrase used when a profile has no active phrase
    pub fn fallback_phrase(&self) -> String {
        self.phrases()
            .into_iter()
            .next()
            .unwrap_or_else(|| DEFAULT_PHRASES[0].to_string())
    }

    /// Positive round size for new profiles
    pub fn daily_goal(&self) -> u32 {
        if self.default_daily_goal == 0 {
            DEFAULT_DAILY_GOAL
        } else {
            self.default_daily_goal
        }
    }

    pub fn database_path(&self) -> PathBuf {
        self.database_path
            .clone()
            .unwrap_or_else(crate::db::default_db_path)
    }
}

/// Get the default config file path
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("naamjap").join("config.json"))
}
