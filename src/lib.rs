//! NaamJap - daily mantra repetition tracker
//!
//! This library holds the core of the tracker. It handles:
//! - Per-day, per-phrase repetition counts with legacy record support
//! - Daily streak tracking with self-healing recovery
//! - Weekly, monthly and range statistics
//! - Profile persistence in a document store with live sync
//! - History export to CSV and JSON

pub mod auth;
pub mod clock;
pub mod commands;
pub mod config;
pub mod db;
pub mod export;
pub mod models;
pub mod store;
pub mod streak;
pub mod trends;
pub mod watcher;

use std::sync::Arc;

use auth::{AuthError, AuthSession, IdentityProvider};
use clock::LocalClock;
use config::{ConfigError, TrackerConfig};
use export::ExportError;
use store::{SqliteProfileStore, StoreError};

pub use commands::{LoadState, MutationOutcome, ProfileController, Rejection};
pub use models::{DayRecord, History, Profile};

/// Crate-level error type
#[derive(Debug, thiserror::Error)]
pub enum TrackerError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    #[error("Export error: {0}")]
    Export(#[from] ExportError),

    #[error("Not signed in")]
    NotSignedIn,
}

// Front ends receive errors as plain messages
impl serde::Serialize for TrackerError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

/// Install the fmt subscriber at `level` (`info` when unparseable).
///
/// Returns false if a subscriber was already installed.
pub fn init_logging(level: &str) -> bool {
    let max_level = level.parse::<tracing::Level>().unwrap_or(tracing::Level::INFO);

    tracing_subscriber::fmt()
        .with_max_level(max_level)
        .try_init()
        .is_ok()
}

/// Start the tracker with its on-disk store: load configuration, initialize
/// logging and the profile database, and return a signed-out session.
pub fn start(provider: Arc<dyn IdentityProvider>) -> Result<AuthSession, TrackerError> {
    let config = TrackerConfig::load()?;
    start_with_config(config, provider)
}

pub fn start_with_config(
    config: TrackerConfig,
    provider: Arc<dyn IdentityProvider>,
) -> Result<AuthSession, TrackerError> {
    init_logging(&config.log_level);
    tracing::info!("Starting NaamJap tracker");

    let db_path = config.database_path();
    tracing::info!("Database path: {:?}", db_path);
    let store = SqliteProfileStore::open(db_path)?;

    Ok(AuthSession::new(
        provider,
        Arc::new(store),
        Arc::new(LocalClock),
        config,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use auth::{StaticIdentityProvider, UserIdentity};

    #[test]
    fn test_error_serializes_as_message() {
        let json = serde_json::to_string(&TrackerError::NotSignedIn).unwrap();
        assert_eq!(json, "\"Not signed in\"");

        let err: TrackerError = AuthError::Cancelled.into();
        assert_eq!(err.to_string(), "Auth error: Sign-in was cancelled");
    }

    #[test]
    fn test_init_logging_twice() {
        init_logging("debug");
        assert!(!init_logging("not-a-level"));
    }

    #[tokio::test]
    async fn test_start_with_config_and_sign_in() {
        let dir = std::env::temp_dir().join("naamjap_start_test");
        let _ = std::fs::remove_dir_all(&dir);
        let config = TrackerConfig {
            database_path: Some(dir.join("profiles.db")),
            ..TrackerConfig::default()
        };

        let provider = Arc::new(StaticIdentityProvider::new(UserIdentity::new("local")));
        let mut session = start_with_config(config, provider).unwrap();
        assert!(!session.is_signed_in());

        let controller = session.sign_in().await.unwrap();
        assert_eq!(controller.uid(), "local");
        assert!(dir.join("profiles.db").exists());

        session.sign_out().await.unwrap();
    }
}
