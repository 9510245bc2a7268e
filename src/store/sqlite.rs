//! SQLite-backed profile store
//!
//! Documents live in the `profiles` table of a [`Database`]. Each operation
//! runs on the blocking pool. Writes publish the resulting document to
//! subscribers before the connection is released.

use std::path::PathBuf;
use std::sync::Arc;

use rusqlite::Connection;

use super::document::{decode_profile, encode_profile, ProfileUpdate};
use super::{ChangeFeed, ProfileStore, Revision, StoreError, StoreFuture, Subscription};
use crate::db::{queries, Database, DbError};
use crate::models::Profile;

pub struct SqliteProfileStore {
    db: Arc<Database>,
    feed: ChangeFeed,
}

impl SqliteProfileStore {
    /// Wrap an initialized database
    pub fn new(db: Database) -> Self {
        Self {
            db: Arc::new(db),
            feed: ChangeFeed::new(),
        }
    }

    /// Open (creating if needed) and initialize the database at `path`
    pub fn open(path: PathBuf) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            if let Err(e) = std::fs::create_dir_all(parent) {
                tracing::error!("Failed to create database directory: {}", e);
            }
        }

        let db = Database::new(path)?;
        db.initialize()?;
        tracing::info!("Profile database ready at {:?}", db.path());
        Ok(Self::new(db))
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        let db = Database::open_in_memory()?;
        db.initialize()?;
        Ok(Self::new(db))
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    async fn blocking<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&Connection) -> Result<T, DbError> + Send + 'static,
        T: Send + 'static,
    {
        let db = Arc::clone(&self.db);
        let result = tokio::task::spawn_blocking(move || db.with_connection(f))
            .await
            .map_err(|e| StoreError::Internal(format!("Database task failed: {}", e)))?;
        Ok(result?)
    }
}

impl ProfileStore for SqliteProfileStore {
    fn read<'a>(&'a self, uid: &'a str) -> StoreFuture<'a, Option<Profile>> {
        Box::pin(async move {
            let owned_uid = uid.to_string();
            let document = self
                .blocking(move |conn| queries::get_document(conn, &owned_uid))
                .await?;

            match document {
                Some(document) => Ok(Some(decode_profile(document)?)),
                None => Ok(None),
            }
        })
    }

    fn create<'a>(&'a self, uid: &'a str, profile: &'a Profile) -> StoreFuture<'a, Revision> {
        Box::pin(async move {
            let document = encode_profile(profile)?;
            let owned_uid = uid.to_string();
            let feed = self.feed.clone();
            self.blocking(move |conn| {
                queries::put_document(conn, &owned_uid, &document)?;
                Ok(feed.publish(&owned_uid, Some(document)))
            })
            .await
        })
    }

    fn update<'a>(&'a self, uid: &'a str, update: ProfileUpdate) -> StoreFuture<'a, Revision> {
        Box::pin(async move {
            let owned_uid = uid.to_string();
            let feed = self.feed.clone();
            self.blocking(move |conn| {
                let updated = queries::update_document(conn, &owned_uid, &update)?;
                Ok(updated.map(|document| feed.publish(&owned_uid, Some(document))))
            })
            .await?
            .ok_or_else(|| StoreError::NotFound(uid.to_string()))
        })
    }

    fn subscribe<'a>(&'a self, uid: &'a str) -> StoreFuture<'a, Subscription> {
        Box::pin(async move {
            let rx = self.feed.receiver();
            let owned_uid = uid.to_string();
            let feed = self.feed.clone();
            let (current, revision) = self
                .blocking(move |conn| {
                    let current = queries::get_document(conn, &owned_uid)?;
                    Ok((current, feed.current_revision()))
                })
                .await?;
            Ok(Subscription::new(uid, current, revision, rx))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TrackerConfig;
    use crate::models::DayRecord;
    use crate::store::FieldPath;
    use chrono::NaiveDate;
    use serde_json::json;

    fn profile() -> Profile {
        Profile::new_default(
            &TrackerConfig::default(),
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        )
    }

    #[tokio::test]
    async fn test_create_read_update() {
        let store = SqliteProfileStore::open_in_memory().unwrap();
        store.create("u1", &profile()).await.unwrap();

        let update = ProfileUpdate::new()
            .set(FieldPath::History("2024-01-01".to_string()), json!({"Om Namah Shivaya": 12}))
            .set(FieldPath::Streak, json!(1))
            .set(FieldPath::MaxStreak, json!(1));
        store.update("u1", update).await.unwrap();

        let stored = store.read("u1").await.unwrap().unwrap();
        assert_eq!(stored.streak, 1);
        let day = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        assert_eq!(stored.count_on(day, "Om Namah Shivaya"), 12);
        assert_eq!(stored.phrases, profile().phrases);
    }

    #[tokio::test]
    async fn test_update_missing_profile() {
        let store = SqliteProfileStore::open_in_memory().unwrap();
        let update = ProfileUpdate::new().set(FieldPath::DailyGoal, json!(27));
        assert!(matches!(store.update("nobody", update).await, Err(StoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_reads_legacy_document() {
        let store = SqliteProfileStore::open_in_memory().unwrap();
        store
            .database()
            .with_connection(|conn| {
                queries::put_document(
                    conn,
                    "u1",
                    &json!({"naams": ["Om"], "currentNaam": "Om", "history": {"2023-12-31": 40}}),
                )
            })
            .unwrap();

        let stored = store.read("u1").await.unwrap().unwrap();
        assert_eq!(stored.active_phrase, "Om");
        assert_eq!(stored.history.get("2023-12-31"), Some(&DayRecord::Legacy(40)));
    }

    #[tokio::test]
    async fn test_subscription_follows_writes() {
        let store = SqliteProfileStore::open_in_memory().unwrap();
        let mut subscription = store.subscribe("u1").await.unwrap();
        let initial = subscription.recv().await.unwrap().unwrap();
        assert!(initial.profile.is_none());

        store.create("u1", &profile()).await.unwrap();
        let created = subscription.recv().await.unwrap().unwrap();
        assert!(created.profile.is_some());

        let updated_at = store
            .update("u1", ProfileUpdate::new().set(FieldPath::ActivePhrase, json!("Om")))
            .await
            .unwrap();
        let latest = subscription.recv().await.unwrap().unwrap();
        assert_eq!(latest.revision, updated_at);
        assert_eq!(latest.profile.unwrap().active_phrase, "Om");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_writes_publish_in_commit_order() {
        let store = Arc::new(SqliteProfileStore::open_in_memory().unwrap());
        store.create("u1", &profile()).await.unwrap();
        let mut subscription = store.subscribe("u1").await.unwrap();
        subscription.recv().await.unwrap().unwrap();

        let writers: Vec<_> = (1..=20u32)
            .map(|goal| {
                let store = Arc::clone(&store);
                tokio::spawn(async move {
                    let update = ProfileUpdate::new().set(FieldPath::DailyGoal, json!(goal));
                    store.update("u1", update).await.unwrap()
                })
            })
            .collect();
        for writer in writers {
            writer.await.unwrap();
        }

        let mut last = None;
        let mut previous = 0;
        while let Some(event) = subscription.try_recv() {
            let snapshot = event.unwrap();
            assert!(snapshot.revision > previous);
            previous = snapshot.revision;
            last = snapshot.profile;
        }

        // The last delivered document is the stored one
        let stored = store.read("u1").await.unwrap();
        assert_eq!(last, stored);
    }

    #[test]
    fn test_open_creates_file() {
        let path = std::env::temp_dir()
            .join("naamjap_store_test")
            .join("profiles.db");
        let _ = std::fs::remove_file(&path);

        let store = SqliteProfileStore::open(path.clone()).unwrap();
        assert_eq!(store.database().path(), &path);
        assert!(path.exists());
    }
}
