//! Profile sync module
//!
//! Keeps a [`ProfileController`] in step with its store subscription:
//! - Remote snapshots replace the local profile
//! - A missing document is created from defaults
//! - Subscription failures are recorded on the controller

pub mod handler;

use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::commands::ProfileController;
use crate::store::Subscription;

pub use handler::SyncAction;

/// Drives one identity's subscription into its controller
pub struct ProfileWatcher {
    controller: Arc<ProfileController>,
    subscription: Subscription,
}

impl ProfileWatcher {
    pub fn new(controller: Arc<ProfileController>, subscription: Subscription) -> Self {
        Self {
            controller,
            subscription,
        }
    }

    pub fn uid(&self) -> &str {
        self.subscription.uid()
    }

    /// Apply every pending snapshot (non-blocking)
    pub fn poll(&mut self) -> Vec<SyncAction> {
        let mut actions = Vec::new();

        while let Some(event) = self.subscription.try_recv() {
            actions.push(handler::handle_event(&self.controller, event));
        }

        actions
    }

    /// Wait for the next snapshot and apply it. `None` once the store is gone.
    pub async fn next(&mut self) -> Option<SyncAction> {
        let event = self.subscription.recv().await?;
        Some(handler::handle_event(&self.controller, event))
    }
}

/// Run the subscription on a background task until the store goes away or
/// the task is aborted
pub fn spawn_profile_sync(
    controller: Arc<ProfileController>,
    subscription: Subscription,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut watcher = ProfileWatcher::new(controller, subscription);
        tracing::info!("Started profile sync for {}", watcher.uid());

        while let Some(action) = watcher.next().await {
            tracing::trace!("Profile sync for {}: {:?}", watcher.uid(), action);
        }

        tracing::info!("Profile subscription for {} closed", watcher.uid());
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::commands::LoadState;
    use crate::config::TrackerConfig;
    use crate::store::{FieldPath, MemoryProfileStore, ProfileStore, ProfileUpdate};
    use chrono::NaiveDate;
    use serde_json::json;
    use std::time::Duration;

    const UID: &str = "user-1";

    fn controller(store: Arc<MemoryProfileStore>) -> Arc<ProfileController> {
        Arc::new(ProfileController::new(
            UID,
            store,
            Arc::new(FixedClock::new(NaiveDate::from_ymd_opt(2024, 5, 10).unwrap())),
            TrackerConfig::default(),
        ))
    }

    async fn wait_until(check: impl Fn() -> bool) -> bool {
        for _ in 0..200 {
            if check() {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        false
    }

    #[tokio::test]
    async fn test_missing_document_is_created() {
        let store = Arc::new(MemoryProfileStore::new());
        let controller = controller(store.clone());
        let subscription = store.subscribe(UID).await.unwrap();
        let mut watcher = ProfileWatcher::new(controller.clone(), subscription);

        assert_eq!(watcher.poll(), vec![SyncAction::Created]);
        assert!(controller.snapshot().is_some());

        // The create comes back through the subscription
        assert_eq!(watcher.next().await, Some(SyncAction::Applied));
        assert_eq!(store.document(UID).unwrap()["activePhrase"], json!("Om Namah Shivaya"));
    }

    #[tokio::test]
    async fn test_existing_document_is_adopted() {
        let store = Arc::new(MemoryProfileStore::new());
        store.insert_document(UID, json!({"naams": ["Om"], "currentNaam": "Om", "streak": 3}));
        let controller = controller(store.clone());
        let subscription = store.subscribe(UID).await.unwrap();
        let mut watcher = ProfileWatcher::new(controller.clone(), subscription);

        assert_eq!(watcher.poll(), vec![SyncAction::Applied]);
        let profile = controller.snapshot().unwrap();
        assert_eq!(profile.phrases, vec!["Om".to_string()]);
        assert_eq!(profile.streak, 3);
    }

    #[tokio::test]
    async fn test_unreadable_document_marks_failure() {
        let store = Arc::new(MemoryProfileStore::new());
        store.insert_document(UID, json!({"streak": "lots"}));
        let controller = controller(store.clone());
        let subscription = store.subscribe(UID).await.unwrap();
        let mut watcher = ProfileWatcher::new(controller.clone(), subscription);

        assert_eq!(watcher.poll(), vec![SyncAction::Failed]);
        assert_eq!(controller.load_state(), LoadState::Unavailable);
    }

    #[tokio::test]
    async fn test_background_sync_follows_remote_changes() {
        let store = Arc::new(MemoryProfileStore::new());
        store.insert_document(UID, json!({"phrases": ["Om"], "activePhrase": "Om"}));
        let controller = controller(store.clone());
        let subscription = store.subscribe(UID).await.unwrap();

        let handle = spawn_profile_sync(controller.clone(), subscription);
        assert!(wait_until(|| controller.snapshot().is_some()).await);

        // A write from another device
        store
            .update(UID, ProfileUpdate::new().set(FieldPath::DailyGoal, json!(54)))
            .await
            .unwrap();
        assert!(wait_until(|| controller.snapshot().map(|p| p.daily_goal) == Some(54)).await);

        handle.abort();
    }
}
