//! Snapshot event handlers
//!
//! Turns subscription deliveries into controller state changes

use crate::commands::ProfileController;
use crate::store::{RemoteSnapshot, SnapshotEvent};

/// What a delivery did to the controller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncAction {
    /// Remote snapshot replaced the local profile
    Applied,
    /// No document existed; a default profile was created
    Created,
    /// The subscription reported an error
    Failed,
}

/// Handle one subscription delivery
pub fn handle_event(controller: &ProfileController, event: SnapshotEvent) -> SyncAction {
    match event {
        Ok(RemoteSnapshot {
            revision,
            profile: Some(profile),
        }) => {
            controller.apply_remote_snapshot(profile, revision);
            SyncAction::Applied
        }
        Ok(RemoteSnapshot { profile: None, .. }) => handle_missing(controller),
        Err(e) => {
            controller.mark_subscription_failed(&e);
            SyncAction::Failed
        }
    }
}

/// First sign-in: adopt a default profile and write it out
fn handle_missing(controller: &ProfileController) -> SyncAction {
    tracing::info!("No profile stored for {}", controller.uid());
    // The write reports its own failure; the local profile stays either way
    drop(controller.create_default_profile());
    SyncAction::Created
}
