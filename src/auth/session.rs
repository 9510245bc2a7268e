//! Signed-in session
//!
//! Ties an identity to its [`ProfileController`] and the background task
//! that keeps the controller synced with the store.

use std::sync::Arc;

use tokio::task::JoinHandle;

use super::{IdentityProvider, UserIdentity};
use crate::clock::Clock;
use crate::commands::ProfileController;
use crate::config::TrackerConfig;
use crate::store::ProfileStore;
use crate::watcher::spawn_profile_sync;
use crate::TrackerError;

struct ActiveSession {
    identity: UserIdentity,
    controller: Arc<ProfileController>,
    sync: JoinHandle<()>,
}

pub struct AuthSession {
    provider: Arc<dyn IdentityProvider>,
    store: Arc<dyn ProfileStore>,
    clock: Arc<dyn Clock>,
    config: TrackerConfig,
    active: Option<ActiveSession>,
}

impl AuthSession {
    pub fn new(
        provider: Arc<dyn IdentityProvider>,
        store: Arc<dyn ProfileStore>,
        clock: Arc<dyn Clock>,
        config: TrackerConfig,
    ) -> Self {
        Self {
            provider,
            store,
            clock,
            config,
            active: None,
        }
    }

    /// Pick up a session the provider already holds. Returns `None` when
    /// nobody is signed in.
    pub async fn resume(&mut self) -> Result<Option<Arc<ProfileController>>, TrackerError> {
        match self.provider.current_user() {
            Some(identity) => Ok(Some(self.start(identity).await?)),
            None => Ok(None),
        }
    }

    /// Interactive sign-in, then subscribe to the identity's profile
    pub async fn sign_in(&mut self) -> Result<Arc<ProfileController>, TrackerError> {
        let identity = self.provider.sign_in().await?;
        self.start(identity).await
    }

    /// Sign out and stop syncing. The local profile is discarded.
    pub async fn sign_out(&mut self) -> Result<(), TrackerError> {
        if let Some(active) = self.active.take() {
            tracing::info!("Signing out {}", active.identity.uid);
            active.sync.abort();
        }

        self.provider.sign_out().await?;
        Ok(())
    }

    pub fn identity(&self) -> Option<&UserIdentity> {
        self.active.as_ref().map(|active| &active.identity)
    }

    pub fn is_signed_in(&self) -> bool {
        self.active.is_some()
    }

    /// Controller of the signed-in identity
    pub fn controller(&self) -> Result<Arc<ProfileController>, TrackerError> {
        self.active
            .as_ref()
            .map(|active| Arc::clone(&active.controller))
            .ok_or(TrackerError::NotSignedIn)
    }

    async fn start(
        &mut self,
        identity: UserIdentity,
    ) -> Result<Arc<ProfileController>, TrackerError> {
        if let Some(active) = &self.active {
            if active.identity.uid == identity.uid {
                return Ok(Arc::clone(&active.controller));
            }
        }
        if let Some(previous) = self.active.take() {
            tracing::info!("Switching identity from {}", previous.identity.uid);
            previous.sync.abort();
        }

        let controller = Arc::new(ProfileController::new(
            identity.uid.clone(),
            Arc::clone(&self.store),
            Arc::clone(&self.clock),
            self.config.clone(),
        ));
        let subscription = self.store.subscribe(&identity.uid).await?;
        let sync = spawn_profile_sync(Arc::clone(&controller), subscription);

        tracing::info!("Signed in {}", identity.uid);
        self.active = Some(ActiveSession {
            identity,
            controller: Arc::clone(&controller),
            sync,
        });
        Ok(controller)
    }
}

impl Drop for AuthSession {
    fn drop(&mut self) {
        if let Some(active) = self.active.take() {
            active.sync.abort();
        }
    }
}
