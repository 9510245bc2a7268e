//! Profile store module
//!
//! The document store holding one profile per identity:
//! - Point read, full-document create, partial update by field path
//! - Live subscription re-delivering the full document on every change
//!
//! Two implementations are provided: an in-memory store and a SQLite-backed
//! store.

pub mod document;
pub mod memory;
pub mod sqlite;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures::future::BoxFuture;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};

use crate::db::DbError;
use crate::models::Profile;

pub use document::{FieldPath, ProfileUpdate};
pub use memory::MemoryProfileStore;
pub use sqlite::SqliteProfileStore;

/// Buffered changes per subscriber before it starts lagging
const CHANGE_FEED_CAPACITY: usize = 64;

/// Store errors
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] DbError),

    #[error("Malformed profile document: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Profile not found: {0}")]
    NotFound(String),

    #[error("Profile store unavailable: {0}")]
    Unavailable(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type StoreFuture<'a, T> = BoxFuture<'a, Result<T, StoreError>>;

/// Position of a committed write in a store's change order. Later writes
/// get higher revisions.
pub type Revision = u64;

/// Document state as of one revision
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteSnapshot {
    pub revision: Revision,
    /// `None` if the identity has no document
    pub profile: Option<Profile>,
}

/// One delivery on a subscription: the document, or the reason it could
/// not be read.
pub type SnapshotEvent = Result<RemoteSnapshot, StoreError>;

/// Remote profile store
pub trait ProfileStore: Send + Sync {
    /// Point read
    fn read<'a>(&'a self, uid: &'a str) -> StoreFuture<'a, Option<Profile>>;

    /// Write a full document, replacing any existing one. Resolves to the
    /// revision the write was committed at.
    fn create<'a>(&'a self, uid: &'a str, profile: &'a Profile) -> StoreFuture<'a, Revision>;

    /// Write only the addressed fields of an existing document
    fn update<'a>(&'a self, uid: &'a str, update: ProfileUpdate) -> StoreFuture<'a, Revision>;

    /// Subscribe to the identity's document. The current state is delivered
    /// first, then the full document after every later change.
    fn subscribe<'a>(&'a self, uid: &'a str) -> StoreFuture<'a, Subscription>;
}

/// Raw document change published by a store
#[derive(Debug, Clone)]
pub struct DocumentChange {
    pub uid: String,
    pub document: Option<Value>,
    pub revision: Revision,
}

/// Fan-out of document changes to subscribers.
///
/// Stores publish while still holding the lock their write took, so
/// revisions and delivery order follow commit order.
#[derive(Debug, Clone)]
pub(crate) struct ChangeFeed {
    tx: broadcast::Sender<DocumentChange>,
    revision: Arc<AtomicU64>,
}

impl ChangeFeed {
    pub(crate) fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANGE_FEED_CAPACITY);
        Self {
            tx,
            revision: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Assign the next revision to a committed write and notify subscribers
    pub(crate) fn publish(&self, uid: &str, document: Option<Value>) -> Revision {
        let revision = self.revision.fetch_add(1, Ordering::SeqCst) + 1;
        // No subscribers is fine
        let _ = self.tx.send(DocumentChange {
            uid: uid.to_string(),
            document,
            revision,
        });
        revision
    }

    /// Latest published revision
    pub(crate) fn current_revision(&self) -> Revision {
        self.revision.load(Ordering::SeqCst)
    }

    /// Receiver for changes published from now on. Take it before reading
    /// the document a subscription starts from.
    pub(crate) fn receiver(&self) -> broadcast::Receiver<DocumentChange> {
        self.tx.subscribe()
    }
}

fn decode_snapshot(document: Option<Value>, revision: Revision) -> SnapshotEvent {
    let profile = document.map(document::decode_profile).transpose()?;
    Ok(RemoteSnapshot { revision, profile })
}

/// Live view of one identity's document
pub struct Subscription {
    uid: String,
    initial: Option<SnapshotEvent>,
    /// Changes at or below this revision are already reflected
    seen: Revision,
    rx: broadcast::Receiver<DocumentChange>,
}

impl Subscription {
    /// Subscription starting from `current`, read at `revision` after `rx`
    /// was taken
    pub(crate) fn new(
        uid: &str,
        current: Option<Value>,
        revision: Revision,
        rx: broadcast::Receiver<DocumentChange>,
    ) -> Self {
        Self {
            uid: uid.to_string(),
            initial: Some(decode_snapshot(current, revision)),
            seen: revision,
            rx,
        }
    }

    pub fn uid(&self) -> &str {
        &self.uid
    }

    /// Wait for the next snapshot. `None` once the store is gone.
    pub async fn recv(&mut self) -> Option<SnapshotEvent> {
        if let Some(initial) = self.initial.take() {
            return Some(initial);
        }

        loop {
            match self.rx.recv().await {
                Ok(change) => {
                    if let Some(event) = self.accept(change) {
                        return Some(event);
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(
                        "Profile subscription for {} skipped {} changes",
                        self.uid,
                        skipped
                    );
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Next pending snapshot without waiting
    pub fn try_recv(&mut self) -> Option<SnapshotEvent> {
        if let Some(initial) = self.initial.take() {
            return Some(initial);
        }

        loop {
            match self.rx.try_recv() {
                Ok(change) => {
                    if let Some(event) = self.accept(change) {
                        return Some(event);
                    }
                }
                Err(TryRecvError::Lagged(skipped)) => {
                    tracing::warn!(
                        "Profile subscription for {} skipped {} changes",
                        self.uid,
                        skipped
                    );
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => return None,
            }
        }
    }

    fn accept(&mut self, change: DocumentChange) -> Option<SnapshotEvent> {
        if change.uid != self.uid || change.revision <= self.seen {
            return None;
        }
        self.seen = change.revision;
        Some(decode_snapshot(change.document, change.revision))
    }
}
