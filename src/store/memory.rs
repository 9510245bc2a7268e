//! In-memory profile store
//!
//! Holds raw JSON documents, so legacy document shapes can be seeded and
//! observed exactly as stored. Writes can be switched off to simulate an
//! unreachable remote.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;

use serde_json::Value;

use super::document::{encode_profile, ProfileUpdate};
use super::{ChangeFeed, ProfileStore, Revision, StoreError, StoreFuture, Subscription};
use crate::models::Profile;

pub struct MemoryProfileStore {
    documents: RwLock<HashMap<String, Value>>,
    offline: AtomicBool,
    feed: ChangeFeed,
}

impl Default for MemoryProfileStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryProfileStore {
    pub fn new() -> Self {
        Self {
            documents: RwLock::new(HashMap::new()),
            offline: AtomicBool::new(false),
            feed: ChangeFeed::new(),
        }
    }

    /// Store a raw document as-is and notify subscribers
    pub fn insert_document(&self, uid: &str, document: Value) -> Revision {
        let mut documents = self.documents.write().unwrap_or_else(|e| e.into_inner());
        documents.insert(uid.to_string(), document.clone());
        self.feed.publish(uid, Some(document))
    }

    /// Raw stored document
    pub fn document(&self, uid: &str) -> Option<Value> {
        let documents = self.documents.read().unwrap_or_else(|e| e.into_inner());
        documents.get(uid).cloned()
    }

    /// While offline every write fails with [`StoreError::Unavailable`]
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    fn ensure_online(&self) -> Result<(), StoreError> {
        if self.offline.load(Ordering::SeqCst) {
            Err(StoreError::Unavailable("store is offline".to_string()))
        } else {
            Ok(())
        }
    }
}

impl ProfileStore for MemoryProfileStore {
    fn read<'a>(&'a self, uid: &'a str) -> StoreFuture<'a, Option<Profile>> {
        Box::pin(async move {
            match self.document(uid) {
                Some(document) => Ok(Some(super::document::decode_profile(document)?)),
                None => Ok(None),
            }
        })
    }

    fn create<'a>(&'a self, uid: &'a str, profile: &'a Profile) -> StoreFuture<'a, Revision> {
        Box::pin(async move {
            self.ensure_online()?;
            let document = encode_profile(profile)?;
            Ok(self.insert_document(uid, document))
        })
    }

    fn update<'a>(&'a self, uid: &'a str, update: ProfileUpdate) -> StoreFuture<'a, Revision> {
        Box::pin(async move {
            self.ensure_online()?;

            let mut documents = self.documents.write().unwrap_or_else(|e| e.into_inner());
            let document = documents
                .get_mut(uid)
                .ok_or_else(|| StoreError::NotFound(uid.to_string()))?;
            update.apply_to(document);
            Ok(self.feed.publish(uid, Some(document.clone())))
        })
    }

    fn subscribe<'a>(&'a self, uid: &'a str) -> StoreFuture<'a, Subscription> {
        Box::pin(async move {
            let rx = self.feed.receiver();
            let documents = self.documents.read().unwrap_or_else(|e| e.into_inner());
            let current = documents.get(uid).cloned();
            Ok(Subscription::new(uid, current, self.feed.current_revision(), rx))
        })
    }
}
