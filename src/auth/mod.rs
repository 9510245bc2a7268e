//! Identity module
//!
//! Sign-in is delegated to an [`IdentityProvider`]; the tracker only needs a
//! stable uid plus display data for the profile screen.

pub mod session;

use std::sync::RwLock;

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use session::AuthSession;

/// Authentication errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("Sign-in was cancelled")]
    Cancelled,

    #[error("Identity provider error: {0}")]
    Provider(String),
}

/// Signed-in identity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserIdentity {
    pub uid: String,
    pub display_name: Option<String>,
    pub email: Option<String>,
    pub photo_url: Option<String>,
}

impl UserIdentity {
    pub fn new(uid: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            display_name: None,
            email: None,
            photo_url: None,
        }
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    /// First word of the display name, for greetings
    pub fn first_name(&self) -> Option<&str> {
        self.display_name
            .as_deref()
            .and_then(|name| name.split_whitespace().next())
    }
}

/// External sign-in service
pub trait IdentityProvider: Send + Sync {
    /// Interactive sign-in
    fn sign_in(&self) -> BoxFuture<'_, Result<UserIdentity, AuthError>>;

    fn sign_out(&self) -> BoxFuture<'_, Result<(), AuthError>>;

    /// Identity restored from a previous sign-in, if any
    fn current_user(&self) -> Option<UserIdentity>;
}

/// Provider that always signs in as one fixed identity.
///
/// Built without an identity, every sign-in is cancelled.
pub struct StaticIdentityProvider {
    identity: Option<UserIdentity>,
    signed_in: RwLock<bool>,
}

impl StaticIdentityProvider {
    pub fn new(identity: UserIdentity) -> Self {
        Self {
            identity: Some(identity),
            signed_in: RwLock::new(false),
        }
    }

    /// Provider that already has a restored session
    pub fn signed_in(identity: UserIdentity) -> Self {
        Self {
            identity: Some(identity),
            signed_in: RwLock::new(true),
        }
    }

    pub fn cancelling() -> Self {
        Self {
            identity: None,
            signed_in: RwLock::new(false),
        }
    }

    fn set_signed_in(&self, value: bool) {
        *self.signed_in.write().unwrap_or_else(|e| e.into_inner()) = value;
    }
}

impl IdentityProvider for StaticIdentityProvider {
    fn sign_in(&self) -> BoxFuture<'_, Result<UserIdentity, AuthError>> {
        Box::pin(async move {
            let identity = self.identity.clone().ok_or(AuthError::Cancelled)?;
            self.set_signed_in(true);
            Ok(identity)
        })
    }

    fn sign_out(&self) -> BoxFuture<'_, Result<(), AuthError>> {
        Box::pin(async move {
            self.set_signed_in(false);
            Ok(())
        })
    }

    fn current_user(&self) -> Option<UserIdentity> {
        let signed_in = *self.signed_in.read().unwrap_or_else(|e| e.into_inner());
        if signed_in {
            self.identity.clone()
        } else {
            None
        }
    }
}
