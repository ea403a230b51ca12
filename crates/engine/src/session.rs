//! Shared authenticated-user state.
//!
//! The [`SessionProvider`] owns the single "current user or absent" value.
//! Stores hold a [`Session`] and are notified on every change through a
//! `tokio::sync::watch` channel, so nobody polls for sign-in state.

use std::fmt;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::{EngineError, ResultEngine};

/// Opaque identity issued by the authentication service.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Source of truth for the signed-in user.
#[derive(Debug)]
pub struct SessionProvider {
    current: watch::Sender<Option<UserId>>,
}

impl Default for SessionProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionProvider {
    /// A provider with nobody signed in.
    pub fn new() -> Self {
        let (current, _) = watch::channel(None);
        Self { current }
    }

    /// A provider with `user` already signed in.
    pub fn signed_in(user: UserId) -> Self {
        let (current, _) = watch::channel(Some(user));
        Self { current }
    }

    pub fn sign_in(&self, user: UserId) {
        tracing::debug!("session: signed in as {user}");
        self.current.send_replace(Some(user));
    }

    pub fn sign_out(&self) {
        tracing::debug!("session: signed out");
        self.current.send_replace(None);
    }

    pub fn current(&self) -> Option<UserId> {
        self.current.borrow().clone()
    }

    /// A read-only handle for a store.
    pub fn session(&self) -> Session {
        Session {
            current: self.current.subscribe(),
        }
    }
}

/// Read-only view of the session held by a store.
#[derive(Clone, Debug)]
pub struct Session {
    current: watch::Receiver<Option<UserId>>,
}

impl Session {
    pub fn current_user(&self) -> Option<UserId> {
        self.current.borrow().clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.current.borrow().is_some()
    }

    /// The signed-in user, or [`EngineError::NotAuthenticated`].
    pub fn require_user(&self) -> ResultEngine<UserId> {
        self.current_user().ok_or(EngineError::NotAuthenticated)
    }

    /// `true` while `user` is still the signed-in user.
    pub(crate) fn is_current(&self, user: &UserId) -> bool {
        self.current.borrow().as_ref() == Some(user)
    }

    pub(crate) fn watch(&self) -> watch::Receiver<Option<UserId>> {
        self.current.clone()
    }
}
