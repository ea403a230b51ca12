//! The module contains the errors the engine can return.
//!
//! The errors are:
//!
//! - [`NotAuthenticated`] returned by every mutation issued without a signed-in user.
//! - [`Backend`] returned when the remote store rejected or failed a call.
//!
//!  [`NotAuthenticated`]: EngineError::NotAuthenticated
//!  [`Backend`]: EngineError::Backend
use thiserror::Error;

use crate::remote::RemoteError;

/// Engine custom errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("Not authenticated")]
    NotAuthenticated,
    #[error(transparent)]
    Backend(#[from] RemoteError),
    #[error("Invalid record: {0}")]
    InvalidRecord(String),
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),
    #[error("Invalid category: {0}")]
    InvalidCategory(String),
}

impl EngineError {
    /// Check if the error comes from a missing session.
    pub fn is_auth(&self) -> bool {
        matches!(self, Self::NotAuthenticated)
    }

    /// Check if the error was reported by the remote store.
    pub fn is_backend(&self) -> bool {
        matches!(self, Self::Backend(_))
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidRecord(err.to_string())
    }
}
