use engine::{EngineError, RemoteError};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("config error: {0}")]
    Config(#[from] config::ConfigError),
    #[error("database error: {0}")]
    Database(#[from] sea_orm::DbErr),
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error(transparent)]
    Remote(#[from] RemoteError),
    #[error("no user configured: pass --user or set BUDGETBUDDY__USER")]
    NoUser,
    #[error("{0}")]
    Input(String),
}

impl AppError {
    /// Message shown to the person at the terminal.
    pub fn user_message(&self) -> String {
        match self {
            Self::Engine(EngineError::NotAuthenticated) => {
                "You are not signed in.".to_string()
            }
            Self::Engine(EngineError::Backend(err)) | Self::Remote(err) => remote_message(err),
            Self::Engine(EngineError::InvalidAmount(msg)) => format!("Invalid amount: {msg}."),
            Self::Engine(EngineError::InvalidCategory(label)) => format!(
                "Unknown category \"{label}\". Choose one of: {}.",
                engine::Category::ALL
                    .iter()
                    .map(|category| category.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
            other => other.to_string(),
        }
    }
}

fn remote_message(err: &RemoteError) -> String {
    match err {
        RemoteError::Unauthorized => "Your session has expired. Sign in again.".to_string(),
        RemoteError::Forbidden(_) => "That record belongs to another account.".to_string(),
        RemoteError::NotFound(_) => "No matching record was found.".to_string(),
        RemoteError::Conflict(msg) => format!("The change conflicts with existing data: {msg}"),
        RemoteError::Validation(msg) => format!("The backend rejected the data: {msg}"),
        RemoteError::Server(msg) => format!("The backend failed: {msg}"),
        RemoteError::Transport(msg) => format!("Could not reach the backend: {msg}"),
    }
}
