use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Account not found: {0}")]
    AccountNotFound(String),

    #[error("Snapshot missing: {0}")]
    SnapshotMissing(String),

    #[error("Config file not found: {}", .0.display())]
    ConfigNotFound(PathBuf),

    #[error("No live account state found: {0}")]
    LiveStateMissing(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Secret store error: {0}")]
    SecretStore(String),

    #[error("Process error: {0}")]
    Process(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("{0}")]
    Message(String),
}

impl CoreError {
    /// True for the "something is absent" family of failures.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            CoreError::AccountNotFound(_)
                | CoreError::SnapshotMissing(_)
                | CoreError::ConfigNotFound(_)
                | CoreError::LiveStateMissing(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;
