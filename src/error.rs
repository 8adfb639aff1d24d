//! Error types for clonerow operations

use thiserror::Error;

pub type Result<T> = std::result::Result<T, CloneRowError>;

#[derive(Error, Debug)]
pub enum CloneRowError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("DuckDB error: {0}")]
    DuckDb(#[from] duckdb::Error),

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Connection error: {message}")]
    Connection { message: String },

    #[error("Ambiguous row: {message}")]
    AmbiguousRow { message: String },

    #[error("Row not found on source: {message}")]
    SourceMissing { message: String },

    #[error("Backup verification failed: {message}")]
    BackupVerification { message: String },

    #[error("Update verification failed: {message}")]
    UpdateVerification { message: String },

    #[error("Restore verification failed: {message}")]
    RestoreVerification { message: String },

    #[error("Integrity violation: {message}")]
    Integrity { message: String },

    #[error("Generic error: {0}")]
    Generic(#[from] anyhow::Error),
}

impl CloneRowError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection {
            message: msg.into(),
        }
    }

    pub fn ambiguous_row(msg: impl Into<String>) -> Self {
        Self::AmbiguousRow {
            message: msg.into(),
        }
    }

    pub fn source_missing(msg: impl Into<String>) -> Self {
        Self::SourceMissing {
            message: msg.into(),
        }
    }

    pub fn backup_verification(msg: impl Into<String>) -> Self {
        Self::BackupVerification {
            message: msg.into(),
        }
    }

    pub fn update_verification(msg: impl Into<String>) -> Self {
        Self::UpdateVerification {
            message: msg.into(),
        }
    }

    pub fn restore_verification(msg: impl Into<String>) -> Self {
        Self::RestoreVerification {
            message: msg.into(),
        }
    }

    pub fn integrity(msg: impl Into<String>) -> Self {
        Self::Integrity {
            message: msg.into(),
        }
    }
}
