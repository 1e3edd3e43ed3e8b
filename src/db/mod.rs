pub mod document_store;
pub mod repository;
pub mod sqlite;

pub use document_store::*;

use std::time::Duration;

use thiserror::Error;

use crate::error::ErrorKind;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Invalid document path: {0:?}")]
    InvalidPath(String),

    #[error("Invalid enum value for {field}: {value}")]
    InvalidEnum { field: String, value: String },

    #[error("Document is not a JSON object")]
    NotAnObject,

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Migration failed at version {version}: {reason}")]
    MigrationFailed { version: i64, reason: String },

    #[error("Internal lock error")]
    LockPoisoned,
}

impl StoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidPath(_) => ErrorKind::InvalidPath,
            Self::InvalidEnum { .. } => ErrorKind::InvalidField,
            Self::NotAnObject
            | Self::Serialization(_)
            | Self::Sqlite(_)
            | Self::MigrationFailed { .. } => ErrorKind::Storage,
            Self::LockPoisoned => ErrorKind::Internal,
        }
    }
}

/// Stand-in for store round-trip time. Awaited before an operation's
/// atomic section, never inside it.
pub(crate) async fn simulate_latency(latency: Duration) {
    if !latency.is_zero() {
        tokio::time::sleep(latency).await;
    }
}
