//! Error types for scriptstudio-core

use thiserror::Error;

use crate::models::{SyncEvent, SyncStatus};

/// Result type alias using scriptstudio-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in scriptstudio-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// Database error
    #[error("Database error: {0}")]
    Database(String),

    /// libSQL error
    #[error("libSQL error: {0}")]
    LibSql(#[from] libsql::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Record not found
    #[error("Record not found: {0}")]
    NotFound(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A sync status change that the record state machine forbids
    #[error("Invalid sync transition: cannot apply {event} to a {from} record")]
    InvalidTransition { from: SyncStatus, event: SyncEvent },
}
