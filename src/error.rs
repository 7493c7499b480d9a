//! Error types for the intake store.

use crate::types::ContentId;
use thiserror::Error;

/// Main error type for intake operations.
#[derive(Debug, Error)]
pub enum IntakeError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Failed to write record {content_id}: {source}")]
    StorageWrite {
        content_id: ContentId,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to update usage ledger{}: {source}", fmt_content_id(.content_id))]
    LedgerUpdate {
        content_id: Option<ContentId>,
        #[source]
        source: std::io::Error,
    },

    #[error("Usage ledger corrupt: {0}")]
    LedgerCorrupt(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Store is locked by another process")]
    Locked,

    #[error("Store not initialized")]
    NotInitialized,

    #[error("Invalid store format: {0}")]
    InvalidFormat(String),
}

fn fmt_content_id(id: &Option<ContentId>) -> String {
    match id {
        Some(id) => format!(" for {}", id),
        None => String::new(),
    }
}

/// Failure classes reported to callers of the ingestion pipeline.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// The submitted buffer was missing or empty. Nothing was written.
    InvalidInput,
    /// The document record could not be persisted. The ledger was not touched.
    StorageWriteFailure,
    /// The record may be durable but usage accounting did not complete.
    LedgerUpdateFailure,
    /// The ledger document could not be parsed.
    LedgerCorrupt,
    /// Open, lock and other failures outside the ingestion path.
    Other,
}

impl IntakeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            IntakeError::InvalidInput(_) => ErrorKind::InvalidInput,
            IntakeError::StorageWrite { .. } => ErrorKind::StorageWriteFailure,
            IntakeError::LedgerUpdate { .. } => ErrorKind::LedgerUpdateFailure,
            IntakeError::LedgerCorrupt(_) => ErrorKind::LedgerCorrupt,
            _ => ErrorKind::Other,
        }
    }
}

/// Result type for intake operations.
pub type Result<T> = std::result::Result<T, IntakeError>;
