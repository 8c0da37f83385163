//! Domain errors for the agencyflow backend.

use thiserror::Error;
use uuid::Uuid;

/// Domain-level errors that can occur in agencyflow.
///
/// Per-record failures during a sync pass are *not* raised through this
/// type; they are collected into the pass summary. `DomainError` covers the
/// failures that abort a whole operation.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Recurring task not found: {0}")]
    RecurringTaskNotFound(Uuid),

    #[error("Synced record not found: {collection}/{local_id}")]
    RecordNotFound { collection: String, local_id: String },

    #[error("Portal not configured: {0}")]
    PortalNotFound(String),

    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    #[error("Failed to fetch from source '{source_name}': {message}")]
    SourceFetchFailed { source_name: String, message: String },

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Duplicate record: {collection}/{external_id} already exists")]
    DuplicateRecord {
        collection: String,
        external_id: String,
    },
}

pub type DomainResult<T> = Result<T, DomainError>;

impl DomainError {
    /// Build a fetch failure for the named source.
    pub fn fetch_failed(source_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SourceFetchFailed {
            source_name: source_name.into(),
            message: message.into(),
        }
    }
}

impl From<sqlx::Error> for DomainError {
    fn from(err: sqlx::Error) -> Self {
        DomainError::DatabaseError(err.to_string())
    }
}

impl From<serde_json::Error> for DomainError {
    fn from(err: serde_json::Error) -> Self {
        DomainError::SerializationError(err.to_string())
    }
}
