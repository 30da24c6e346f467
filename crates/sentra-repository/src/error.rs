//! Error types for the persistence layer.

use thiserror::Error;
use uuid::Uuid;

/// Result type alias for repository operations.
pub type RepositoryResult<T> = Result<T, RepositoryError>;

/// Errors that can occur during repository operations.
#[derive(Error, Debug)]
pub enum RepositoryError {
    /// The requested entity does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: Uuid },

    /// A uniqueness constraint was violated (duplicate rule name, duplicate
    /// decision transaction id).
    #[error("conflict on {entity}: {detail}")]
    Conflict { entity: &'static str, detail: String },

    /// A stored row could not be mapped back to a domain value.
    #[error("corrupt {entity} row {id}: {detail}")]
    Corrupt {
        entity: &'static str,
        id: Uuid,
        detail: String,
    },

    /// Transport/driver failure.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl RepositoryError {
    pub fn not_found(entity: &'static str, id: Uuid) -> Self {
        RepositoryError::NotFound { entity, id }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, RepositoryError::NotFound { .. })
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, RepositoryError::Conflict { .. })
    }
}
