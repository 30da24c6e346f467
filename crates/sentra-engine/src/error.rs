//! Engine error types.

use sentra_core::DomainError;
use sentra_repository::RepositoryError;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors surfaced by the decision core.
#[derive(Error, Debug)]
pub enum EngineError {
    /// A domain invariant was violated (case state machine, rule validation).
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// Persistence failure. Lookups map `NotFound` here; callers use
    /// [`EngineError::is_not_found`] to distinguish it at the API boundary.
    #[error(transparent)]
    Repository(#[from] RepositoryError),

    /// The analysis deadline elapsed before a decision could be produced.
    /// No partial decision is persisted in this case.
    #[error("fraud analysis timed out after {0:?}")]
    Timeout(Duration),

    /// Required identifiers were missing from the input.
    #[error("missing required transaction data")]
    MissingTransactionData,
}

impl EngineError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, EngineError::Repository(e) if e.is_not_found())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn not_found_is_detectable_through_the_wrapper() {
        let err: EngineError = RepositoryError::not_found("rule", Uuid::new_v4()).into();
        assert!(err.is_not_found());

        let timeout = EngineError::Timeout(Duration::from_secs(5));
        assert!(!timeout.is_not_found());
    }
}
