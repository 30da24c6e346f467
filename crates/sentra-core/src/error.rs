//! Domain error taxonomy.

use thiserror::Error;

/// Errors produced by domain logic (entities, state machines, scoring).
///
/// Infrastructure failures live in the store/repository crates; this enum
/// only covers violations of domain invariants.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("invalid fraud score: must be between 0 and 1")]
    InvalidScore,

    #[error("case is already closed")]
    CaseAlreadyClosed,

    #[error("case must be resolved before closing")]
    CaseNotResolved,

    #[error("case cannot be escalated from status {status}")]
    CaseNotEscalatable { status: String },

    #[error("invalid rule kind")]
    InvalidRuleKind,

    #[error("invalid rule severity")]
    InvalidRuleSeverity,

    #[error("invalid rule action")]
    InvalidRuleAction,

    #[error("rule configuration is invalid: {0}")]
    RuleConfigInvalid(String),

    #[error("missing required transaction data")]
    MissingTransactionData,

    #[error(
        "invalid decision thresholds: require 0 < challenge ({challenge}) < review ({review}) < block ({block}) < 1"
    )]
    InvalidThresholds {
        challenge: String,
        review: String,
        block: String,
    },
}
