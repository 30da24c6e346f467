//! Core domain types for the Sentra fraud decision engine.
//!
//! This crate defines the vocabulary shared by every other crate:
//!
//! - [`Decision`], [`RiskLevel`] and the other closed enums
//! - [`Rule`] and [`RuleResult`] — what the rule engine consumes and produces
//! - [`FraudDecision`] — the append-only outcome record
//! - [`FraudCase`] — the investigation entity and its state machine
//! - [`EvaluationContext`] — the enriched view of a transaction under analysis
//! - score aggregation ([`aggregate`], [`ScoreWeights`], [`DecisionThresholds`])
//!
//! It has no I/O; everything here is pure data and arithmetic.

pub mod case;
pub mod context;
pub mod decision;
pub mod error;
pub mod rule;
pub mod score;
pub mod types;

pub use case::{CaseNote, Evidence, FraudCase};
pub use context::{
    DeviceInfo, EvaluationContext, GeoLocation, MerchantInfo, PaymentMethod, TransactionSummary,
    UserProfile,
};
pub use decision::FraudDecision;
pub use error::DomainError;
pub use rule::{Rule, RuleResult};
pub use score::{aggregate, confidence, DecisionThresholds, ScoreBreakdown, ScoreWeights};
pub use types::{CaseStatus, Decision, RiskLevel, RuleKind, ScoringStrategy, Severity};
