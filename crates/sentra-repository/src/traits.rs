//! Repository trait definitions.
//!
//! All operations are async and take `&self`; implementations must be
//! `Send + Sync` so a single instance can be shared across request tasks.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sentra_core::{CaseStatus, FraudCase, FraudDecision, Rule, RuleKind};
use uuid::Uuid;

use crate::RepositoryResult;

/// Versioned storage for fraud detection rules.
#[async_trait]
pub trait RuleRepository: Send + Sync {
    /// Persist a new rule at version 1. Fails with a conflict if the name is
    /// taken.
    async fn create(&self, rule: &Rule) -> RepositoryResult<()>;

    async fn get_by_id(&self, id: Uuid) -> RepositoryResult<Rule>;

    /// Persist changes to an existing rule. The stored version counter is
    /// bumped by the repository itself, so callers never hand-manage it.
    async fn update(&self, rule: &Rule) -> RepositoryResult<()>;

    /// All rules that are enabled and inside their effectivity window at
    /// `now`.
    async fn list_active(&self, now: DateTime<Utc>) -> RepositoryResult<Vec<Rule>>;

    async fn list_by_kind(&self, kind: RuleKind) -> RepositoryResult<Vec<Rule>>;

    /// Flip `enabled` off. Bumps the version like any other update.
    async fn disable(&self, id: Uuid) -> RepositoryResult<()>;

    /// Current version counter of a rule.
    async fn get_version(&self, id: Uuid) -> RepositoryResult<i32>;
}

/// Append-only log of fraud decisions.
#[async_trait]
pub trait DecisionRepository: Send + Sync {
    /// Append a decision. `transaction_id` is unique; a duplicate surfaces
    /// as a conflict.
    async fn create(&self, decision: &FraudDecision) -> RepositoryResult<()>;

    async fn get_by_id(&self, id: Uuid) -> RepositoryResult<FraudDecision>;

    async fn get_by_transaction_id(&self, transaction_id: Uuid)
        -> RepositoryResult<FraudDecision>;

    /// Decisions for a user, newest first.
    async fn list_by_user_id(
        &self,
        user_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> RepositoryResult<Vec<FraudDecision>>;

    /// How many times the user has been blocked since `since`.
    async fn blocked_count_since(
        &self,
        user_id: Uuid,
        since: DateTime<Utc>,
    ) -> RepositoryResult<i64>;
}

/// Storage for fraud investigation cases.
#[async_trait]
pub trait CaseRepository: Send + Sync {
    async fn create(&self, case: &FraudCase) -> RepositoryResult<()>;

    async fn get_by_id(&self, id: Uuid) -> RepositoryResult<FraudCase>;

    async fn update(&self, case: &FraudCase) -> RepositoryResult<()>;

    async fn list_by_status(
        &self,
        status: CaseStatus,
        limit: i64,
        offset: i64,
    ) -> RepositoryResult<Vec<FraudCase>>;

    async fn list_by_assignee(
        &self,
        assignee: Uuid,
        limit: i64,
        offset: i64,
    ) -> RepositoryResult<Vec<FraudCase>>;

    /// Cases for the user whose status is `open` or `investigating`.
    async fn open_cases_by_user(&self, user_id: Uuid) -> RepositoryResult<Vec<FraudCase>>;
}
