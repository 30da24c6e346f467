//! In-memory repository implementations.
//!
//! Behavior-compatible stand-ins for the PostgreSQL repositories, used by
//! engine and pipeline tests: same version-bump semantics, same conflict and
//! not-found behavior, no I/O.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sentra_core::{CaseStatus, Decision, FraudCase, FraudDecision, Rule, RuleKind};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::{RepositoryError, RepositoryResult};
use crate::traits::{CaseRepository, DecisionRepository, RuleRepository};

/// HashMap-backed [`RuleRepository`].
#[derive(Clone, Default)]
pub struct MemoryRuleRepository {
    rules: Arc<RwLock<HashMap<Uuid, Rule>>>,
}

impl MemoryRuleRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a rule without the uniqueness checks, for test setup.
    pub async fn insert(&self, rule: Rule) {
        self.rules.write().await.insert(rule.id, rule);
    }
}

#[async_trait]
impl RuleRepository for MemoryRuleRepository {
    async fn create(&self, rule: &Rule) -> RepositoryResult<()> {
        let mut rules = self.rules.write().await;
        if rules.values().any(|r| r.name == rule.name) {
            return Err(RepositoryError::Conflict {
                entity: "rule",
                detail: "name already exists".into(),
            });
        }
        rules.insert(rule.id, rule.clone());
        Ok(())
    }

    async fn get_by_id(&self, id: Uuid) -> RepositoryResult<Rule> {
        self.rules
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| RepositoryError::not_found("rule", id))
    }

    async fn update(&self, rule: &Rule) -> RepositoryResult<()> {
        let mut rules = self.rules.write().await;
        let existing = rules
            .get_mut(&rule.id)
            .ok_or_else(|| RepositoryError::not_found("rule", rule.id))?;

        let version = existing.version + 1;
        *existing = rule.clone();
        existing.version = version;
        existing.updated_at = Utc::now();
        Ok(())
    }

    async fn list_active(&self, now: DateTime<Utc>) -> RepositoryResult<Vec<Rule>> {
        let rules = self.rules.read().await;
        let mut active: Vec<Rule> = rules.values().filter(|r| r.is_active(now)).cloned().collect();
        active.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(active)
    }

    async fn list_by_kind(&self, kind: RuleKind) -> RepositoryResult<Vec<Rule>> {
        let rules = self.rules.read().await;
        let mut matching: Vec<Rule> = rules.values().filter(|r| r.kind == kind).cloned().collect();
        matching.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(matching)
    }

    async fn disable(&self, id: Uuid) -> RepositoryResult<()> {
        let mut rules = self.rules.write().await;
        let rule = rules
            .get_mut(&id)
            .ok_or_else(|| RepositoryError::not_found("rule", id))?;
        rule.enabled = false;
        rule.version += 1;
        rule.updated_at = Utc::now();
        Ok(())
    }

    async fn get_version(&self, id: Uuid) -> RepositoryResult<i32> {
        Ok(self.get_by_id(id).await?.version)
    }
}

/// Vec-backed [`DecisionRepository`] preserving append order.
#[derive(Clone, Default)]
pub struct MemoryDecisionRepository {
    decisions: Arc<RwLock<Vec<FraudDecision>>>,
}

impl MemoryDecisionRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.decisions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.decisions.read().await.is_empty()
    }
}

#[async_trait]
impl DecisionRepository for MemoryDecisionRepository {
    async fn create(&self, decision: &FraudDecision) -> RepositoryResult<()> {
        let mut decisions = self.decisions.write().await;
        if decisions
            .iter()
            .any(|d| d.transaction_id == decision.transaction_id)
        {
            return Err(RepositoryError::Conflict {
                entity: "decision",
                detail: "transaction already decided".into(),
            });
        }
        decisions.push(decision.clone());
        Ok(())
    }

    async fn get_by_id(&self, id: Uuid) -> RepositoryResult<FraudDecision> {
        self.decisions
            .read()
            .await
            .iter()
            .find(|d| d.id == id)
            .cloned()
            .ok_or_else(|| RepositoryError::not_found("decision", id))
    }

    async fn get_by_transaction_id(
        &self,
        transaction_id: Uuid,
    ) -> RepositoryResult<FraudDecision> {
        self.decisions
            .read()
            .await
            .iter()
            .find(|d| d.transaction_id == transaction_id)
            .cloned()
            .ok_or_else(|| RepositoryError::not_found("decision", transaction_id))
    }

    async fn list_by_user_id(
        &self,
        user_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> RepositoryResult<Vec<FraudDecision>> {
        let decisions = self.decisions.read().await;
        let mut for_user: Vec<FraudDecision> = decisions
            .iter()
            .filter(|d| d.user_id == user_id)
            .cloned()
            .collect();
        for_user.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(for_user
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect())
    }

    async fn blocked_count_since(
        &self,
        user_id: Uuid,
        since: DateTime<Utc>,
    ) -> RepositoryResult<i64> {
        let decisions = self.decisions.read().await;
        Ok(decisions
            .iter()
            .filter(|d| {
                d.user_id == user_id && d.decision == Decision::Block && d.created_at >= since
            })
            .count() as i64)
    }
}

/// HashMap-backed [`CaseRepository`].
#[derive(Clone, Default)]
pub struct MemoryCaseRepository {
    cases: Arc<RwLock<HashMap<Uuid, FraudCase>>>,
}

impl MemoryCaseRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.cases.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.cases.read().await.is_empty()
    }
}

#[async_trait]
impl CaseRepository for MemoryCaseRepository {
    async fn create(&self, case: &FraudCase) -> RepositoryResult<()> {
        self.cases.write().await.insert(case.id, case.clone());
        Ok(())
    }

    async fn get_by_id(&self, id: Uuid) -> RepositoryResult<FraudCase> {
        self.cases
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| RepositoryError::not_found("case", id))
    }

    async fn update(&self, case: &FraudCase) -> RepositoryResult<()> {
        let mut cases = self.cases.write().await;
        if !cases.contains_key(&case.id) {
            return Err(RepositoryError::not_found("case", case.id));
        }
        cases.insert(case.id, case.clone());
        Ok(())
    }

    async fn list_by_status(
        &self,
        status: CaseStatus,
        limit: i64,
        offset: i64,
    ) -> RepositoryResult<Vec<FraudCase>> {
        let cases = self.cases.read().await;
        let mut matching: Vec<FraudCase> =
            cases.values().filter(|c| c.status == status).cloned().collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(matching
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect())
    }

    async fn list_by_assignee(
        &self,
        assignee: Uuid,
        limit: i64,
        offset: i64,
    ) -> RepositoryResult<Vec<FraudCase>> {
        let cases = self.cases.read().await;
        let mut matching: Vec<FraudCase> = cases
            .values()
            .filter(|c| c.assigned_to == Some(assignee))
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(matching
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect())
    }

    async fn open_cases_by_user(&self, user_id: Uuid) -> RepositoryResult<Vec<FraudCase>> {
        let cases = self.cases.read().await;
        let mut open: Vec<FraudCase> = cases
            .values()
            .filter(|c| c.user_id == user_id && c.is_open())
            .cloned()
            .collect();
        open.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(open)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use sentra_core::{RiskLevel, Severity};
    use serde_json::json;

    fn velocity_rule(name: &str) -> Rule {
        Rule::new(
            name,
            RuleKind::Velocity,
            Severity::High,
            Decision::Block,
            json!({"max_transactions": 5}),
            Uuid::new_v4(),
        )
    }

    #[tokio::test]
    async fn rule_create_then_get_round_trips() {
        let repo = MemoryRuleRepository::new();
        let rule = velocity_rule("high_velocity");
        repo.create(&rule).await.unwrap();

        let loaded = repo.get_by_id(rule.id).await.unwrap();
        assert_eq!(loaded.name, "high_velocity");
        assert_eq!(loaded.config, rule.config);
        assert_eq!(loaded.version, 1);
    }

    #[tokio::test]
    async fn rule_names_are_unique() {
        let repo = MemoryRuleRepository::new();
        repo.create(&velocity_rule("dup")).await.unwrap();
        let err = repo.create(&velocity_rule("dup")).await.unwrap_err();
        assert!(err.is_conflict());
    }

    #[tokio::test]
    async fn rule_update_bumps_version() {
        let repo = MemoryRuleRepository::new();
        let mut rule = velocity_rule("bump");
        repo.create(&rule).await.unwrap();

        rule.description = "tightened".into();
        repo.update(&rule).await.unwrap();
        assert_eq!(repo.get_version(rule.id).await.unwrap(), 2);

        repo.disable(rule.id).await.unwrap();
        assert_eq!(repo.get_version(rule.id).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn disabled_rules_drop_out_of_active_list() {
        let repo = MemoryRuleRepository::new();
        let rule = velocity_rule("active");
        repo.create(&rule).await.unwrap();
        assert_eq!(repo.list_active(Utc::now()).await.unwrap().len(), 1);

        repo.disable(rule.id).await.unwrap();
        assert!(repo.list_active(Utc::now()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn decision_log_is_append_only_and_unique_per_transaction() {
        let repo = MemoryDecisionRepository::new();
        let decision = FraudDecision::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            Decision::Block,
            dec!(0.9),
        );
        repo.create(&decision).await.unwrap();

        let dup = FraudDecision::new(
            decision.transaction_id,
            decision.user_id,
            Decision::Allow,
            dec!(0.1),
        );
        assert!(repo.create(&dup).await.unwrap_err().is_conflict());

        let loaded = repo
            .get_by_transaction_id(decision.transaction_id)
            .await
            .unwrap();
        assert_eq!(loaded.id, decision.id);
    }

    #[tokio::test]
    async fn blocked_count_filters_decision_and_time() {
        let repo = MemoryDecisionRepository::new();
        let user = Uuid::new_v4();

        for (decision, score) in [(Decision::Block, dec!(0.9)), (Decision::Allow, dec!(0.1))] {
            repo.create(&FraudDecision::new(Uuid::new_v4(), user, decision, score))
                .await
                .unwrap();
        }

        let since = Utc::now() - chrono::Duration::days(30);
        assert_eq!(repo.blocked_count_since(user, since).await.unwrap(), 1);
        assert_eq!(
            repo.blocked_count_since(Uuid::new_v4(), since).await.unwrap(),
            0
        );
    }

    #[tokio::test]
    async fn open_cases_exclude_resolved() {
        let repo = MemoryCaseRepository::new();
        let user = Uuid::new_v4();

        let open = FraudCase::new(Uuid::new_v4(), user, Uuid::new_v4(), RiskLevel::High);
        repo.create(&open).await.unwrap();

        let mut resolved = FraudCase::new(Uuid::new_v4(), user, Uuid::new_v4(), RiskLevel::High);
        resolved.resolve(Uuid::new_v4(), "done").unwrap();
        repo.create(&resolved).await.unwrap();

        let open_cases = repo.open_cases_by_user(user).await.unwrap();
        assert_eq!(open_cases.len(), 1);
        assert_eq!(open_cases[0].id, open.id);
    }

    #[tokio::test]
    async fn case_lookup_by_missing_id_is_not_found() {
        let repo = MemoryCaseRepository::new();
        let err = repo.get_by_id(Uuid::new_v4()).await.unwrap_err();
        assert!(err.is_not_found());
    }
}
