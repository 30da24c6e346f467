//! PostgreSQL repository implementations over sqlx.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sentra_core::{CaseStatus, FraudCase, FraudDecision, Rule, RuleKind};
use sqlx::postgres::PgPool;
use sqlx::Row;
use uuid::Uuid;

use crate::error::{RepositoryError, RepositoryResult};
use crate::models::{case_from_row, decision_from_row, rule_from_row};
use crate::traits::{CaseRepository, DecisionRepository, RuleRepository};

/// Map a driver error to a conflict when it is a unique-constraint
/// violation (class 23505), otherwise pass it through as transport failure.
fn map_unique_violation(
    err: sqlx::Error,
    entity: &'static str,
    detail: &'static str,
) -> RepositoryError {
    if let sqlx::Error::Database(ref db) = err {
        if db.code().as_deref() == Some("23505") {
            return RepositoryError::Conflict {
                entity,
                detail: detail.to_string(),
            };
        }
    }
    RepositoryError::Database(err)
}

/// Rule storage in the `fraud_rules` table.
#[derive(Clone)]
pub struct PgRuleRepository {
    pool: PgPool,
}

impl PgRuleRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RuleRepository for PgRuleRepository {
    async fn create(&self, rule: &Rule) -> RepositoryResult<()> {
        sqlx::query(
            r#"
            INSERT INTO fraud_rules (
                id, name, description, kind, severity, action, config,
                enabled, version, created_by, created_at, updated_at,
                effective_at, expires_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            "#,
        )
        .bind(rule.id)
        .bind(&rule.name)
        .bind(&rule.description)
        .bind(rule.kind.as_str())
        .bind(rule.severity.as_str())
        .bind(rule.action.as_str())
        .bind(&rule.config)
        .bind(rule.enabled)
        .bind(rule.version)
        .bind(rule.created_by)
        .bind(rule.created_at)
        .bind(rule.updated_at)
        .bind(rule.effective_at)
        .bind(rule.expires_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_unique_violation(e, "rule", "name already exists"))?;

        Ok(())
    }

    async fn get_by_id(&self, id: Uuid) -> RepositoryResult<Rule> {
        let row = sqlx::query("SELECT * FROM fraud_rules WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| RepositoryError::not_found("rule", id))?;

        rule_from_row(&row)
    }

    async fn update(&self, rule: &Rule) -> RepositoryResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE fraud_rules SET
                name = $2, description = $3, kind = $4, severity = $5,
                action = $6, config = $7, enabled = $8, effective_at = $9,
                expires_at = $10, version = version + 1, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(rule.id)
        .bind(&rule.name)
        .bind(&rule.description)
        .bind(rule.kind.as_str())
        .bind(rule.severity.as_str())
        .bind(rule.action.as_str())
        .bind(&rule.config)
        .bind(rule.enabled)
        .bind(rule.effective_at)
        .bind(rule.expires_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_unique_violation(e, "rule", "name already exists"))?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::not_found("rule", rule.id));
        }
        Ok(())
    }

    async fn list_active(&self, now: DateTime<Utc>) -> RepositoryResult<Vec<Rule>> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM fraud_rules
            WHERE enabled
              AND effective_at <= $1
              AND (expires_at IS NULL OR expires_at > $1)
            ORDER BY created_at, id
            "#,
        )
        .bind(now)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(rule_from_row).collect()
    }

    async fn list_by_kind(&self, kind: RuleKind) -> RepositoryResult<Vec<Rule>> {
        let rows = sqlx::query("SELECT * FROM fraud_rules WHERE kind = $1 ORDER BY created_at, id")
            .bind(kind.as_str())
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(rule_from_row).collect()
    }

    async fn disable(&self, id: Uuid) -> RepositoryResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE fraud_rules
            SET enabled = FALSE, version = version + 1, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::not_found("rule", id));
        }
        Ok(())
    }

    async fn get_version(&self, id: Uuid) -> RepositoryResult<i32> {
        let row = sqlx::query("SELECT version FROM fraud_rules WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| RepositoryError::not_found("rule", id))?;

        Ok(row.try_get("version")?)
    }
}

/// Append-only decision log in the `fraud_decisions` table.
#[derive(Clone)]
pub struct PgDecisionRepository {
    pool: PgPool,
}

impl PgDecisionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DecisionRepository for PgDecisionRepository {
    async fn create(&self, decision: &FraudDecision) -> RepositoryResult<()> {
        let rules_fired = serde_json::to_value(&decision.rules_fired)?;
        let reasons = serde_json::to_value(&decision.reasons)?;

        sqlx::query(
            r#"
            INSERT INTO fraud_decisions (
                id, transaction_id, user_id, decision, score, risk_level,
                confidence, rules_fired, reasons, model_version,
                processed_at, latency_ms, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            "#,
        )
        .bind(decision.id)
        .bind(decision.transaction_id)
        .bind(decision.user_id)
        .bind(decision.decision.as_str())
        .bind(decision.score)
        .bind(decision.risk_level.as_str())
        .bind(decision.confidence)
        .bind(rules_fired)
        .bind(reasons)
        .bind(&decision.model_version)
        .bind(decision.processed_at)
        .bind(decision.latency_ms)
        .bind(decision.created_at)
        .bind(decision.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_unique_violation(e, "decision", "transaction already decided"))?;

        Ok(())
    }

    async fn get_by_id(&self, id: Uuid) -> RepositoryResult<FraudDecision> {
        let row = sqlx::query("SELECT * FROM fraud_decisions WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| RepositoryError::not_found("decision", id))?;

        decision_from_row(&row)
    }

    async fn get_by_transaction_id(
        &self,
        transaction_id: Uuid,
    ) -> RepositoryResult<FraudDecision> {
        let row = sqlx::query(
            r#"
            SELECT * FROM fraud_decisions
            WHERE transaction_id = $1
            ORDER BY created_at
            LIMIT 1
            "#,
        )
        .bind(transaction_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| RepositoryError::not_found("decision", transaction_id))?;

        decision_from_row(&row)
    }

    async fn list_by_user_id(
        &self,
        user_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> RepositoryResult<Vec<FraudDecision>> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM fraud_decisions
            WHERE user_id = $1
            ORDER BY created_at DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(decision_from_row).collect()
    }

    async fn blocked_count_since(
        &self,
        user_id: Uuid,
        since: DateTime<Utc>,
    ) -> RepositoryResult<i64> {
        let row = sqlx::query(
            r#"
            SELECT COUNT(*) AS blocked FROM fraud_decisions
            WHERE user_id = $1 AND decision = 'block' AND created_at >= $2
            "#,
        )
        .bind(user_id)
        .bind(since)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.try_get("blocked")?)
    }
}

/// Case storage in the `fraud_cases` table.
#[derive(Clone)]
pub struct PgCaseRepository {
    pool: PgPool,
}

impl PgCaseRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CaseRepository for PgCaseRepository {
    async fn create(&self, case: &FraudCase) -> RepositoryResult<()> {
        let transaction_ids = serde_json::to_value(&case.transaction_ids)?;
        let notes = serde_json::to_value(&case.notes)?;
        let evidence = serde_json::to_value(&case.evidence)?;

        sqlx::query(
            r#"
            INSERT INTO fraud_cases (
                id, transaction_ids, user_id, account_id, status, risk_level,
                total_amount, currency, assigned_to, description, notes,
                evidence, resolution, resolved_by, resolved_at, created_at,
                updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13,
                      $14, $15, $16, $17)
            "#,
        )
        .bind(case.id)
        .bind(transaction_ids)
        .bind(case.user_id)
        .bind(case.account_id)
        .bind(case.status.as_str())
        .bind(case.risk_level.as_str())
        .bind(case.total_amount)
        .bind(&case.currency)
        .bind(case.assigned_to)
        .bind(&case.description)
        .bind(notes)
        .bind(evidence)
        .bind(&case.resolution)
        .bind(case.resolved_by)
        .bind(case.resolved_at)
        .bind(case.created_at)
        .bind(case.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_by_id(&self, id: Uuid) -> RepositoryResult<FraudCase> {
        let row = sqlx::query("SELECT * FROM fraud_cases WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| RepositoryError::not_found("case", id))?;

        case_from_row(&row)
    }

    async fn update(&self, case: &FraudCase) -> RepositoryResult<()> {
        let transaction_ids = serde_json::to_value(&case.transaction_ids)?;
        let notes = serde_json::to_value(&case.notes)?;
        let evidence = serde_json::to_value(&case.evidence)?;

        let result = sqlx::query(
            r#"
            UPDATE fraud_cases SET
                transaction_ids = $2, status = $3, risk_level = $4,
                total_amount = $5, currency = $6, assigned_to = $7,
                description = $8, notes = $9, evidence = $10,
                resolution = $11, resolved_by = $12, resolved_at = $13,
                updated_at = $14
            WHERE id = $1
            "#,
        )
        .bind(case.id)
        .bind(transaction_ids)
        .bind(case.status.as_str())
        .bind(case.risk_level.as_str())
        .bind(case.total_amount)
        .bind(&case.currency)
        .bind(case.assigned_to)
        .bind(&case.description)
        .bind(notes)
        .bind(evidence)
        .bind(&case.resolution)
        .bind(case.resolved_by)
        .bind(case.resolved_at)
        .bind(case.updated_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::not_found("case", case.id));
        }
        Ok(())
    }

    async fn list_by_status(
        &self,
        status: CaseStatus,
        limit: i64,
        offset: i64,
    ) -> RepositoryResult<Vec<FraudCase>> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM fraud_cases
            WHERE status = $1
            ORDER BY created_at DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(status.as_str())
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(case_from_row).collect()
    }

    async fn list_by_assignee(
        &self,
        assignee: Uuid,
        limit: i64,
        offset: i64,
    ) -> RepositoryResult<Vec<FraudCase>> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM fraud_cases
            WHERE assigned_to = $1
            ORDER BY created_at DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(assignee)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(case_from_row).collect()
    }

    async fn open_cases_by_user(&self, user_id: Uuid) -> RepositoryResult<Vec<FraudCase>> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM fraud_cases
            WHERE user_id = $1 AND status IN ('open', 'investigating')
            ORDER BY created_at
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(case_from_row).collect()
    }
}
