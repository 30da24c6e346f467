//! Row-to-domain mapping for the PostgreSQL repositories.
//!
//! Enums are stored as lowercase varchar and variable-shape fields (rule
//! config, fired rules, reasons, notes, evidence) as JSONB. A row that no
//! longer parses maps to [`RepositoryError::Corrupt`] rather than panicking.

use sentra_core::{
    CaseNote, CaseStatus, Decision, Evidence, FraudCase, FraudDecision, RiskLevel, Rule, RuleKind,
    Severity,
};
use sqlx::postgres::PgRow;
use sqlx::Row;
use uuid::Uuid;

use crate::error::{RepositoryError, RepositoryResult};

fn corrupt(entity: &'static str, id: Uuid, detail: impl Into<String>) -> RepositoryError {
    RepositoryError::Corrupt {
        entity,
        id,
        detail: detail.into(),
    }
}

pub(crate) fn rule_from_row(row: &PgRow) -> RepositoryResult<Rule> {
    let id: Uuid = row.try_get("id")?;
    let kind: String = row.try_get("kind")?;
    let severity: String = row.try_get("severity")?;
    let action: String = row.try_get("action")?;

    Ok(Rule {
        id,
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        kind: RuleKind::parse(&kind)
            .ok_or_else(|| corrupt("rule", id, format!("unknown kind {kind:?}")))?,
        severity: Severity::parse(&severity)
            .ok_or_else(|| corrupt("rule", id, format!("unknown severity {severity:?}")))?,
        action: Decision::parse(&action)
            .ok_or_else(|| corrupt("rule", id, format!("unknown action {action:?}")))?,
        config: row.try_get("config")?,
        enabled: row.try_get("enabled")?,
        version: row.try_get("version")?,
        created_by: row.try_get("created_by")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
        effective_at: row.try_get("effective_at")?,
        expires_at: row.try_get("expires_at")?,
    })
}

pub(crate) fn decision_from_row(row: &PgRow) -> RepositoryResult<FraudDecision> {
    let id: Uuid = row.try_get("id")?;
    let decision: String = row.try_get("decision")?;
    let risk_level: String = row.try_get("risk_level")?;
    let rules_fired: serde_json::Value = row.try_get("rules_fired")?;
    let reasons: serde_json::Value = row.try_get("reasons")?;

    Ok(FraudDecision {
        id,
        transaction_id: row.try_get("transaction_id")?,
        user_id: row.try_get("user_id")?,
        decision: Decision::parse(&decision)
            .ok_or_else(|| corrupt("decision", id, format!("unknown decision {decision:?}")))?,
        score: row.try_get("score")?,
        risk_level: RiskLevel::parse(&risk_level)
            .ok_or_else(|| corrupt("decision", id, format!("unknown risk level {risk_level:?}")))?,
        confidence: row.try_get("confidence")?,
        rules_fired: serde_json::from_value(rules_fired)?,
        reasons: serde_json::from_value(reasons)?,
        model_version: row.try_get("model_version")?,
        processed_at: row.try_get("processed_at")?,
        latency_ms: row.try_get("latency_ms")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

pub(crate) fn case_from_row(row: &PgRow) -> RepositoryResult<FraudCase> {
    let id: Uuid = row.try_get("id")?;
    let status: String = row.try_get("status")?;
    let risk_level: String = row.try_get("risk_level")?;
    let transaction_ids: serde_json::Value = row.try_get("transaction_ids")?;
    let notes: serde_json::Value = row.try_get("notes")?;
    let evidence: serde_json::Value = row.try_get("evidence")?;

    let transaction_ids: Vec<Uuid> = serde_json::from_value(transaction_ids)?;
    let notes: Vec<CaseNote> = serde_json::from_value(notes)?;
    let evidence: Vec<Evidence> = serde_json::from_value(evidence)?;

    Ok(FraudCase {
        id,
        transaction_ids,
        user_id: row.try_get("user_id")?,
        account_id: row.try_get("account_id")?,
        status: CaseStatus::parse(&status)
            .ok_or_else(|| corrupt("case", id, format!("unknown status {status:?}")))?,
        risk_level: RiskLevel::parse(&risk_level)
            .ok_or_else(|| corrupt("case", id, format!("unknown risk level {risk_level:?}")))?,
        total_amount: row.try_get("total_amount")?,
        currency: row.try_get("currency")?,
        assigned_to: row.try_get("assigned_to")?,
        description: row.try_get("description")?,
        notes,
        evidence,
        resolution: row.try_get("resolution")?,
        resolved_by: row.try_get("resolved_by")?,
        resolved_at: row.try_get("resolved_at")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}
