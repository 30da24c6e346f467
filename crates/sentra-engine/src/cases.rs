//! Case coordination: opening cases from the pipeline, investigation
//! operations, and user risk profiles.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use sentra_core::{CaseStatus, FraudCase, RiskLevel};
use sentra_repository::{CaseRepository, DecisionRepository};
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::EngineResult;

/// Description stamped on cases the pipeline opens automatically.
pub const AUTO_CASE_DESCRIPTION: &str =
    "Automated fraud detection flagged transaction for review";

/// Aggregated risk view of a user.
#[derive(Debug, Clone, serde::Serialize)]
pub struct UserRiskProfile {
    pub user_id: Uuid,
    pub risk_level: RiskLevel,
    pub average_risk_score: Decimal,
    pub blocked_count: i64,
    pub open_cases_count: i64,
    pub recent_decisions: i64,
    pub analyzed_at: DateTime<Utc>,
}

/// Owns the fraud-case lifecycle. The pipeline is its only automated
/// caller; investigation operations arrive through the API.
pub struct CaseCoordinator {
    cases: Arc<dyn CaseRepository>,
    decisions: Arc<dyn DecisionRepository>,
}

impl CaseCoordinator {
    pub fn new(cases: Arc<dyn CaseRepository>, decisions: Arc<dyn DecisionRepository>) -> Self {
        Self { cases, decisions }
    }

    /// Fold a flagged transaction into the user's first open case, or open a
    /// new one if none exists.
    pub async fn open_or_append(
        &self,
        transaction_id: Uuid,
        user_id: Uuid,
        account_id: Uuid,
        risk_level: RiskLevel,
    ) -> EngineResult<FraudCase> {
        let open = self.cases.open_cases_by_user(user_id).await?;
        if let Some(mut existing) = open.into_iter().next() {
            existing.add_transaction(transaction_id);
            self.cases.update(&existing).await?;
            tracing::info!(case_id = %existing.id, %transaction_id, "appended transaction to open case");
            return Ok(existing);
        }

        let mut case = FraudCase::new(transaction_id, user_id, account_id, risk_level);
        case.description = AUTO_CASE_DESCRIPTION.to_string();
        self.cases.create(&case).await?;
        tracing::info!(case_id = %case.id, %transaction_id, "opened fraud case");
        Ok(case)
    }

    pub async fn get(&self, case_id: Uuid) -> EngineResult<FraudCase> {
        Ok(self.cases.get_by_id(case_id).await?)
    }

    pub async fn list_by_status(
        &self,
        status: CaseStatus,
        limit: i64,
        offset: i64,
    ) -> EngineResult<Vec<FraudCase>> {
        Ok(self.cases.list_by_status(status, limit, offset).await?)
    }

    pub async fn assign(&self, case_id: Uuid, investigator: Uuid) -> EngineResult<FraudCase> {
        let mut case = self.cases.get_by_id(case_id).await?;
        case.assign(investigator)?;
        self.cases.update(&case).await?;
        Ok(case)
    }

    pub async fn add_note(
        &self,
        case_id: Uuid,
        author: Uuid,
        content: String,
    ) -> EngineResult<FraudCase> {
        let mut case = self.cases.get_by_id(case_id).await?;
        case.add_note(author, content);
        self.cases.update(&case).await?;
        Ok(case)
    }

    pub async fn add_evidence(
        &self,
        case_id: Uuid,
        kind: String,
        description: String,
        url: Option<String>,
        metadata: HashMap<String, String>,
    ) -> EngineResult<FraudCase> {
        let mut case = self.cases.get_by_id(case_id).await?;
        case.add_evidence(kind, description, url, metadata);
        self.cases.update(&case).await?;
        Ok(case)
    }

    pub async fn resolve(
        &self,
        case_id: Uuid,
        resolver: Uuid,
        resolution: String,
    ) -> EngineResult<FraudCase> {
        let mut case = self.cases.get_by_id(case_id).await?;
        case.resolve(resolver, resolution)?;
        self.cases.update(&case).await?;
        Ok(case)
    }

    pub async fn close(&self, case_id: Uuid) -> EngineResult<FraudCase> {
        let mut case = self.cases.get_by_id(case_id).await?;
        case.close()?;
        self.cases.update(&case).await?;
        Ok(case)
    }

    pub async fn escalate(&self, case_id: Uuid, reason: String) -> EngineResult<FraudCase> {
        let mut case = self.cases.get_by_id(case_id).await?;
        case.escalate(reason)?;
        self.cases.update(&case).await?;
        Ok(case)
    }

    /// Aggregate a user's risk from their decision history and open cases.
    pub async fn user_risk_profile(&self, user_id: Uuid) -> EngineResult<UserRiskProfile> {
        let recent = self.decisions.list_by_user_id(user_id, 100, 0).await?;
        let since = Utc::now() - Duration::days(30);
        let blocked_count = self.decisions.blocked_count_since(user_id, since).await?;
        let open_cases = self.cases.open_cases_by_user(user_id).await?;

        let average_risk_score = if recent.is_empty() {
            Decimal::ZERO
        } else {
            let total: Decimal = recent.iter().map(|d| d.score).sum();
            (total / Decimal::from(recent.len() as i64)).round_dp(6)
        };

        let mut profile = UserRiskProfile {
            user_id,
            risk_level: RiskLevel::Low,
            average_risk_score,
            blocked_count,
            open_cases_count: open_cases.len() as i64,
            recent_decisions: recent.len() as i64,
            analyzed_at: Utc::now(),
        };
        profile.risk_level = user_risk_level(&profile);
        Ok(profile)
    }
}

/// Weighted user risk: blocked history 30%, open cases 30%, average decision
/// score 40%.
fn user_risk_level(profile: &UserRiskProfile) -> RiskLevel {
    let mut score = Decimal::ZERO;

    score += match profile.blocked_count {
        n if n >= 5 => Decimal::from(30),
        n if n >= 3 => Decimal::from(20),
        n if n >= 1 => Decimal::from(10),
        _ => Decimal::ZERO,
    };

    score += match profile.open_cases_count {
        n if n >= 2 => Decimal::from(30),
        n if n >= 1 => Decimal::from(15),
        _ => Decimal::ZERO,
    };

    score += profile.average_risk_score * Decimal::from(40);

    if score >= Decimal::from(80) {
        RiskLevel::Critical
    } else if score >= Decimal::from(60) {
        RiskLevel::High
    } else if score >= Decimal::from(30) {
        RiskLevel::Medium
    } else {
        RiskLevel::Low
    }
}
