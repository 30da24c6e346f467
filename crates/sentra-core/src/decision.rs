//! The fraud decision record.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::{Decision, RiskLevel};

/// Outcome of fraud analysis on a single transaction.
///
/// Decisions are append-only: once persisted they are never mutated. A
/// retried transaction produces a second record rather than overwriting the
/// first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FraudDecision {
    pub id: Uuid,
    pub transaction_id: Uuid,
    pub user_id: Uuid,

    pub decision: Decision,
    /// Fraud probability in `[0, 1]`.
    pub score: Decimal,
    pub risk_level: RiskLevel,
    pub confidence: Decimal,

    /// Names of the rules that fired, in evaluation order. `reasons` is
    /// parallel to this list.
    pub rules_fired: Vec<String>,
    pub reasons: Vec<String>,
    pub model_version: Option<String>,

    pub processed_at: DateTime<Utc>,
    pub latency_ms: i64,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl FraudDecision {
    pub fn new(transaction_id: Uuid, user_id: Uuid, decision: Decision, score: Decimal) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            transaction_id,
            user_id,
            decision,
            score,
            risk_level: RiskLevel::for_score(score),
            confidence: Decimal::ZERO,
            rules_fired: Vec::new(),
            reasons: Vec::new(),
            model_version: None,
            processed_at: now,
            latency_ms: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Record a fired rule and its explanation, preserving fire order.
    pub fn add_fired_rule(&mut self, rule_name: impl Into<String>, reason: impl Into<String>) {
        self.rules_fired.push(rule_name.into());
        self.reasons.push(reason.into());
        self.updated_at = Utc::now();
    }

    pub fn should_block(&self) -> bool {
        self.decision == Decision::Block
    }

    pub fn requires_review(&self) -> bool {
        self.decision == Decision::Review
    }
}

impl RiskLevel {
    /// Map a score to its risk band: `[0, 0.30)` low, `[0.30, 0.60)` medium,
    /// `[0.60, 0.80)` high, `[0.80, 1]` critical.
    pub fn for_score(score: Decimal) -> RiskLevel {
        let critical = Decimal::new(80, 2);
        let high = Decimal::new(60, 2);
        let medium = Decimal::new(30, 2);
        if score >= critical {
            RiskLevel::Critical
        } else if score >= high {
            RiskLevel::High
        } else if score >= medium {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn risk_level_band_boundaries_are_inclusive_lower() {
        assert_eq!(RiskLevel::for_score(dec!(0.0)), RiskLevel::Low);
        assert_eq!(RiskLevel::for_score(dec!(0.29)), RiskLevel::Low);
        assert_eq!(RiskLevel::for_score(dec!(0.30)), RiskLevel::Medium);
        assert_eq!(RiskLevel::for_score(dec!(0.60)), RiskLevel::High);
        assert_eq!(RiskLevel::for_score(dec!(0.79)), RiskLevel::High);
        assert_eq!(RiskLevel::for_score(dec!(0.80)), RiskLevel::Critical);
        assert_eq!(RiskLevel::for_score(dec!(1.0)), RiskLevel::Critical);
    }

    #[test]
    fn new_decision_derives_risk_level() {
        let d = FraudDecision::new(Uuid::new_v4(), Uuid::new_v4(), Decision::Block, dec!(0.9));
        assert_eq!(d.risk_level, RiskLevel::Critical);
        assert!(d.should_block());
        assert!(!d.requires_review());
    }

    #[test]
    fn fired_rules_and_reasons_stay_parallel() {
        let mut d = FraudDecision::new(Uuid::new_v4(), Uuid::new_v4(), Decision::Review, dec!(0.65));
        d.add_fired_rule("high_velocity", "Velocity limit exceeded");
        d.add_fired_rule("new_device", "Transaction from new device");
        assert_eq!(d.rules_fired, vec!["high_velocity", "new_device"]);
        assert_eq!(d.reasons.len(), d.rules_fired.len());
        assert!(d.requires_review());
    }
}
