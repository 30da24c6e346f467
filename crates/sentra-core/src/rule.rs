//! Fraud rules and per-rule evaluation results.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use uuid::Uuid;

use crate::error::DomainError;
use crate::types::{Decision, RuleKind, Severity};

/// A configurable fraud detection rule.
///
/// The `config` field is a free-form JSON object; each rule family defines
/// its own sub-schema (parsed by the engine crate). `version` increments on
/// every update for audit purposes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rule {
    pub id: Uuid,
    /// Globally unique human-readable name, e.g. `"high_velocity"`.
    pub name: String,
    pub description: String,
    pub kind: RuleKind,
    pub severity: Severity,
    /// Default action when the rule fires. Specific evidence (blocked
    /// country, impossible travel, new device) may override this.
    pub action: Decision,
    pub config: Value,
    pub enabled: bool,
    pub version: i32,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub effective_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl Rule {
    /// Create a new enabled rule effective immediately.
    pub fn new(
        name: impl Into<String>,
        kind: RuleKind,
        severity: Severity,
        action: Decision,
        config: Value,
        created_by: Uuid,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            description: String::new(),
            kind,
            severity,
            action,
            config,
            enabled: true,
            version: 1,
            created_by,
            created_at: now,
            updated_at: now,
            effective_at: now,
            expires_at: None,
        }
    }

    /// A rule is active iff it is enabled and `now` falls inside
    /// `[effective_at, expires_at)`.
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        if !self.enabled || now < self.effective_at {
            return false;
        }
        match self.expires_at {
            Some(expiry) => now < expiry,
            None => true,
        }
    }

    pub fn increment_version(&mut self) {
        self.version += 1;
        self.updated_at = Utc::now();
    }

    pub fn disable(&mut self) {
        self.enabled = false;
        self.updated_at = Utc::now();
    }

    pub fn enable(&mut self) {
        self.enabled = true;
        self.updated_at = Utc::now();
    }

    /// Validate structural invariants before persisting.
    pub fn validate(&self) -> Result<(), DomainError> {
        if !self.kind.is_configurable() {
            return Err(DomainError::InvalidRuleKind);
        }
        match &self.config {
            Value::Object(map) if !map.is_empty() => Ok(()),
            _ => Err(DomainError::RuleConfigInvalid(
                "config must be a non-empty object".to_string(),
            )),
        }
    }
}

/// Outcome of evaluating one rule against one transaction.
///
/// Invariant: `fired == false` implies `score == 0` and `action == Allow`.
/// Constructors enforce this; there is no way to build a non-fired result
/// with a score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleResult {
    pub rule_id: Uuid,
    pub rule_name: String,
    /// Family of the evaluated rule; aggregation weights are looked up by
    /// this field.
    pub kind: RuleKind,
    pub fired: bool,
    pub score: Decimal,
    pub reason: String,
    pub action: Decision,
    pub evaluated_at: DateTime<Utc>,
    pub metadata: HashMap<String, Value>,
}

impl RuleResult {
    /// A rule that matched and contributes `score` to the decision.
    pub fn fired(
        rule: &Rule,
        score: Decimal,
        reason: impl Into<String>,
        action: Decision,
    ) -> Self {
        Self {
            rule_id: rule.id,
            rule_name: rule.name.clone(),
            kind: rule.kind,
            fired: true,
            score: score.clamp(Decimal::ZERO, Decimal::ONE),
            reason: reason.into(),
            action,
            evaluated_at: Utc::now(),
            metadata: HashMap::new(),
        }
    }

    /// A rule that did not match (or could not be evaluated and failed open).
    pub fn not_fired(rule: &Rule, reason: impl Into<String>) -> Self {
        Self {
            rule_id: rule.id,
            rule_name: rule.name.clone(),
            kind: rule.kind,
            fired: false,
            score: Decimal::ZERO,
            reason: reason.into(),
            action: Decision::Allow,
            evaluated_at: Utc::now(),
            metadata: HashMap::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}
