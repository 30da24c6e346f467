//! Closed enums shared across the engine.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Outcome of fraud analysis for a transaction.
///
/// Variant order is the canonical severity order: `Allow < Challenge <
/// Review < Block`. The derived `Ord` is relied upon by the decision
/// monotonicity guarantees, so do not reorder variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Allow,
    /// Step-up verification required before the transaction proceeds.
    Challenge,
    Review,
    Block,
}

impl Decision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Decision::Allow => "allow",
            Decision::Challenge => "challenge",
            Decision::Review => "review",
            Decision::Block => "block",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "allow" => Some(Decision::Allow),
            "challenge" => Some(Decision::Challenge),
            "review" => Some(Decision::Review),
            "block" => Some(Decision::Block),
            _ => None,
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Risk severity derived from the final score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
            RiskLevel::Critical => "critical",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "low" => Some(RiskLevel::Low),
            "medium" => Some(RiskLevel::Medium),
            "high" => Some(RiskLevel::High),
            "critical" => Some(RiskLevel::Critical),
            _ => None,
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rule family. Weight lookup during aggregation is keyed by this, never by
/// rule name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleKind {
    Velocity,
    Amount,
    Geographic,
    Device,
    Merchant,
    Behavioral,
    /// Reserved for the pluggable model scorer; not a valid kind for
    /// persisted rules.
    Ml,
}

impl RuleKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleKind::Velocity => "velocity",
            RuleKind::Amount => "amount",
            RuleKind::Geographic => "geographic",
            RuleKind::Device => "device",
            RuleKind::Merchant => "merchant",
            RuleKind::Behavioral => "behavioral",
            RuleKind::Ml => "ml",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "velocity" => Some(RuleKind::Velocity),
            "amount" => Some(RuleKind::Amount),
            "geographic" => Some(RuleKind::Geographic),
            "device" => Some(RuleKind::Device),
            "merchant" => Some(RuleKind::Merchant),
            "behavioral" => Some(RuleKind::Behavioral),
            "ml" => Some(RuleKind::Ml),
            _ => None,
        }
    }

    /// Families allowed on persisted rules.
    pub fn is_configurable(&self) -> bool {
        !matches!(self, RuleKind::Ml)
    }
}

impl fmt::Display for RuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How serious a rule violation is, independent of its score contribution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "low" => Some(Severity::Low),
            "medium" => Some(Severity::Medium),
            "high" => Some(Severity::High),
            "critical" => Some(Severity::Critical),
            _ => None,
        }
    }
}

/// Lifecycle state of a fraud investigation case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaseStatus {
    Open,
    Investigating,
    Resolved,
    Closed,
    Escalated,
}

impl CaseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CaseStatus::Open => "open",
            CaseStatus::Investigating => "investigating",
            CaseStatus::Resolved => "resolved",
            CaseStatus::Closed => "closed",
            CaseStatus::Escalated => "escalated",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "open" => Some(CaseStatus::Open),
            "investigating" => Some(CaseStatus::Investigating),
            "resolved" => Some(CaseStatus::Resolved),
            "closed" => Some(CaseStatus::Closed),
            "escalated" => Some(CaseStatus::Escalated),
            _ => None,
        }
    }
}

impl fmt::Display for CaseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How per-rule scores are combined into the final score.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoringStrategy {
    #[default]
    WeightedAverage,
    Max,
    Bayesian,
}
