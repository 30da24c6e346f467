//! Score aggregation: combining per-rule outputs into a final decision.

use chrono::{DateTime, Utc};
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::DomainError;
use crate::rule::RuleResult;
use crate::types::{Decision, RiskLevel, RuleKind, ScoringStrategy};

/// Per-family contribution weights for the weighted-average strategy.
///
/// Lookup is always by [`RuleKind`], never by rule name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreWeights {
    pub velocity: Decimal,
    pub amount: Decimal,
    pub geographic: Decimal,
    pub device: Decimal,
    pub merchant: Decimal,
    pub behavioral: Decimal,
    pub ml: Decimal,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            velocity: Decimal::new(25, 2),
            amount: Decimal::new(15, 2),
            geographic: Decimal::new(20, 2),
            device: Decimal::new(15, 2),
            merchant: Decimal::new(10, 2),
            behavioral: Decimal::new(10, 2),
            ml: Decimal::new(5, 2),
        }
    }
}

impl ScoreWeights {
    pub fn for_kind(&self, kind: RuleKind) -> Decimal {
        match kind {
            RuleKind::Velocity => self.velocity,
            RuleKind::Amount => self.amount,
            RuleKind::Geographic => self.geographic,
            RuleKind::Device => self.device,
            RuleKind::Merchant => self.merchant,
            RuleKind::Behavioral => self.behavioral,
            RuleKind::Ml => self.ml,
        }
    }
}

/// Score thresholds mapping the final score to a decision. Lower bounds are
/// inclusive: a score exactly at a threshold takes the more severe decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionThresholds {
    pub block: Decimal,
    pub review: Decimal,
    pub challenge: Decimal,
}

impl Default for DecisionThresholds {
    fn default() -> Self {
        Self {
            block: Decimal::new(80, 2),
            review: Decimal::new(60, 2),
            challenge: Decimal::new(40, 2),
        }
    }
}

impl DecisionThresholds {
    /// Enforce `0 < challenge < review < block < 1`. Called at config load;
    /// a service must refuse to start with a non-monotonic threshold set.
    pub fn validate(&self) -> Result<(), DomainError> {
        let ordered = Decimal::ZERO < self.challenge
            && self.challenge < self.review
            && self.review < self.block
            && self.block < Decimal::ONE;
        if ordered {
            Ok(())
        } else {
            Err(DomainError::InvalidThresholds {
                challenge: self.challenge.to_string(),
                review: self.review.to_string(),
                block: self.block.to_string(),
            })
        }
    }

    pub fn decide(&self, score: Decimal) -> Decision {
        if score >= self.block {
            Decision::Block
        } else if score >= self.review {
            Decision::Review
        } else if score >= self.challenge {
            Decision::Challenge
        } else {
            Decision::Allow
        }
    }
}

/// Detailed result of combining rule outputs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub final_score: Decimal,
    pub risk_level: RiskLevel,
    /// Contribution of each fired rule, keyed by rule name.
    pub contributions: HashMap<String, Decimal>,
    pub strategy: ScoringStrategy,
    pub calculated_at: DateTime<Utc>,
}

/// Combine rule results into a final score under the selected strategy.
///
/// The aggregator is score-only and never inspects rule actions; the
/// pipeline applies the documented block short-circuit on top of the
/// threshold mapping.
pub fn aggregate(
    results: &[RuleResult],
    weights: &ScoreWeights,
    strategy: ScoringStrategy,
) -> ScoreBreakdown {
    match strategy {
        ScoringStrategy::WeightedAverage => weighted_average(results, weights),
        ScoringStrategy::Max => max_score(results),
        ScoringStrategy::Bayesian => bayesian(results),
    }
}

fn weighted_average(results: &[RuleResult], weights: &ScoreWeights) -> ScoreBreakdown {
    let mut total = Decimal::ZERO;
    let mut contributions = HashMap::new();

    for result in results.iter().filter(|r| r.fired) {
        let weight = weights.for_kind(result.kind);
        let contribution = result.score * weight;
        total += contribution;
        contributions.insert(result.rule_name.clone(), contribution);
    }

    let final_score = total.clamp(Decimal::ZERO, Decimal::ONE);
    breakdown(final_score, contributions, ScoringStrategy::WeightedAverage)
}

fn max_score(results: &[RuleResult]) -> ScoreBreakdown {
    let mut max = Decimal::ZERO;
    let mut contributions = HashMap::new();

    for result in results.iter().filter(|r| r.fired) {
        if result.score > max {
            max = result.score;
        }
        contributions.insert(result.rule_name.clone(), result.score);
    }

    breakdown(max, contributions, ScoringStrategy::Max)
}

/// Naive-Bayes combination in log-odds space with a 1% fraud prior. Each
/// fired rule's score is treated as an independent probability and folded
/// into the odds; geometry-free, so f64 is fine here.
fn bayesian(results: &[RuleResult]) -> ScoreBreakdown {
    const PRIOR: f64 = 0.01;

    let mut odds = PRIOR / (1.0 - PRIOR);
    let mut contributions = HashMap::new();
    let mut any_fired = false;

    for result in results.iter().filter(|r| r.fired) {
        any_fired = true;
        // Scores of exactly 0 or 1 would collapse or saturate the odds.
        let s = result.score.to_f64().unwrap_or(0.0).clamp(1e-6, 1.0 - 1e-6);
        odds *= s / (1.0 - s);
        contributions.insert(result.rule_name.clone(), result.score);
    }

    let final_score = if any_fired {
        let p = odds / (1.0 + odds);
        Decimal::from_f64(p)
            .unwrap_or(Decimal::ZERO)
            .round_dp(6)
            .clamp(Decimal::ZERO, Decimal::ONE)
    } else {
        Decimal::ZERO
    };

    breakdown(final_score, contributions, ScoringStrategy::Bayesian)
}

fn breakdown(
    final_score: Decimal,
    contributions: HashMap<String, Decimal>,
    strategy: ScoringStrategy,
) -> ScoreBreakdown {
    ScoreBreakdown {
        final_score,
        risk_level: RiskLevel::for_score(final_score),
        contributions,
        strategy,
        calculated_at: Utc::now(),
    }
}

/// Confidence in a decision: the fraction of evaluated rules that fired,
/// capped at 0.95 to account for residual uncertainty. Zero when no rules
/// were evaluated.
pub fn confidence(results: &[RuleResult]) -> Decimal {
    if results.is_empty() {
        return Decimal::ZERO;
    }

    let fired = results.iter().filter(|r| r.fired).count();
    let ratio = Decimal::from(fired as i64) / Decimal::from(results.len() as i64);
    ratio.min(Decimal::new(95, 2)).round_dp(4)
}
