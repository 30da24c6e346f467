//! Velocity rules: transaction frequency and rolling-amount limits.

use chrono::Duration;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sentra_core::{EvaluationContext, Rule, RuleResult};
use sentra_store::WindowStore;
use serde::Deserialize;

use super::parse_config;

#[derive(Debug, Deserialize)]
#[serde(default)]
pub(crate) struct VelocityConfig {
    pub max_transactions: i64,
    pub window_minutes: i64,
    pub amount_threshold: Decimal,
    pub count_only: bool,
}

impl Default for VelocityConfig {
    fn default() -> Self {
        Self {
            max_transactions: 10,
            window_minutes: 5,
            amount_threshold: Decimal::ZERO,
            count_only: false,
        }
    }
}

pub(crate) async fn evaluate(
    rule: &Rule,
    ctx: &EvaluationContext,
    store: &dyn WindowStore,
) -> RuleResult {
    let config: VelocityConfig = parse_config(rule);
    let window = Duration::minutes(config.window_minutes);

    let count = match store.count_in_window(ctx.user_id, window).await {
        Ok(count) => count,
        Err(e) => {
            tracing::warn!(rule = %rule.name, user_id = %ctx.user_id, "velocity check unavailable: {}", e);
            return RuleResult::not_fired(rule, "Unable to evaluate velocity");
        }
    };

    if count >= config.max_transactions {
        let score = velocity_score(count, config.max_transactions);
        let reason = format!(
            "Velocity limit exceeded: {} transactions in {} minutes (limit: {})",
            count, config.window_minutes, config.max_transactions
        );
        return RuleResult::fired(rule, score, reason, rule.action)
            .with_metadata("transaction_count", count)
            .with_metadata("limit", config.max_transactions)
            .with_metadata("window_minutes", config.window_minutes);
    }

    if config.amount_threshold > Decimal::ZERO && !config.count_only {
        if let Ok(total) = store.sum_in_window(ctx.user_id, window).await {
            let projected = total + ctx.amount;
            if projected > config.amount_threshold {
                let reason = format!(
                    "Amount velocity limit exceeded: {} total in {} minutes (limit: {})",
                    projected, config.window_minutes, config.amount_threshold
                );
                return RuleResult::fired(rule, dec!(0.70), reason, rule.action)
                    .with_metadata("total_amount", projected.to_string())
                    .with_metadata("amount_limit", config.amount_threshold.to_string());
            }
        }
    }

    RuleResult::not_fired(rule, "Within velocity limits")
}

/// Score grows with how far past the limit the user is: 0.50 at the limit,
/// +0.40 per additional 100% of the limit, capped at 0.90 once the count is
/// double the limit.
fn velocity_score(count: i64, limit: i64) -> Decimal {
    if limit <= 0 {
        return dec!(0.90);
    }
    let ratio = Decimal::from(count) / Decimal::from(limit);
    if ratio >= dec!(2.0) {
        return dec!(0.90);
    }
    (dec!(0.50) + (ratio - Decimal::ONE) * dec!(0.40)).clamp(Decimal::ZERO, Decimal::ONE)
}
