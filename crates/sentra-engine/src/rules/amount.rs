//! Amount rules: absolute ceilings and deviation from the user's average.

use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sentra_core::{EvaluationContext, Rule, RuleResult};
use serde::Deserialize;

use super::parse_config;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct AmountConfig {
    pub min_amount: Decimal,
    pub max_amount: Decimal,
    pub deviation_factor: f64,
}

pub(crate) fn evaluate(rule: &Rule, ctx: &EvaluationContext) -> RuleResult {
    let config: AmountConfig = parse_config(rule);

    if config.max_amount > Decimal::ZERO && ctx.amount > config.max_amount {
        let score = amount_score(ctx.amount, config.max_amount);
        let reason = format!(
            "Transaction amount {} exceeds maximum threshold {}",
            ctx.amount, config.max_amount
        );
        return RuleResult::fired(rule, score, reason, rule.action)
            .with_metadata("amount", ctx.amount.to_string())
            .with_metadata("max_amount", config.max_amount.to_string());
    }

    if config.deviation_factor > 0.0 {
        if let Some(profile) = &ctx.user_profile {
            let average = profile.average_transaction;
            if !average.is_zero() {
                let factor = Decimal::from_f64(config.deviation_factor).unwrap_or(Decimal::ZERO);
                let threshold = average * factor;
                if ctx.amount > threshold {
                    let reason = format!(
                        "Transaction amount {} is {:.1}x user's average ({})",
                        ctx.amount, config.deviation_factor, average
                    );
                    return RuleResult::fired(rule, dec!(0.65), reason, rule.action)
                        .with_metadata("amount", ctx.amount.to_string())
                        .with_metadata("average", average.to_string())
                        .with_metadata("deviation_factor", config.deviation_factor);
                }
            }
        }
    }

    RuleResult::not_fired(rule, "Amount within limits")
}

/// Score grows with the overshoot ratio: 0.60 just above the limit, 0.80 at
/// twice the limit, 0.95 at five times or more.
fn amount_score(amount: Decimal, limit: Decimal) -> Decimal {
    let ratio = amount / limit;
    if ratio >= dec!(5.0) {
        dec!(0.95)
    } else if ratio >= dec!(2.0) {
        dec!(0.80)
    } else {
        (dec!(0.60) + (ratio - Decimal::ONE) * dec!(0.20)).clamp(Decimal::ZERO, Decimal::ONE)
    }
}
