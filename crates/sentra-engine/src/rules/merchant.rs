//! Merchant rules: high-risk merchants and high-risk category codes.

use rust_decimal_macros::dec;
use sentra_core::{Decision, EvaluationContext, Rule, RuleResult};

/// MCCs treated as high risk: gambling, lottery, direct marketing, crypto.
const HIGH_RISK_MCCS: [&str; 4] = ["7995", "7801", "5967", "6051"];

pub(crate) fn evaluate(rule: &Rule, ctx: &EvaluationContext) -> RuleResult {
    let Some(merchant) = &ctx.merchant else {
        return RuleResult::not_fired(rule, "No merchant data");
    };

    if merchant.is_high_risk {
        let reason = format!(
            "Transaction with high-risk merchant: {}",
            merchant.merchant_name
        );
        return RuleResult::fired(rule, dec!(0.45), reason, Decision::Review)
            .with_metadata("merchant_name", merchant.merchant_name.clone())
            .with_metadata("merchant_category", merchant.merchant_category.clone());
    }

    if HIGH_RISK_MCCS.contains(&merchant.merchant_category.as_str()) {
        let reason = format!(
            "Transaction with high-risk merchant category: {}",
            merchant.merchant_category
        );
        return RuleResult::fired(rule, dec!(0.40), reason, Decision::Review)
            .with_metadata("merchant_category", merchant.merchant_category.clone());
    }

    RuleResult::not_fired(rule, "Merchant check passed")
}
