//! Rule family evaluators.
//!
//! Each family consumes its own config sub-schema out of the rule's
//! free-form JSON config and evaluates against the enrichment context.
//! Window-store failures fail **open**: the rule reports `fired = false`
//! with an "unable to evaluate" reason and never blocks a transaction on
//! infrastructure trouble alone.

mod amount;
mod behavioral;
mod device;
mod geographic;
mod merchant;
mod velocity;

pub(crate) use geographic::haversine_km;

use sentra_core::{EvaluationContext, Rule, RuleKind, RuleResult};
use sentra_store::WindowStore;
use serde::de::DeserializeOwned;

/// Dispatch a rule to its family evaluator.
pub(crate) async fn evaluate_family(
    rule: &Rule,
    ctx: &EvaluationContext,
    store: &dyn WindowStore,
) -> RuleResult {
    match rule.kind {
        RuleKind::Velocity => velocity::evaluate(rule, ctx, store).await,
        RuleKind::Amount => amount::evaluate(rule, ctx),
        RuleKind::Geographic => geographic::evaluate(rule, ctx, store).await,
        RuleKind::Device => device::evaluate(rule, ctx, store).await,
        RuleKind::Merchant => merchant::evaluate(rule, ctx),
        RuleKind::Behavioral => behavioral::evaluate(rule, ctx),
        RuleKind::Ml => RuleResult::not_fired(rule, "Unknown rule kind"),
    }
}

/// Parse a family config out of the rule's JSON blob. Malformed configs fall
/// back to the family defaults rather than failing the rule.
pub(crate) fn parse_config<T: DeserializeOwned + Default>(rule: &Rule) -> T {
    match serde_json::from_value(rule.config.clone()) {
        Ok(config) => config,
        Err(e) => {
            tracing::warn!(
                rule = %rule.name,
                "falling back to default config: {}", e
            );
            T::default()
        }
    }
}
