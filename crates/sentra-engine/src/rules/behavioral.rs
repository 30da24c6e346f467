//! Behavioral rules: unusual hours, new accounts, dormant accounts.

use chrono::{Duration, Timelike, Utc};
use rust_decimal_macros::dec;
use sentra_core::{Decision, EvaluationContext, Rule, RuleResult};

pub(crate) fn evaluate(rule: &Rule, ctx: &EvaluationContext) -> RuleResult {
    let Some(profile) = &ctx.user_profile else {
        return RuleResult::not_fired(rule, "No user profile");
    };

    let hour = ctx.timestamp.hour();
    if (2..=5).contains(&hour) {
        return RuleResult::fired(
            rule,
            dec!(0.35),
            "Transaction at unusual hour (late night)",
            Decision::Challenge,
        )
        .with_metadata("hour", hour);
    }

    if profile.account_age < Duration::hours(24) {
        return RuleResult::fired(
            rule,
            dec!(0.50),
            "Transaction from very new account (< 24 hours)",
            Decision::Review,
        )
        .with_metadata("account_age_hours", profile.account_age.num_hours());
    }

    if profile.last_activity_at < Utc::now() - Duration::days(90) {
        return RuleResult::fired(
            rule,
            dec!(0.55),
            "Transaction from dormant account (inactive > 3 months)",
            Decision::Review,
        )
        .with_metadata("last_activity", profile.last_activity_at.to_rfc3339());
    }

    RuleResult::not_fired(rule, "Behavioral check passed")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone};
    use rust_decimal_macros::dec;
    use sentra_core::{RuleKind, Severity, UserProfile};
    use serde_json::json;
    use uuid::Uuid;

    fn rule() -> Rule {
        Rule::new(
            "odd_behavior",
            RuleKind::Behavioral,
            Severity::Low,
            Decision::Review,
            json!({"enabled": true}),
            Uuid::new_v4(),
        )
    }

    fn ctx_at(timestamp: DateTime<Utc>) -> EvaluationContext {
        let mut ctx = EvaluationContext::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            Uuid::new_v4(),
            dec!(100.00),
            "USD",
            timestamp,
        );
        ctx.user_profile = Some(UserProfile::default_for(ctx.user_id));
        ctx
    }

    fn at_hour(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 14, hour, 30, 0).unwrap()
    }

    #[test]
    fn no_profile_does_not_fire() {
        let mut ctx = ctx_at(at_hour(3));
        ctx.user_profile = None;
        assert!(!evaluate(&rule(), &ctx).fired);
    }

    #[test]
    fn late_night_hours_challenge() {
        for hour in 2..=5 {
            let result = evaluate(&rule(), &ctx_at(at_hour(hour)));
            assert!(result.fired, "hour {hour} should fire");
            assert_eq!(result.score, dec!(0.35));
            assert_eq!(result.action, Decision::Challenge);
        }
    }

    #[test]
    fn daytime_hours_pass() {
        for hour in [1, 6, 12, 23] {
            assert!(!evaluate(&rule(), &ctx_at(at_hour(hour))).fired, "hour {hour}");
        }
    }

    #[test]
    fn brand_new_account_fires_for_review() {
        let mut ctx = ctx_at(at_hour(12));
        let mut profile = UserProfile::default_for(ctx.user_id);
        profile.account_age = Duration::hours(3);
        ctx.user_profile = Some(profile);

        let result = evaluate(&rule(), &ctx);
        assert!(result.fired);
        assert_eq!(result.score, dec!(0.50));
        assert_eq!(result.action, Decision::Review);
    }

    #[test]
    fn dormant_account_fires_for_review() {
        let mut ctx = ctx_at(at_hour(12));
        let mut profile = UserProfile::default_for(ctx.user_id);
        profile.last_activity_at = Utc::now() - Duration::days(120);
        ctx.user_profile = Some(profile);

        let result = evaluate(&rule(), &ctx);
        assert!(result.fired);
        assert_eq!(result.score, dec!(0.55));
    }
}
