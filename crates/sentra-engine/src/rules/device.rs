//! Device rules: trusted/known device checks and per-user device limits.

use rust_decimal_macros::dec;
use sentra_core::{Decision, EvaluationContext, Rule, RuleResult};
use sentra_store::WindowStore;
use serde::Deserialize;

use super::parse_config;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct DeviceConfig {
    pub require_trusted_device: bool,
    pub max_devices_per_user: i64,
    pub block_new_devices: bool,
}

pub(crate) async fn evaluate(
    rule: &Rule,
    ctx: &EvaluationContext,
    store: &dyn WindowStore,
) -> RuleResult {
    let Some(device) = &ctx.device else {
        return RuleResult::not_fired(rule, "No device data");
    };

    let config: DeviceConfig = parse_config(rule);

    if config.require_trusted_device && !device.is_trusted_device {
        match store.is_known_device(ctx.user_id, &device.device_id).await {
            Ok(false) => {
                if config.block_new_devices {
                    return RuleResult::fired(
                        rule,
                        dec!(0.80),
                        "Transaction from untrusted, unknown device",
                        Decision::Block,
                    )
                    .with_metadata("device_id", device.device_id.clone());
                }
                return RuleResult::fired(
                    rule,
                    dec!(0.55),
                    "Transaction from new device",
                    Decision::Challenge,
                )
                .with_metadata("device_id", device.device_id.clone());
            }
            Ok(true) => {}
            Err(e) => {
                tracing::warn!(rule = %rule.name, user_id = %ctx.user_id, "device check unavailable: {}", e);
            }
        }
    }

    if config.max_devices_per_user > 0 {
        if let Ok(device_count) = store.device_count(ctx.user_id).await {
            if device_count >= config.max_devices_per_user {
                let known = store
                    .is_known_device(ctx.user_id, &device.device_id)
                    .await
                    .unwrap_or(false);
                if !known {
                    let reason = format!(
                        "User has {} devices (limit: {}) and this is a new device",
                        device_count, config.max_devices_per_user
                    );
                    return RuleResult::fired(rule, dec!(0.60), reason, rule.action)
                        .with_metadata("device_count", device_count)
                        .with_metadata("max_devices", config.max_devices_per_user);
                }
            }
        }
    }

    RuleResult::not_fired(rule, "Device check passed")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal_macros::dec;
    use sentra_core::{DeviceInfo, RuleKind, Severity};
    use sentra_store::MemoryWindowStore;
    use serde_json::json;
    use uuid::Uuid;

    fn rule(config: serde_json::Value) -> Rule {
        Rule::new(
            "new_device",
            RuleKind::Device,
            Severity::Medium,
            Decision::Review,
            config,
            Uuid::new_v4(),
        )
    }

    fn ctx_with_device(device_id: &str, trusted: bool) -> EvaluationContext {
        let mut ctx = EvaluationContext::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            Uuid::new_v4(),
            dec!(100.00),
            "USD",
            Utc::now(),
        );
        ctx.device = Some(DeviceInfo {
            device_id: device_id.into(),
            device_type: "mobile".into(),
            os: "iOS".into(),
            browser: None,
            user_agent: None,
            is_trusted_device: trusted,
        });
        ctx
    }

    #[tokio::test]
    async fn no_device_data_does_not_fire() {
        let store = MemoryWindowStore::new();
        let rule = rule(json!({"require_trusted_device": true}));
        let ctx = EvaluationContext::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            Uuid::new_v4(),
            dec!(100.00),
            "USD",
            Utc::now(),
        );
        assert!(!evaluate(&rule, &ctx, &store).await.fired);
    }

    #[tokio::test]
    async fn unknown_untrusted_device_challenges() {
        let store = MemoryWindowStore::new();
        let rule = rule(json!({"require_trusted_device": true, "block_new_devices": false}));
        let ctx = ctx_with_device("dev-unknown", false);

        let result = evaluate(&rule, &ctx, &store).await;
        assert!(result.fired);
        assert_eq!(result.score, dec!(0.55));
        assert_eq!(result.action, Decision::Challenge);
    }

    #[tokio::test]
    async fn unknown_untrusted_device_blocks_when_configured() {
        let store = MemoryWindowStore::new();
        let rule = rule(json!({"require_trusted_device": true, "block_new_devices": true}));
        let ctx = ctx_with_device("dev-unknown", false);

        let result = evaluate(&rule, &ctx, &store).await;
        assert!(result.fired);
        assert_eq!(result.score, dec!(0.80));
        assert_eq!(result.action, Decision::Block);
    }

    #[tokio::test]
    async fn trusted_device_skips_the_known_check() {
        let store = MemoryWindowStore::new();
        let rule = rule(json!({"require_trusted_device": true}));
        let ctx = ctx_with_device("dev-1", true);

        assert!(!evaluate(&rule, &ctx, &store).await.fired);
    }

    #[tokio::test]
    async fn known_device_passes() {
        let store = MemoryWindowStore::new();
        let rule = rule(json!({"require_trusted_device": true}));
        let ctx = ctx_with_device("dev-1", false);
        store.record_device(ctx.user_id, "dev-1").await.unwrap();

        assert!(!evaluate(&rule, &ctx, &store).await.fired);
    }

    #[tokio::test]
    async fn device_limit_fires_for_a_new_device_over_the_cap() {
        let store = MemoryWindowStore::new();
        let rule = rule(json!({"max_devices_per_user": 2}));
        let ctx = ctx_with_device("dev-3", false);
        store.record_device(ctx.user_id, "dev-1").await.unwrap();
        store.record_device(ctx.user_id, "dev-2").await.unwrap();

        let result = evaluate(&rule, &ctx, &store).await;
        assert!(result.fired);
        assert_eq!(result.score, dec!(0.60));
        assert_eq!(result.action, Decision::Review);
        assert_eq!(result.metadata["device_count"], json!(2));
    }

    #[tokio::test]
    async fn device_limit_ignores_an_already_known_device() {
        let store = MemoryWindowStore::new();
        let rule = rule(json!({"max_devices_per_user": 2}));
        let ctx = ctx_with_device("dev-2", false);
        store.record_device(ctx.user_id, "dev-1").await.unwrap();
        store.record_device(ctx.user_id, "dev-2").await.unwrap();

        assert!(!evaluate(&rule, &ctx, &store).await.fired);
    }
}
