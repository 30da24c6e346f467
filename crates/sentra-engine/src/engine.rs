//! The rule engine: cached active-rule loading and evaluation.

use chrono::Utc;
use sentra_core::{EvaluationContext, Rule, RuleResult};
use sentra_repository::RuleRepository;
use sentra_store::WindowStore;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::EngineResult;
use crate::rules::evaluate_family;

/// Default lifetime of the in-process active-rule snapshot.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(5 * 60);

struct RuleCache {
    rules: Option<Arc<Vec<Rule>>>,
    refreshed_at: Instant,
}

impl RuleCache {
    fn fresh(&self, ttl: Duration) -> Option<Arc<Vec<Rule>>> {
        let rules = self.rules.as_ref()?;
        if self.refreshed_at.elapsed() < ttl {
            Some(Arc::clone(rules))
        } else {
            None
        }
    }
}

/// Evaluates active rules against enrichment contexts.
///
/// Active rules are cached in-process behind a readers-writer lock with a
/// TTL refresh. Reads take a shared hold; on expiry an exclusive hold is
/// acquired and the expiry re-checked before hitting the repository
/// (double-checked refresh). Every mutation through the admin surface
/// invalidates the snapshot unconditionally, so the very next evaluation
/// observes the change.
pub struct RuleEngine {
    rule_repo: Arc<dyn RuleRepository>,
    store: Arc<dyn WindowStore>,
    cache: RwLock<RuleCache>,
    cache_ttl: Duration,
}

impl RuleEngine {
    pub fn new(rule_repo: Arc<dyn RuleRepository>, store: Arc<dyn WindowStore>) -> Self {
        Self::with_cache_ttl(rule_repo, store, DEFAULT_CACHE_TTL)
    }

    pub fn with_cache_ttl(
        rule_repo: Arc<dyn RuleRepository>,
        store: Arc<dyn WindowStore>,
        cache_ttl: Duration,
    ) -> Self {
        Self {
            rule_repo,
            store,
            cache: RwLock::new(RuleCache {
                rules: None,
                refreshed_at: Instant::now(),
            }),
            cache_ttl,
        }
    }

    /// The current active-rule snapshot, refreshed from the repository when
    /// the cached copy has expired.
    pub async fn active_rules(&self) -> EngineResult<Arc<Vec<Rule>>> {
        {
            let cache = self.cache.read().await;
            if let Some(rules) = cache.fresh(self.cache_ttl) {
                return Ok(rules);
            }
        }

        let mut cache = self.cache.write().await;
        // Another task may have refreshed while we waited for the write hold.
        if let Some(rules) = cache.fresh(self.cache_ttl) {
            return Ok(rules);
        }

        let rules = Arc::new(self.rule_repo.list_active(Utc::now()).await?);
        tracing::debug!("refreshed rule cache: {} active rules", rules.len());
        cache.rules = Some(Arc::clone(&rules));
        cache.refreshed_at = Instant::now();
        Ok(rules)
    }

    /// Evaluate every active rule against the context, in the snapshot's
    /// enumeration order. A failure inside one rule never prevents the
    /// evaluation of the others.
    pub async fn evaluate(&self, ctx: &EvaluationContext) -> EngineResult<Vec<RuleResult>> {
        let rules = self.active_rules().await?;
        let mut results = Vec::with_capacity(rules.len());
        for rule in rules.iter() {
            results.push(self.evaluate_rule(rule, ctx).await);
        }
        Ok(results)
    }

    /// Evaluate a single rule. Inactive rules report a non-fired result.
    pub async fn evaluate_rule(&self, rule: &Rule, ctx: &EvaluationContext) -> RuleResult {
        if !rule.is_active(Utc::now()) {
            return RuleResult::not_fired(rule, "Rule not active");
        }
        evaluate_family(rule, ctx, self.store.as_ref()).await
    }

    /// Persist a new rule and drop the snapshot.
    pub async fn add_rule(&self, rule: &Rule) -> EngineResult<()> {
        rule.validate()?;
        self.rule_repo.create(rule).await?;
        self.invalidate_cache().await;
        Ok(())
    }

    /// Persist changes to a rule (the repository bumps its version) and drop
    /// the snapshot.
    pub async fn update_rule(&self, rule: &Rule) -> EngineResult<()> {
        rule.validate()?;
        self.rule_repo.update(rule).await?;
        self.invalidate_cache().await;
        Ok(())
    }

    pub async fn disable_rule(&self, rule_id: Uuid) -> EngineResult<()> {
        self.rule_repo.disable(rule_id).await?;
        self.invalidate_cache().await;
        Ok(())
    }

    pub async fn enable_rule(&self, rule_id: Uuid) -> EngineResult<()> {
        let mut rule = self.rule_repo.get_by_id(rule_id).await?;
        rule.enable();
        self.rule_repo.update(&rule).await?;
        self.invalidate_cache().await;
        Ok(())
    }

    pub async fn get_rule(&self, rule_id: Uuid) -> EngineResult<Rule> {
        Ok(self.rule_repo.get_by_id(rule_id).await?)
    }

    async fn invalidate_cache(&self) {
        let mut cache = self.cache.write().await;
        cache.rules = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use sentra_core::{Decision, RuleKind, Severity};
    use sentra_repository::MemoryRuleRepository;
    use sentra_store::MemoryWindowStore;
    use serde_json::json;

    fn velocity_rule(name: &str, max: i64) -> Rule {
        Rule::new(
            name,
            RuleKind::Velocity,
            Severity::High,
            Decision::Block,
            json!({"max_transactions": max, "window_minutes": 5}),
            Uuid::new_v4(),
        )
    }

    fn engine_with(repo: MemoryRuleRepository) -> RuleEngine {
        RuleEngine::new(Arc::new(repo), Arc::new(MemoryWindowStore::new()))
    }

    fn ctx() -> EvaluationContext {
        EvaluationContext::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            Uuid::new_v4(),
            dec!(10.00),
            "USD",
            Utc::now(),
        )
    }

    #[tokio::test]
    async fn empty_rule_set_evaluates_to_no_results() {
        let engine = engine_with(MemoryRuleRepository::new());
        let results = engine.evaluate(&ctx()).await.unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn add_rule_is_visible_to_the_next_evaluation() {
        let repo = MemoryRuleRepository::new();
        let engine = engine_with(repo);

        // Warm the cache with an empty snapshot.
        assert!(engine.evaluate(&ctx()).await.unwrap().is_empty());

        engine.add_rule(&velocity_rule("fresh", 5)).await.unwrap();
        let results = engine.evaluate(&ctx()).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].rule_name, "fresh");
    }

    #[tokio::test]
    async fn disable_rule_is_visible_to_the_next_evaluation() {
        let engine = engine_with(MemoryRuleRepository::new());
        let rule = velocity_rule("short_lived", 5);
        engine.add_rule(&rule).await.unwrap();
        assert_eq!(engine.evaluate(&ctx()).await.unwrap().len(), 1);

        engine.disable_rule(rule.id).await.unwrap();
        assert!(engine.evaluate(&ctx()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn enable_rule_restores_evaluation() {
        let engine = engine_with(MemoryRuleRepository::new());
        let rule = velocity_rule("toggled", 5);
        engine.add_rule(&rule).await.unwrap();
        engine.disable_rule(rule.id).await.unwrap();
        assert!(engine.evaluate(&ctx()).await.unwrap().is_empty());

        engine.enable_rule(rule.id).await.unwrap();
        assert_eq!(engine.evaluate(&ctx()).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn snapshot_is_reused_within_the_ttl() {
        let repo = MemoryRuleRepository::new();
        let engine = RuleEngine::new(
            Arc::new(repo.clone()),
            Arc::new(MemoryWindowStore::new()),
        );
        engine.add_rule(&velocity_rule("cached", 5)).await.unwrap();
        assert_eq!(engine.evaluate(&ctx()).await.unwrap().len(), 1);

        // Mutating the repository behind the engine's back is not observed
        // until the TTL expires or the admin surface invalidates.
        repo.insert(velocity_rule("backdoor", 5)).await;
        assert_eq!(engine.evaluate(&ctx()).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn expired_snapshot_is_refreshed() {
        let repo = MemoryRuleRepository::new();
        let engine = RuleEngine::with_cache_ttl(
            Arc::new(repo.clone()),
            Arc::new(MemoryWindowStore::new()),
            Duration::from_millis(0),
        );
        assert!(engine.evaluate(&ctx()).await.unwrap().is_empty());

        repo.insert(velocity_rule("late", 5)).await;
        assert_eq!(engine.evaluate(&ctx()).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn add_rule_rejects_invalid_config() {
        let engine = engine_with(MemoryRuleRepository::new());
        let mut rule = velocity_rule("bad", 5);
        rule.config = json!({});
        assert!(engine.add_rule(&rule).await.is_err());
    }

    #[tokio::test]
    async fn an_unevaluable_rule_does_not_stop_the_rest() {
        // A rule of a kind the dispatcher cannot evaluate (seeded past
        // validation) degrades to a non-fired result; other rules still run.
        let mut odd = velocity_rule("odd", 5);
        odd.kind = RuleKind::Ml;
        let repo = MemoryRuleRepository::new();
        repo.insert(odd).await;
        repo.insert(velocity_rule("good", 5)).await;

        let engine = RuleEngine::new(Arc::new(repo), Arc::new(MemoryWindowStore::new()));
        let results = engine.evaluate(&ctx()).await.unwrap();
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| !r.fired));
        assert!(results.iter().any(|r| r.rule_name == "good"));
    }
}
