//! The decision pipeline: from validated input to a persisted decision.
//!
//! Step order for one transaction:
//!
//! 1. attach the analysis deadline
//! 2. enrich concurrently from the window store (and the optional profile
//!    source); enrichment failure degrades to empty values
//! 3. fall back to a default user profile
//! 4. evaluate rules, then the optional model scorer
//! 5. aggregate into the final score and decision
//! 6. persist the decision (failure here fails the request)
//! 7. open/join a fraud case for high-risk block/review outcomes (failure
//!    here is logged only)
//! 8. detach the post-commit state recording with a fresh deadline
//!
//! The detached recording means a crash between persist and record loses at
//! most one velocity tick. That trade-off buys the latency budget.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use sentra_core::{
    aggregate, confidence, Decision, DecisionThresholds, EvaluationContext, FraudDecision,
    RiskLevel, ScoreWeights, ScoringStrategy, TransactionSummary, UserProfile,
};
use sentra_repository::DecisionRepository;
use sentra_store::{StoreResult, WindowStore};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

use crate::cases::CaseCoordinator;
use crate::engine::RuleEngine;
use crate::error::{EngineError, EngineResult};
use crate::ml::MlPredictor;

/// Optional secondary source for deeper user profiles. When absent, the
/// pipeline builds the default profile.
#[async_trait]
pub trait ProfileSource: Send + Sync {
    async fn user_profile(&self, user_id: Uuid) -> StoreResult<Option<UserProfile>>;
}

/// Pipeline tuning knobs, validated at service bootstrap.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Deadline for the whole analysis (enrichment through persist).
    pub analysis_timeout: std::time::Duration,
    /// Deadline for each detached state-recording call.
    pub record_timeout: std::time::Duration,
    pub thresholds: DecisionThresholds,
    pub weights: ScoreWeights,
    pub strategy: ScoringStrategy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            analysis_timeout: std::time::Duration::from_secs(5),
            record_timeout: std::time::Duration::from_secs(2),
            thresholds: DecisionThresholds::default(),
            weights: ScoreWeights::default(),
            strategy: ScoringStrategy::WeightedAverage,
        }
    }
}

/// Validated input for a single analysis.
#[derive(Debug, Clone)]
pub struct AnalyzeInput {
    pub transaction_id: Uuid,
    pub user_id: Uuid,
    pub account_id: Uuid,
    pub amount: Decimal,
    pub currency: String,
    pub timestamp: chrono::DateTime<Utc>,
    pub location: Option<sentra_core::GeoLocation>,
    pub device: Option<sentra_core::DeviceInfo>,
    pub merchant: Option<sentra_core::MerchantInfo>,
    pub payment: Option<sentra_core::PaymentMethod>,
}

/// What the caller gets back for one transaction.
#[derive(Debug, Clone, Serialize)]
pub struct AnalyzeOutput {
    pub decision: Decision,
    pub score: Decimal,
    pub risk_level: RiskLevel,
    pub confidence: Decimal,
    pub rules_fired: Vec<String>,
    pub reasons: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_version: Option<String>,
    pub latency_ms: i64,
    pub should_block: bool,
    pub requires_review: bool,
}

/// Batch analysis result.
#[derive(Debug, Clone, Serialize)]
pub struct BatchOutput {
    pub results: Vec<AnalyzeOutput>,
    pub summary: BatchSummary,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchSummary {
    pub total: usize,
    pub allowed: usize,
    pub blocked: usize,
    pub review: usize,
    pub challenge: usize,
    pub avg_latency_ms: i64,
}

/// Orchestrates a single fraud decision end to end.
pub struct DecisionPipeline {
    engine: Arc<RuleEngine>,
    predictor: Arc<MlPredictor>,
    store: Arc<dyn WindowStore>,
    decisions: Arc<dyn DecisionRepository>,
    cases: Arc<CaseCoordinator>,
    profiles: Option<Arc<dyn ProfileSource>>,
    config: PipelineConfig,
}

impl DecisionPipeline {
    pub fn new(
        engine: Arc<RuleEngine>,
        predictor: Arc<MlPredictor>,
        store: Arc<dyn WindowStore>,
        decisions: Arc<dyn DecisionRepository>,
        cases: Arc<CaseCoordinator>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            engine,
            predictor,
            store,
            decisions,
            cases,
            profiles: None,
            config,
        }
    }

    /// Attach a secondary profile source for enrichment.
    pub fn with_profile_source(mut self, profiles: Arc<dyn ProfileSource>) -> Self {
        self.profiles = Some(profiles);
        self
    }

    /// Analyze a transaction under the configured deadline. On expiry the
    /// request fails with [`EngineError::Timeout`] and no decision is
    /// emitted.
    pub async fn analyze(&self, input: AnalyzeInput) -> EngineResult<AnalyzeOutput> {
        let started = Instant::now();
        match tokio::time::timeout(
            self.config.analysis_timeout,
            self.analyze_inner(&input, started),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(
                    transaction_id = %input.transaction_id,
                    "analysis deadline of {:?} exceeded", self.config.analysis_timeout
                );
                Err(EngineError::Timeout(self.config.analysis_timeout))
            }
        }
    }

    async fn analyze_inner(
        &self,
        input: &AnalyzeInput,
        started: Instant,
    ) -> EngineResult<AnalyzeOutput> {
        if input.transaction_id.is_nil() || input.user_id.is_nil() {
            return Err(EngineError::MissingTransactionData);
        }

        let ctx = self.enrich(input).await;

        let mut results = self.engine.evaluate(&ctx).await?;

        let prediction = self.predictor.predict(&ctx);
        let model_version = if prediction.enabled {
            results.push(prediction.to_rule_result());
            Some(prediction.model_version.clone())
        } else {
            None
        };

        let breakdown = aggregate(&results, &self.config.weights, self.config.strategy);
        // Score maps to a decision through the thresholds; additionally, any
        // fired rule whose action is block short-circuits the outcome to
        // block. This is the single override path used everywhere — the
        // aggregator itself never inspects actions.
        let mut decision_kind = self.config.thresholds.decide(breakdown.final_score);
        if results
            .iter()
            .any(|r| r.fired && r.action == Decision::Block)
        {
            decision_kind = Decision::Block;
        }

        let mut decision = FraudDecision::new(
            input.transaction_id,
            input.user_id,
            decision_kind,
            breakdown.final_score,
        );
        decision.risk_level = breakdown.risk_level;
        decision.confidence = confidence(&results);
        decision.model_version = model_version;
        for result in results.iter().filter(|r| r.fired) {
            decision.add_fired_rule(result.rule_name.clone(), result.reason.clone());
        }
        decision.processed_at = Utc::now();
        decision.latency_ms = started.elapsed().as_millis() as i64;

        self.decisions.create(&decision).await?;

        if matches!(decision.decision, Decision::Block | Decision::Review)
            && matches!(decision.risk_level, RiskLevel::High | RiskLevel::Critical)
        {
            if let Err(e) = self
                .cases
                .open_or_append(
                    input.transaction_id,
                    input.user_id,
                    input.account_id,
                    decision.risk_level,
                )
                .await
            {
                // The decision is the authoritative output; a case failure
                // never fails the request.
                tracing::error!(
                    transaction_id = %input.transaction_id,
                    "case coordination failed: {}", e
                );
            }
        }

        self.spawn_state_recording(input);

        Ok(AnalyzeOutput {
            decision: decision.decision,
            score: decision.score,
            risk_level: decision.risk_level,
            confidence: decision.confidence,
            rules_fired: decision.rules_fired.clone(),
            reasons: decision.reasons.clone(),
            model_version: decision.model_version.clone(),
            latency_ms: started.elapsed().as_millis() as i64,
            should_block: decision.should_block(),
            requires_review: decision.requires_review(),
        })
    }

    /// Fan out enrichment reads. Failures leave the corresponding field
    /// empty; enrichment never fails the request.
    async fn enrich(&self, input: &AnalyzeInput) -> EvaluationContext {
        let mut ctx = EvaluationContext::new(
            input.transaction_id,
            input.user_id,
            input.account_id,
            input.amount,
            input.currency.clone(),
            input.timestamp,
        );
        ctx.location = input.location.clone();
        ctx.device = input.device.clone();
        ctx.merchant = input.merchant.clone();
        ctx.payment = input.payment.clone();

        let recent_fut = self.store.recent(input.user_id, Duration::hours(24));
        let profile_fut = async {
            match &self.profiles {
                Some(source) => source.user_profile(input.user_id).await,
                None => Ok(None),
            }
        };
        let (recent, profile) = tokio::join!(recent_fut, profile_fut);

        match recent {
            Ok(entries) => {
                // The window yields oldest-first; rules want newest-first.
                ctx.recent_transactions = entries
                    .into_iter()
                    .rev()
                    .map(|e| TransactionSummary {
                        id: e.transaction_id,
                        amount: e.amount,
                        timestamp: e.recorded_at,
                        location: None,
                    })
                    .collect();
            }
            Err(e) => {
                tracing::warn!(user_id = %input.user_id, "recent-transaction enrichment failed: {}", e);
            }
        }

        ctx.user_profile = match profile {
            Ok(Some(profile)) => Some(profile),
            Ok(None) => Some(UserProfile::default_for(input.user_id)),
            Err(e) => {
                tracing::warn!(user_id = %input.user_id, "profile enrichment failed: {}", e);
                Some(UserProfile::default_for(input.user_id))
            }
        };

        ctx
    }

    /// Record window-store state on a detached task with its own deadline.
    /// The request deadline does not apply here, and failures are log-only.
    fn spawn_state_recording(&self, input: &AnalyzeInput) {
        let store = Arc::clone(&self.store);
        let record_timeout = self.config.record_timeout;
        let input = input.clone();

        tokio::spawn(async move {
            match tokio::time::timeout(
                record_timeout,
                store.record_transaction(
                    input.user_id,
                    input.transaction_id,
                    input.amount,
                    input.timestamp,
                ),
            )
            .await
            {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    tracing::warn!(user_id = %input.user_id, "transaction recording failed: {}", e)
                }
                Err(_) => {
                    tracing::warn!(user_id = %input.user_id, "transaction recording timed out")
                }
            }

            if let Some(device) = &input.device {
                match tokio::time::timeout(
                    record_timeout,
                    store.record_device(input.user_id, &device.device_id),
                )
                .await
                {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => {
                        tracing::warn!(user_id = %input.user_id, "device recording failed: {}", e)
                    }
                    Err(_) => {
                        tracing::warn!(user_id = %input.user_id, "device recording timed out")
                    }
                }
            }

            if let Some(location) = &input.location {
                match tokio::time::timeout(
                    record_timeout,
                    store.record_location(input.user_id, &location.country, &location.city),
                )
                .await
                {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => {
                        tracing::warn!(user_id = %input.user_id, "location recording failed: {}", e)
                    }
                    Err(_) => {
                        tracing::warn!(user_id = %input.user_id, "location recording timed out")
                    }
                }
            }
        });
    }

    /// Analyze up to a batch of transactions sequentially. A failed item
    /// degrades to a review/high placeholder instead of failing the batch.
    pub async fn analyze_batch(&self, inputs: Vec<AnalyzeInput>) -> BatchOutput {
        let mut results = Vec::with_capacity(inputs.len());
        let mut summary = BatchSummary {
            total: inputs.len(),
            ..BatchSummary::default()
        };
        let mut total_latency = 0i64;

        for input in inputs {
            let transaction_id = input.transaction_id;
            match self.analyze(input).await {
                Ok(output) => {
                    total_latency += output.latency_ms;
                    match output.decision {
                        Decision::Allow => summary.allowed += 1,
                        Decision::Block => summary.blocked += 1,
                        Decision::Review => summary.review += 1,
                        Decision::Challenge => summary.challenge += 1,
                    }
                    results.push(output);
                }
                Err(e) => {
                    tracing::error!(%transaction_id, "batch item failed: {}", e);
                    summary.review += 1;
                    results.push(AnalyzeOutput {
                        decision: Decision::Review,
                        score: Decimal::ZERO,
                        risk_level: RiskLevel::High,
                        confidence: Decimal::ZERO,
                        rules_fired: Vec::new(),
                        reasons: vec![format!("Analysis error: {e}")],
                        model_version: None,
                        latency_ms: 0,
                        should_block: false,
                        requires_review: true,
                    });
                }
            }
        }

        if summary.total > 0 {
            summary.avg_latency_ms = total_latency / summary.total as i64;
        }

        BatchOutput { results, summary }
    }
}
