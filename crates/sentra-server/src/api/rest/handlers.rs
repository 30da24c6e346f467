//! HTTP request handlers for the fraud endpoints.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use sentra_core::{FraudCase, FraudDecision, Rule};
use sentra_engine::{AnalyzeOutput, BatchOutput, UserRiskProfile};
use sentra_repository::DecisionRepository;
use sentra_store::WindowStore;
use std::collections::HashMap;
use tracing::info;

use super::extractors::JsonExtractor;
use super::types::*;
use crate::error::ApiError;

/// `GET /health`
pub(super) async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: Utc::now().to_rfc3339(),
        services: None,
    })
}

/// `GET /live`
pub(super) async fn live() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "alive"}))
}

/// `GET /ready` — pings the database and the window store; 503 unless all
/// backends answer.
pub(super) async fn ready(State(state): State<AppState>) -> Response {
    let mut services = HashMap::new();
    let mut all_healthy = true;

    if let Some(pool) = &state.db {
        match sqlx::query("SELECT 1").execute(pool).await {
            Ok(_) => {
                services.insert("database".to_string(), "healthy".to_string());
            }
            Err(e) => {
                services.insert("database".to_string(), format!("unhealthy: {e}"));
                all_healthy = false;
            }
        }
    }

    match state.store.ping().await {
        Ok(()) => {
            services.insert("window_store".to_string(), "healthy".to_string());
        }
        Err(e) => {
            services.insert("window_store".to_string(), format!("unhealthy: {e}"));
            all_healthy = false;
        }
    }

    let (status, code) = if all_healthy {
        ("ready", StatusCode::OK)
    } else {
        ("not ready", StatusCode::SERVICE_UNAVAILABLE)
    };

    let body = Json(HealthResponse {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: Utc::now().to_rfc3339(),
        services: Some(services),
    });
    (code, body).into_response()
}

/// `POST /api/v1/fraud/analyze`
pub(super) async fn analyze(
    State(state): State<AppState>,
    JsonExtractor(request): JsonExtractor<AnalyzeRequest>,
) -> Result<Json<AnalyzeOutput>, ApiError> {
    let input = request.into_input()?;
    info!(transaction_id = %input.transaction_id, "analyze request");

    let output = state.pipeline.analyze(input).await?;
    Ok(Json(output))
}

/// `POST /api/v1/fraud/analyze/batch`
pub(super) async fn analyze_batch(
    State(state): State<AppState>,
    JsonExtractor(request): JsonExtractor<BatchAnalyzeRequest>,
) -> Result<Json<BatchOutput>, ApiError> {
    if request.transactions.is_empty() {
        return Err(ApiError::InvalidRequest(
            "no transactions provided".to_string(),
        ));
    }
    if request.transactions.len() > 100 {
        return Err(ApiError::InvalidRequest(
            "maximum 100 transactions per batch".to_string(),
        ));
    }

    let mut inputs = Vec::with_capacity(request.transactions.len());
    for transaction in request.transactions {
        inputs.push(transaction.into_input()?);
    }

    info!("batch analyze request: {} transactions", inputs.len());
    Ok(Json(state.pipeline.analyze_batch(inputs).await))
}

/// `GET /api/v1/fraud/decisions/{id}`
pub(super) async fn get_decision(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<FraudDecision>, ApiError> {
    let id = parse_path_uuid(&id, "decision id")?;
    Ok(Json(state.decisions.get_by_id(id).await?))
}

/// `GET /api/v1/fraud/transactions/{id}/decision`
pub(super) async fn get_decision_by_transaction(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<FraudDecision>, ApiError> {
    let id = parse_path_uuid(&id, "transaction id")?;
    Ok(Json(state.decisions.get_by_transaction_id(id).await?))
}

/// `GET /api/v1/fraud/users/{id}/risk`
pub(super) async fn get_user_risk(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<UserRiskProfile>, ApiError> {
    let user_id = parse_path_uuid(&id, "user id")?;
    Ok(Json(state.coordinator.user_risk_profile(user_id).await?))
}

/// `GET /api/v1/fraud/cases?status=open`
pub(super) async fn list_cases(
    State(state): State<AppState>,
    Query(query): Query<ListCasesQuery>,
) -> Result<Json<Vec<FraudCase>>, ApiError> {
    let status = query.status()?;
    let cases = state
        .coordinator
        .list_by_status(status, query.limit, query.offset)
        .await?;
    Ok(Json(cases))
}

/// `GET /api/v1/fraud/cases/{id}`
pub(super) async fn get_case(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<FraudCase>, ApiError> {
    let id = parse_path_uuid(&id, "case id")?;
    Ok(Json(state.coordinator.get(id).await?))
}

/// `PUT /api/v1/fraud/cases/{id}` — investigation actions.
pub(super) async fn update_case(
    State(state): State<AppState>,
    Path(id): Path<String>,
    JsonExtractor(action): JsonExtractor<CaseActionRequest>,
) -> Result<Json<FraudCase>, ApiError> {
    let id = parse_path_uuid(&id, "case id")?;

    let case = match action {
        CaseActionRequest::Assign { assignee_id } => {
            let assignee = parse_path_uuid(&assignee_id, "assignee_id")?;
            state.coordinator.assign(id, assignee).await?
        }
        CaseActionRequest::AddNote { author_id, content } => {
            let author = parse_path_uuid(&author_id, "author_id")?;
            state.coordinator.add_note(id, author, content).await?
        }
        CaseActionRequest::AddEvidence {
            kind,
            description,
            url,
            metadata,
        } => {
            state
                .coordinator
                .add_evidence(id, kind, description, url, metadata)
                .await?
        }
        CaseActionRequest::Resolve {
            resolver_id,
            resolution,
        } => {
            let resolver = parse_path_uuid(&resolver_id, "resolver_id")?;
            state.coordinator.resolve(id, resolver, resolution).await?
        }
        CaseActionRequest::Close => state.coordinator.close(id).await?,
        CaseActionRequest::Escalate { reason } => state.coordinator.escalate(id, reason).await?,
    };

    Ok(Json(case))
}

/// `GET /api/v1/fraud/rules` — active rules.
pub(super) async fn list_rules(
    State(state): State<AppState>,
) -> Result<Json<Vec<Rule>>, ApiError> {
    let rules = state.engine.active_rules().await?;
    Ok(Json(rules.as_ref().clone()))
}

/// `POST /api/v1/fraud/rules`
pub(super) async fn create_rule(
    State(state): State<AppState>,
    JsonExtractor(request): JsonExtractor<CreateRuleRequest>,
) -> Result<(StatusCode, Json<Rule>), ApiError> {
    let rule = request.into_rule()?;
    state.engine.add_rule(&rule).await?;
    info!(rule = %rule.name, "rule created");
    Ok((StatusCode::CREATED, Json(rule)))
}

/// `GET /api/v1/fraud/rules/{id}`
pub(super) async fn get_rule(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Rule>, ApiError> {
    let id = parse_path_uuid(&id, "rule id")?;
    Ok(Json(state.engine.get_rule(id).await?))
}
