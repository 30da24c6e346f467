//! Integration tests for the REST endpoints, exercised over in-memory
//! backends with `tower::ServiceExt::oneshot`.

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use rust_decimal_macros::dec;
use sentra_core::ScoringStrategy;
use sentra_engine::{
    CaseCoordinator, DecisionPipeline, FeatureExtractor, MlPredictor, PipelineConfig, RuleEngine,
};
use sentra_repository::{MemoryCaseRepository, MemoryDecisionRepository, MemoryRuleRepository};
use sentra_server::api::{create_router, AppState};
use sentra_store::MemoryWindowStore;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;
use uuid::Uuid;

fn test_router() -> Router {
    let store = Arc::new(MemoryWindowStore::new());
    let rules = Arc::new(MemoryRuleRepository::new());
    let decisions = Arc::new(MemoryDecisionRepository::new());
    let cases = Arc::new(MemoryCaseRepository::new());

    let engine = Arc::new(RuleEngine::new(rules, store.clone()));
    let predictor = Arc::new(MlPredictor::new(
        FeatureExtractor::new(dec!(1000), vec![]),
        "v1.0.0",
        false,
    ));
    let coordinator = Arc::new(CaseCoordinator::new(cases, decisions.clone()));
    let pipeline = Arc::new(DecisionPipeline::new(
        engine.clone(),
        predictor,
        store.clone(),
        decisions.clone(),
        coordinator.clone(),
        PipelineConfig {
            strategy: ScoringStrategy::Max,
            ..PipelineConfig::default()
        },
    ));

    create_router(AppState {
        pipeline,
        engine,
        coordinator,
        decisions,
        store,
        db: None,
    })
}

async fn request(router: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(value) => builder
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(&value).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

fn analyze_payload() -> Value {
    json!({
        "transaction_id": Uuid::new_v4().to_string(),
        "user_id": Uuid::new_v4().to_string(),
        "account_id": Uuid::new_v4().to_string(),
        "amount": "100.00",
        "currency": "USD",
    })
}

fn blocked_country_rule() -> Value {
    json!({
        "name": "blocked_countries",
        "type": "geographic",
        "severity": "critical",
        "action": "review",
        "config": {"blocked_countries": ["KP"]},
    })
}

#[tokio::test]
async fn health_endpoints_answer() {
    let router = test_router();

    let (status, body) = request(&router, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");

    let (status, body) = request(&router, "GET", "/live", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "alive");

    let (status, body) = request(&router, "GET", "/ready", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ready");
    assert_eq!(body["services"]["window_store"], "healthy");
}

#[tokio::test]
async fn analyze_returns_an_allow_decision_for_a_clean_transaction() {
    let router = test_router();

    let (status, body) =
        request(&router, "POST", "/api/v1/fraud/analyze", Some(analyze_payload())).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["decision"], "allow");
    assert_eq!(body["risk_level"], "low");
    assert_eq!(body["should_block"], false);
    assert_eq!(body["requires_review"], false);
    assert!(body["rules_fired"].as_array().unwrap().is_empty());
    assert!(body["latency_ms"].is_number());
}

#[tokio::test]
async fn analyze_rejects_malformed_fields() {
    let router = test_router();

    let mut payload = analyze_payload();
    payload["user_id"] = json!("not-a-uuid");
    let (status, body) = request(&router, "POST", "/api/v1/fraud/analyze", Some(payload)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "invalid_request");

    let mut payload = analyze_payload();
    payload["amount"] = json!("lots");
    let (status, _) = request(&router, "POST", "/api/v1/fraud/analyze", Some(payload)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let mut payload = analyze_payload();
    payload["currency"] = json!("US");
    let (status, _) = request(&router, "POST", "/api/v1/fraud/analyze", Some(payload)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn blocked_country_flows_through_to_a_block() {
    let router = test_router();

    let (status, _) =
        request(&router, "POST", "/api/v1/fraud/rules", Some(blocked_country_rule())).await;
    assert_eq!(status, StatusCode::CREATED);

    let mut payload = analyze_payload();
    payload["location"] = json!({
        "latitude": 39.03,
        "longitude": 125.75,
        "country": "KP",
        "city": "Pyongyang",
    });
    let (status, body) = request(&router, "POST", "/api/v1/fraud/analyze", Some(payload)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["decision"], "block");
    assert_eq!(body["risk_level"], "critical");
    assert_eq!(body["should_block"], true);
    assert!(body["rules_fired"]
        .as_array()
        .unwrap()
        .contains(&json!("blocked_countries")));
}

#[tokio::test]
async fn decision_is_retrievable_by_id_and_transaction() {
    let router = test_router();

    let payload = analyze_payload();
    let transaction_id = payload["transaction_id"].as_str().unwrap().to_string();
    let (status, _) = request(&router, "POST", "/api/v1/fraud/analyze", Some(payload)).await;
    assert_eq!(status, StatusCode::OK);

    let (status, decision) = request(
        &router,
        "GET",
        &format!("/api/v1/fraud/transactions/{transaction_id}/decision"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(decision["transaction_id"], transaction_id);

    let decision_id = decision["id"].as_str().unwrap();
    let (status, by_id) = request(
        &router,
        "GET",
        &format!("/api/v1/fraud/decisions/{decision_id}"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(by_id["id"], decision["id"]);
}

#[tokio::test]
async fn missing_decision_is_a_structured_404() {
    let router = test_router();
    let (status, body) = request(
        &router,
        "GET",
        &format!("/api/v1/fraud/decisions/{}", Uuid::new_v4()),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "not_found");
}

#[tokio::test]
async fn batch_analyze_summarizes_outcomes() {
    let router = test_router();
    let (status, _) =
        request(&router, "POST", "/api/v1/fraud/rules", Some(blocked_country_rule())).await;
    assert_eq!(status, StatusCode::CREATED);

    let mut blocked = analyze_payload();
    blocked["location"] = json!({
        "latitude": 39.03,
        "longitude": 125.75,
        "country": "KP",
        "city": "Pyongyang",
    });
    let payload = json!({"transactions": [blocked, analyze_payload()]});

    let (status, body) =
        request(&router, "POST", "/api/v1/fraud/analyze/batch", Some(payload)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["summary"]["total"], 2);
    assert_eq!(body["summary"]["blocked"], 1);
    assert_eq!(body["summary"]["allowed"], 1);
    assert_eq!(body["results"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn batch_limits_are_enforced() {
    let router = test_router();

    let (status, _) = request(
        &router,
        "POST",
        "/api/v1/fraud/analyze/batch",
        Some(json!({"transactions": []})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let oversized: Vec<Value> = (0..101).map(|_| analyze_payload()).collect();
    let (status, body) = request(
        &router,
        "POST",
        "/api/v1/fraud/analyze/batch",
        Some(json!({"transactions": oversized})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "invalid_request");
}

#[tokio::test]
async fn rule_crud_round_trips() {
    let router = test_router();

    let (status, created) =
        request(&router, "POST", "/api/v1/fraud/rules", Some(blocked_country_rule())).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["name"], "blocked_countries");
    assert_eq!(created["version"], 1);

    let rule_id = created["id"].as_str().unwrap();
    let (status, fetched) = request(
        &router,
        "GET",
        &format!("/api/v1/fraud/rules/{rule_id}"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["config"], created["config"]);

    let (status, listed) = request(&router, "GET", "/api/v1/fraud/rules", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed.as_array().unwrap().len(), 1);

    // Names are unique.
    let (status, body) =
        request(&router, "POST", "/api/v1/fraud/rules", Some(blocked_country_rule())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "invalid_request");
}

#[tokio::test]
async fn rule_creation_rejects_unknown_kind() {
    let router = test_router();
    let mut payload = blocked_country_rule();
    payload["type"] = json!("horoscope");
    let (status, _) = request(&router, "POST", "/api/v1/fraud/rules", Some(payload)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn case_investigation_flow_over_http() {
    let router = test_router();
    let (status, _) =
        request(&router, "POST", "/api/v1/fraud/rules", Some(blocked_country_rule())).await;
    assert_eq!(status, StatusCode::CREATED);

    // A blocked transaction opens a case.
    let mut payload = analyze_payload();
    payload["location"] = json!({
        "latitude": 39.03,
        "longitude": 125.75,
        "country": "KP",
        "city": "Pyongyang",
    });
    let (status, _) = request(&router, "POST", "/api/v1/fraud/analyze", Some(payload)).await;
    assert_eq!(status, StatusCode::OK);

    let (status, cases) = request(&router, "GET", "/api/v1/fraud/cases", None).await;
    assert_eq!(status, StatusCode::OK);
    let cases = cases.as_array().unwrap();
    assert_eq!(cases.len(), 1);
    let case_id = cases[0]["id"].as_str().unwrap().to_string();

    // Close before resolve is rejected.
    let (status, body) = request(
        &router,
        "PUT",
        &format!("/api/v1/fraud/cases/{case_id}"),
        Some(json!({"action": "close"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "invalid_request");

    // Assign → resolve → close.
    let (status, body) = request(
        &router,
        "PUT",
        &format!("/api/v1/fraud/cases/{case_id}"),
        Some(json!({"action": "assign", "assignee_id": Uuid::new_v4().to_string()})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "investigating");

    let (status, body) = request(
        &router,
        "PUT",
        &format!("/api/v1/fraud/cases/{case_id}"),
        Some(json!({
            "action": "resolve",
            "resolver_id": Uuid::new_v4().to_string(),
            "resolution": "confirmed fraud",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "resolved");

    let (status, body) = request(
        &router,
        "PUT",
        &format!("/api/v1/fraud/cases/{case_id}"),
        Some(json!({"action": "close"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "closed");

    // The closed case no longer shows in the default (open) listing.
    let (status, cases) = request(&router, "GET", "/api/v1/fraud/cases", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(cases.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn user_risk_profile_reflects_history() {
    let router = test_router();
    let (status, _) =
        request(&router, "POST", "/api/v1/fraud/rules", Some(blocked_country_rule())).await;
    assert_eq!(status, StatusCode::CREATED);

    let user_id = Uuid::new_v4().to_string();
    let mut payload = analyze_payload();
    payload["user_id"] = json!(user_id);
    payload["location"] = json!({
        "latitude": 39.03,
        "longitude": 125.75,
        "country": "KP",
        "city": "Pyongyang",
    });
    let (status, _) = request(&router, "POST", "/api/v1/fraud/analyze", Some(payload)).await;
    assert_eq!(status, StatusCode::OK);

    let (status, profile) = request(
        &router,
        "GET",
        &format!("/api/v1/fraud/users/{user_id}/risk"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(profile["user_id"], user_id);
    assert_eq!(profile["blocked_count"], 1);
    assert_eq!(profile["open_cases_count"], 1);
    assert_eq!(profile["recent_decisions"], 1);
}

#[tokio::test]
async fn unknown_case_status_is_rejected() {
    let router = test_router();
    let (status, body) =
        request(&router, "GET", "/api/v1/fraud/cases?status=pending", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "invalid_request");
}
