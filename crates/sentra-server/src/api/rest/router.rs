//! Router creation and configuration.

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use super::handlers::*;
use super::types::AppState;

/// Build the REST router over the shared application state.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/ready", get(ready))
        .route("/live", get(live))
        .route("/api/v1/fraud/analyze", post(analyze))
        .route("/api/v1/fraud/analyze/batch", post(analyze_batch))
        .route("/api/v1/fraud/decisions/:id", get(get_decision))
        .route(
            "/api/v1/fraud/transactions/:id/decision",
            get(get_decision_by_transaction),
        )
        .route("/api/v1/fraud/users/:id/risk", get(get_user_risk))
        .route("/api/v1/fraud/cases", get(list_cases))
        .route("/api/v1/fraud/cases/:id", get(get_case).put(update_case))
        .route("/api/v1/fraud/rules", get(list_rules).post(create_rule))
        .route("/api/v1/fraud/rules/:id", get(get_rule))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}
