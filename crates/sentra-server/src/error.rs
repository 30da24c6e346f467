//! API error taxonomy and response mapping.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use sentra_engine::EngineError;
use sentra_repository::RepositoryError;
use serde_json::json;
use thiserror::Error;

/// Errors surfaced at the API boundary.
///
/// Maps one-to-one onto the wire taxonomy: `invalid_request` (400),
/// `not_found` (404), `timeout` (504), `internal` (500).
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("analysis timed out: {0}")]
    Timeout(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    fn code(&self) -> &'static str {
        match self {
            ApiError::InvalidRequest(_) => "invalid_request",
            ApiError::NotFound(_) => "not_found",
            ApiError::Timeout(_) => "timeout",
            ApiError::Internal(_) => "internal",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            ApiError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = Json(json!({
            "error": {
                "code": self.code(),
                "message": self.to_string(),
            },
            "status": status.as_u16(),
        }));
        (status, body).into_response()
    }
}

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        match &err {
            EngineError::Timeout(_) => ApiError::Timeout(err.to_string()),
            EngineError::MissingTransactionData => ApiError::InvalidRequest(err.to_string()),
            EngineError::Domain(_) => ApiError::InvalidRequest(err.to_string()),
            EngineError::Repository(repo) => match repo {
                RepositoryError::NotFound { .. } => ApiError::NotFound(err.to_string()),
                RepositoryError::Conflict { .. } => ApiError::InvalidRequest(err.to_string()),
                _ => ApiError::Internal(err.to_string()),
            },
        }
    }
}

impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        if err.is_not_found() {
            ApiError::NotFound(err.to_string())
        } else if err.is_conflict() {
            ApiError::InvalidRequest(err.to_string())
        } else {
            ApiError::Internal(err.to_string())
        }
    }
}
