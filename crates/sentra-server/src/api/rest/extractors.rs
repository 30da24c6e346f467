//! Custom request extractors.

use axum::{
    extract::{rejection::JsonRejection, FromRequest, Request},
    http::StatusCode,
    Json,
};
use serde_json::json;

/// JSON extractor that maps body rejections onto the `invalid_request`
/// error shape instead of axum's plain-text default.
pub struct JsonExtractor<T>(pub T);

#[axum::async_trait]
impl<S, T> FromRequest<S> for JsonExtractor<T>
where
    T: serde::de::DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = (StatusCode, Json<serde_json::Value>);

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(value) => Ok(Self(value.0)),
            Err(rejection) => {
                let message = match rejection {
                    JsonRejection::JsonDataError(err) => format!("invalid JSON data: {err}"),
                    JsonRejection::JsonSyntaxError(err) => format!("JSON syntax error: {err}"),
                    JsonRejection::MissingJsonContentType(_) => {
                        "missing 'Content-Type: application/json' header".to_string()
                    }
                    other => format!("failed to parse JSON: {other}"),
                };

                Err((
                    StatusCode::BAD_REQUEST,
                    Json(json!({
                        "error": {
                            "code": "invalid_request",
                            "message": message,
                        },
                        "status": 400,
                    })),
                ))
            }
        }
    }
}
