use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use quill_access::{AccessError, Decision};
use serde_json::json;
use tracing::error;

pub type Result<T> = std::result::Result<T, ApiError>;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Access denied: {}", .0.code())]
    Denied(Decision),

    #[error("Access error: {0}")]
    Access(#[from] AccessError),

    #[error("Bad request: {0}")]
    BadRequest(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            ApiError::Denied(decision) => (
                StatusCode::from_u16(decision.status_code()).unwrap_or(StatusCode::FORBIDDEN),
                decision.code(),
                decision.reason().unwrap_or_default(),
            ),
            ApiError::Access(e) => match e {
                AccessError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg),
                AccessError::Conflict(msg) => (StatusCode::CONFLICT, "conflict", msg),
                AccessError::ConcurrentModification(msg) => {
                    (StatusCode::CONFLICT, "concurrent_modification", msg)
                }
                AccessError::InvalidInput(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg),
                other => {
                    error!(error = %other, "Request failed");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "internal_error",
                        "internal error".to_string(),
                    )
                }
            },
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg),
        };

        let body = Json(json!({
            "error": code,
            "message": message,
            "status": status.as_u16(),
        }));

        (status, body).into_response()
    }
}
