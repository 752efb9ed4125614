//! Middleware layer for the guard service
//!
//! - Request ID tracking
//! - Optional bearer identity on every request
//! - Per-route access guard
//! - CORS configuration

use crate::error::ApiError;
use crate::state::AppState;
use axum::{
    extract::{Request, State},
    http::{header, HeaderValue, Method},
    middleware::Next,
    response::{IntoResponse, Response},
};
use quill_access::{identify, Identity, Requirement};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::debug;
use uuid::Uuid;

/// Request ID header name
pub const X_REQUEST_ID: &str = "x-request-id";

/// Identity established for the current request, if any
#[derive(Debug, Clone, Default)]
pub struct CallerIdentity(pub Option<Identity>);

/// Configure CORS middleware
pub fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::OPTIONS])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            header::ACCEPT,
            header::HeaderName::from_static(X_REQUEST_ID),
        ])
        .expose_headers([header::HeaderName::from_static(X_REQUEST_ID)])
        .max_age(std::time::Duration::from_secs(3600))
}

/// Generate or propagate a request ID
pub async fn request_id_middleware(mut request: Request, next: Next) -> Response {
    let request_id = request
        .headers()
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| Uuid::parse_str(s).ok())
        .unwrap_or_else(Uuid::new_v4);

    request.extensions_mut().insert(request_id);

    let mut response = next.run(request).await;

    if let Ok(value) = HeaderValue::from_str(&request_id.to_string()) {
        response.headers_mut().insert(X_REQUEST_ID, value);
    }

    response
}

/// Attach the caller's identity, or none, to the request.
///
/// Never rejects: anonymous and invalid-token requests continue as anonymous.
pub async fn identity_middleware(State(state): State<AppState>, mut request: Request, next: Next) -> Response {
    let header = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());

    let identity = identify(state.verifier.as_ref(), header);
    request.extensions_mut().insert(CallerIdentity(identity));

    next.run(request).await
}

/// State for a guarded route: the app plus what the route requires
#[derive(Clone)]
pub struct GuardState {
    pub app: AppState,
    pub requirement: Arc<Requirement>,
}

impl GuardState {
    pub fn new(app: AppState, requirement: Requirement) -> Self {
        Self {
            app,
            requirement: Arc::new(requirement),
        }
    }
}

/// Reject the request unless the engine allows it
pub async fn guard_middleware(State(guard): State<GuardState>, request: Request, next: Next) -> Response {
    let identity = request
        .extensions()
        .get::<CallerIdentity>()
        .and_then(|caller| caller.0.clone());
    let request_id = request.extensions().get::<Uuid>().copied();

    let decision = guard
        .app
        .engine
        .authorize(identity.as_ref(), &guard.requirement)
        .await;

    if !decision.is_allowed() {
        debug!(
            request_id = ?request_id,
            path = %request.uri().path(),
            decision = decision.code(),
            "Guard rejected request"
        );
        return ApiError::Denied(decision).into_response();
    }

    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::Request as HttpRequest, middleware, routing::get, Router};
    use tower::ServiceExt;

    async fn test_handler() -> &'static str {
        "OK"
    }

    #[tokio::test]
    async fn test_request_id_generated() {
        let app = Router::new()
            .route("/", get(test_handler))
            .layer(middleware::from_fn(request_id_middleware));

        let response = app
            .oneshot(HttpRequest::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert!(response.headers().contains_key(X_REQUEST_ID));
    }

    #[tokio::test]
    async fn test_request_id_propagated() {
        let app = Router::new()
            .route("/", get(test_handler))
            .layer(middleware::from_fn(request_id_middleware));
        let id = Uuid::new_v4().to_string();

        let response = app
            .oneshot(
                HttpRequest::builder()
                    .uri("/")
                    .header(X_REQUEST_ID, &id)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.headers()[X_REQUEST_ID], id.as_str());
    }
}
