//! HTTP routes
//!
//! - `POST /v1/authorize` - Access decision for the bearer of the request
//! - `PATCH /v1/users/:user_id/role` - Reassign a user's role (requires `ADMINISTER`)
//! - `GET /health` - Health check
//! - `GET /metrics` - Prometheus metrics (separate listener)

use crate::error::{ApiError, Result};
use crate::middleware::{
    cors_layer, guard_middleware, identity_middleware, request_id_middleware, CallerIdentity, GuardState,
};
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::{get, patch, post},
    Extension, Json, Router,
};
use quill_access::seed::permissions;
use quill_access::{AuthMode, ConflictConstraint, ConstraintKind, Decision, Requirement, RoleId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tower::ServiceBuilder;
use tower_http::trace::{DefaultOnResponse, TraceLayer};
use tracing::{info, Level};

/// Access check request
#[derive(Debug, Deserialize)]
pub struct AuthorizeRequest {
    #[serde(default)]
    pub permissions: BTreeSet<String>,

    /// Accept anonymous callers when no permission is required
    #[serde(default)]
    pub optional: bool,
}

/// Access check response
#[derive(Debug, Serialize, Deserialize)]
pub struct AuthorizeResponse {
    pub decision: String,
    pub allowed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub missing: Option<BTreeSet<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conflict: Option<ConflictDetail>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ConflictDetail {
    pub kind: ConstraintKind,
    pub roles: ConflictConstraint,
}

impl From<&Decision> for AuthorizeResponse {
    fn from(decision: &Decision) -> Self {
        let missing = match decision {
            Decision::DenyInsufficientPermission { missing } => Some(missing.clone()),
            _ => None,
        };
        let conflict = match decision {
            Decision::DenyConflict { kind, constraint } => Some(ConflictDetail {
                kind: *kind,
                roles: constraint.clone(),
            }),
            _ => None,
        };

        Self {
            decision: decision.code().to_string(),
            allowed: decision.is_allowed(),
            reason: decision.reason(),
            missing,
            conflict,
        }
    }
}

/// Role reassignment request
#[derive(Debug, Deserialize)]
pub struct UpdateRoleRequest {
    pub role_id: RoleId,
}

/// Health check response
#[derive(Debug, Serialize)]
struct HealthResponse {
    status: String,
    uptime_seconds: u64,
    version: String,
}

/// POST /v1/authorize
async fn authorize(
    State(state): State<AppState>,
    Extension(caller): Extension<CallerIdentity>,
    Json(req): Json<AuthorizeRequest>,
) -> Response {
    let requirement = Requirement {
        permissions: req.permissions,
        mode: if req.optional {
            AuthMode::Optional
        } else {
            AuthMode::Required
        },
    };

    let decision = state.engine.authorize(caller.0.as_ref(), &requirement).await;
    let status = StatusCode::from_u16(decision.status_code()).unwrap_or(StatusCode::FORBIDDEN);

    (status, Json(AuthorizeResponse::from(&decision))).into_response()
}

/// PATCH /v1/users/:user_id/role
async fn update_user_role(
    State(state): State<AppState>,
    Extension(caller): Extension<CallerIdentity>,
    Path(user_id): Path<String>,
    Json(req): Json<UpdateRoleRequest>,
) -> Result<StatusCode> {
    if user_id.trim().is_empty() {
        return Err(ApiError::BadRequest("user id cannot be empty".to_string()));
    }

    let change = state.assignments.assign(&user_id, req.role_id).await?;

    info!(
        by = caller.0.as_ref().map(|i| i.user_id.as_str()).unwrap_or("-"),
        user_id = %change.user_id,
        previous = change.previous,
        current = change.current,
        "User role updated"
    );

    Ok(StatusCode::NO_CONTENT)
}

/// GET /health
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        uptime_seconds: state.uptime_seconds(),
        version: quill_access::VERSION.to_string(),
    })
}

/// GET /metrics
async fn metrics(State(state): State<AppState>) -> Response {
    let mut body = match state.engine.metrics() {
        Some(collector) => collector.export_prometheus().await,
        None => String::new(),
    };

    let cache = state.engine.resolver().cache_stats();
    body.push_str(&format!(
        "\n# HELP access_resolver_cache_hits_total Resolutions served from cache\n\
         # TYPE access_resolver_cache_hits_total counter\n\
         access_resolver_cache_hits_total {}\n\
         \n\
         # HELP access_resolver_cache_misses_total Resolutions loaded from the store\n\
         # TYPE access_resolver_cache_misses_total counter\n\
         access_resolver_cache_misses_total {}\n\
         \n\
         # HELP access_resolver_cache_invalidations_total Cached resolutions dropped\n\
         # TYPE access_resolver_cache_invalidations_total counter\n\
         access_resolver_cache_invalidations_total {}\n\
         \n\
         # HELP access_uptime_seconds Server uptime in seconds\n\
         # TYPE access_uptime_seconds gauge\n\
         access_uptime_seconds {}\n",
        cache.hits,
        cache.misses,
        cache.invalidations,
        state.uptime_seconds(),
    ));

    (
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4")],
        body,
    )
        .into_response()
}

/// Create the HTTP router with all endpoints
pub fn create_router(state: AppState) -> Router {
    let administer = GuardState::new(state.clone(), Requirement::all([permissions::ADMINISTER]));

    let trace = TraceLayer::new_for_http().on_response(DefaultOnResponse::new().level(Level::INFO));

    let admin_routes = Router::new()
        .route("/v1/users/:user_id/role", patch(update_user_role))
        .route_layer(middleware::from_fn_with_state(administer, guard_middleware));

    Router::new()
        .route("/v1/authorize", post(authorize))
        .route("/health", get(health_check))
        .merge(admin_routes)
        .layer(
            ServiceBuilder::new()
                .layer(middleware::from_fn(request_id_middleware))
                .layer(trace)
                .layer(cors_layer())
                .layer(middleware::from_fn_with_state(state.clone(), identity_middleware)),
        )
        .with_state(state)
}

/// Create the metrics router
pub fn create_metrics_router(state: AppState) -> Router {
    Router::new().route("/metrics", get(metrics)).with_state(state)
}
