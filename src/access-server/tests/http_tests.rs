//! HTTP surface tests

use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    Router,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{encode, EncodingKey, Header};
use quill_access::identity::TokenClaims;
use quill_access::seed::{self, permissions, RoleGraphSeed};
use quill_access::types::{RoleHierarchy, Role};
use quill_access::{
    AccessConfig, ConflictConstraint, InMemoryRoleStore, JwtVerifier, RoleGraphStore, SeparationPolicy,
};
use quill_access_server::{create_metrics_router, create_router, AppState};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

const SECRET: &[u8] = b"http-test-secret";

const AUDITOR: i64 = 6;
const AUDITING_MODERATOR: i64 = 7;

/// Platform roles plus an AUDITOR that may not be combined with MODERATOR
/// and a role that inherits both.
fn test_seed() -> RoleGraphSeed {
    let mut seed = seed::platform();
    seed.roles.push(Role::new(AUDITOR, "AUDITOR"));
    seed.roles.push(Role::new(AUDITING_MODERATOR, "AUDITING_MODERATOR"));
    seed.hierarchy.push(RoleHierarchy {
        parent_role_id: AUDITOR,
        child_role_id: AUDITING_MODERATOR,
    });
    seed.hierarchy.push(RoleHierarchy {
        parent_role_id: 3,
        child_role_id: AUDITING_MODERATOR,
    });

    seed.with_user("alice", 4)
        .with_user("bob", 3)
        .with_user("carol", 2)
        .with_user("dave", AUDITING_MODERATOR)
}

fn setup() -> (Arc<InMemoryRoleStore>, AppState) {
    let store = Arc::new(InMemoryRoleStore::from_seed(test_seed()));
    let config = AccessConfig {
        separation: SeparationPolicy::new(vec![ConflictConstraint::new("AUDITOR", "MODERATOR")], vec![]),
        ..Default::default()
    };
    let verifier = Arc::new(JwtVerifier::new(SECRET).unwrap());
    let state = AppState::new(store.clone(), config, verifier).unwrap();
    (store, state)
}

fn token(user_id: &str) -> String {
    let claims = TokenClaims {
        id: user_id.to_string(),
        username: user_id.to_string(),
        email: None,
        exp: (Utc::now() + Duration::minutes(10)).timestamp(),
        iat: Some(Utc::now().timestamp()),
    };
    encode(&Header::default(), &claims, &EncodingKey::from_secret(SECRET)).unwrap()
}

fn authorize_request(bearer: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/v1/authorize")
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(user) = bearer {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token(user)));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn role_request(bearer: Option<&str>, user_id: &str, role_id: i64) -> Request<Body> {
    let mut builder = Request::builder()
        .method("PATCH")
        .uri(format!("/v1/users/{}/role", user_id))
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(user) = bearer {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token(user)));
    }
    builder
        .body(Body::from(json!({ "role_id": role_id }).to_string()))
        .unwrap()
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

// ============================================================================
// AUTHORIZE
// ============================================================================

#[tokio::test]
async fn test_authorize_without_token() {
    let (_, state) = setup();
    let app = create_router(state);

    let (status, body) = send(
        &app,
        authorize_request(None, json!({ "permissions": [permissions::COMMENT] })),
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["decision"], "unauthenticated");
    assert_eq!(body["allowed"], false);
}

#[tokio::test]
async fn test_authorize_optional_anonymous() {
    let (_, state) = setup();
    let app = create_router(state);

    let (status, body) = send(&app, authorize_request(None, json!({ "optional": true }))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["allowed"], true);
}

#[tokio::test]
async fn test_authorize_invalid_token_is_anonymous() {
    let (_, state) = setup();
    let app = create_router(state);

    let request = Request::builder()
        .method("POST")
        .uri("/v1/authorize")
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::AUTHORIZATION, "Bearer not-a-token")
        .body(Body::from(json!({ "permissions": [permissions::COMMENT] }).to_string()))
        .unwrap();

    let (status, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_authorize_inherited_permission() {
    let (_, state) = setup();
    let app = create_router(state);

    // MODERATOR inherits COMMENT from USER
    let (status, body) = send(
        &app,
        authorize_request(
            Some("bob"),
            json!({ "permissions": [permissions::MODERATE_ARTICLE, permissions::COMMENT] }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["decision"], "allow");
    assert!(body.get("reason").is_none());
}

#[tokio::test]
async fn test_authorize_insufficient_permission() {
    let (_, state) = setup();
    let app = create_router(state);

    let (status, body) = send(
        &app,
        authorize_request(
            Some("carol"),
            json!({ "permissions": [permissions::COMMENT, permissions::ADMINISTER] }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["decision"], "insufficient_permission");
    assert_eq!(body["missing"], json!([permissions::ADMINISTER]));
}

#[tokio::test]
async fn test_authorize_conflicting_roles() {
    let (_, state) = setup();
    let app = create_router(state);

    let (status, body) = send(
        &app,
        authorize_request(Some("dave"), json!({ "permissions": [permissions::COMMENT] })),
    )
    .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["decision"], "conflict");
    assert_eq!(body["conflict"]["kind"], "static");
}

#[tokio::test]
async fn test_authorize_unknown_user() {
    let (_, state) = setup();
    let app = create_router(state);

    let (status, body) = send(
        &app,
        authorize_request(Some("mallory"), json!({ "permissions": [permissions::COMMENT] })),
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["decision"], "unauthenticated");
}

// ============================================================================
// ROLE REASSIGNMENT
// ============================================================================

#[tokio::test]
async fn test_update_role_requires_identity() {
    let (store, state) = setup();
    let app = create_router(state);

    let (status, body) = send(&app, role_request(None, "carol", 3)).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "unauthenticated");
    assert_eq!(store.user_role("carol").await.unwrap(), Some(2));
}

#[tokio::test]
async fn test_update_role_requires_administer() {
    let (store, state) = setup();
    let app = create_router(state);

    let (status, body) = send(&app, role_request(Some("bob"), "carol", 3)).await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "insufficient_permission");
    assert_eq!(store.user_role("carol").await.unwrap(), Some(2));
}

#[tokio::test]
async fn test_update_role() {
    let (store, state) = setup();
    let app = create_router(state);

    let (status, _) = send(&app, role_request(Some("alice"), "carol", 3)).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(store.user_role("carol").await.unwrap(), Some(3));

    // The new role takes effect on the next decision
    let (status, _) = send(
        &app,
        authorize_request(Some("carol"), json!({ "permissions": [permissions::MODERATE_ARTICLE] })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_update_role_conflict_not_written() {
    let (store, state) = setup();
    let app = create_router(state);

    let (status, body) = send(&app, role_request(Some("alice"), "bob", AUDITOR)).await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "conflict");
    assert_eq!(store.user_role("bob").await.unwrap(), Some(3));
}

#[tokio::test]
async fn test_update_role_unknown_user_or_role() {
    let (_, state) = setup();
    let app = create_router(state);

    let (status, _) = send(&app, role_request(Some("alice"), "ghost", 2)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, role_request(Some("alice"), "carol", 99)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// ============================================================================
// HEALTH & METRICS
// ============================================================================

#[tokio::test]
async fn test_health() {
    let (_, state) = setup();
    let app = create_router(state);

    let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let (status, body) = send(&app, request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["version"], quill_access::VERSION);
}

#[tokio::test]
async fn test_metrics_count_decisions() {
    let (_, state) = setup();
    let app = create_router(state.clone());
    let metrics = create_metrics_router(state);

    send(&app, authorize_request(None, json!({ "permissions": [permissions::COMMENT] }))).await;

    let response = metrics
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.contains("access_resolver_cache_hits_total"));
    assert!(text.contains("access_uptime_seconds"));
}
