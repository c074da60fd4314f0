#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Method, Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use sqlx::PgPool;
use tower::ServiceExt;

use dealflow_api::auth::jwt::{generate_access_token, JwtConfig};
use dealflow_api::config::{LogFormat, ServerConfig};
use dealflow_api::router::build_app_router;
use dealflow_api::state::AppState;
use dealflow_core::types::DbId;
use dealflow_events::EventBus;
use dealflow_workflow::{DisabledMailer, PgDealStore, WorkflowService};

pub const ADMIN_ID: DbId = 1;
pub const LEGAL_ID: DbId = 2;
pub const PARTNER_USER_ID: DbId = 3;

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 5,
        log_format: LogFormat::Text,
        jwt: JwtConfig {
            secret: "test-secret-that-is-long-enough-for-hmac".to_string(),
            access_token_expiry_mins: 15,
        },
    }
}

/// Build the full application router over `pool`, with email disabled and
/// no scoring queue.
pub fn build_test_app(pool: PgPool) -> Router {
    let config = test_config();
    let workflow = WorkflowService::new(
        Arc::new(PgDealStore::new(pool.clone())),
        Arc::new(EventBus::default()),
        Arc::new(DisabledMailer),
    );

    let state = AppState {
        pool,
        config: Arc::new(config.clone()),
        workflow,
    };
    build_app_router(state, &config)
}

pub fn token(user_id: DbId, role: &str, partner_id: Option<DbId>) -> String {
    generate_access_token(user_id, role, partner_id, &test_config().jwt).unwrap()
}

pub fn admin_token() -> String {
    token(ADMIN_ID, "admin", None)
}

pub fn legal_token() -> String {
    token(LEGAL_ID, "legal", None)
}

pub fn partner_token(partner_id: DbId) -> String {
    token(PARTNER_USER_ID, "partner", Some(partner_id))
}

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    let request = Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn get_auth(app: Router, uri: &str, token: &str) -> Response<Body> {
    let request = Request::builder()
        .method(Method::GET)
        .uri(uri)
        .header("authorization", format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn post_json_auth(
    app: Router,
    uri: &str,
    body: serde_json::Value,
    token: &str,
) -> Response<Body> {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header("content-type", "application/json")
        .header("authorization", format!("Bearer {token}"))
        .body(Body::from(serde_json::to_vec(&body).unwrap()))
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn post_raw_auth(app: Router, uri: &str, body: &str, token: &str) -> Response<Body> {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header("content-type", "application/json")
        .header("authorization", format!("Bearer {token}"))
        .body(Body::from(body.to_owned()))
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}
