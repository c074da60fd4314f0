use std::time::Duration;

use axum::extract::State;
use axum::{routing::get, Json, Router};
use serde::Serialize;

use crate::state::AppState;

/// Upper bound on the database probe so a stuck pool cannot hang liveness.
const DB_PROBE_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Serialize)]
pub struct HealthResponse {
    /// `"ok"`, or `"degraded"` when the database probe fails.
    pub status: &'static str,
    pub version: &'static str,
    pub db_healthy: bool,
    /// Whether scoring requests are accepted.
    pub scoring_enabled: bool,
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let db_healthy = matches!(
        tokio::time::timeout(DB_PROBE_TIMEOUT, dealflow_db::health_check(&state.pool)).await,
        Ok(Ok(()))
    );
    if !db_healthy {
        tracing::warn!("Health probe could not reach the database");
    }

    Json(HealthResponse {
        status: if db_healthy { "ok" } else { "degraded" },
        version: env!("CARGO_PKG_VERSION"),
        db_healthy,
        scoring_enabled: state.workflow.scoring_enabled(),
    })
}

/// `GET /health`, mounted at the root rather than under `/api/v1`.
pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health))
}
