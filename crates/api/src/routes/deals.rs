//! Route definitions for the deal pipeline.
//!
//! Mounted at `/deals` by `api_routes()`.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::deals;
use crate::state::AppState;

/// Deal routes.
///
/// ```text
/// GET    /                    -> list_deals
/// POST   /                    -> create_deal
/// GET    /{id}                -> get_deal
/// GET    /{id}/transitions    -> get_transitions
/// GET    /{id}/activity       -> get_activity
/// GET    /{id}/releases       -> list_releases
/// POST   /advance-stage       -> advance_stage
/// POST   /notes               -> save_notes
/// POST   /handoff             -> set_handoff
/// POST   /release             -> release_deal
/// POST   /score               -> request_scoring
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(deals::list_deals).post(deals::create_deal))
        .route("/{id}", get(deals::get_deal))
        .route("/{id}/transitions", get(deals::get_transitions))
        .route("/{id}/activity", get(deals::get_activity))
        .route("/{id}/releases", get(deals::list_releases))
        .route("/advance-stage", post(deals::advance_stage))
        .route("/notes", post(deals::save_notes))
        .route("/handoff", post(deals::set_handoff))
        .route("/release", post(deals::release_deal))
        .route("/score", post(deals::request_scoring))
}
