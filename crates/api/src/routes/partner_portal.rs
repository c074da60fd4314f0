//! Route definitions for the partner portal.
//!
//! Mounted at `/partner` by `api_routes()`.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::partner_portal;
use crate::state::AppState;

/// Partner portal routes.
///
/// ```text
/// GET    /releases                 -> list_releases
/// GET    /releases/{id}            -> get_release
/// POST   /releases/{id}/view       -> view_release
/// POST   /releases/{id}/interest   -> express_interest
/// POST   /releases/{id}/pass       -> pass_release
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/releases", get(partner_portal::list_releases))
        .route("/releases/{id}", get(partner_portal::get_release))
        .route("/releases/{id}/view", post(partner_portal::view_release))
        .route(
            "/releases/{id}/interest",
            post(partner_portal::express_interest),
        )
        .route("/releases/{id}/pass", post(partner_portal::pass_release))
}
