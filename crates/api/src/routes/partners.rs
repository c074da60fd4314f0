//! Route definitions for funding partner administration.
//!
//! Mounted at `/partners` by `api_routes()`.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::partners;
use crate::state::AppState;

/// Partner admin routes.
///
/// ```text
/// GET    /                  -> list_partners
/// POST   /                  -> create_partner
/// POST   /{id}/activate     -> activate_partner
/// POST   /{id}/deactivate   -> deactivate_partner
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(partners::list_partners).post(partners::create_partner),
        )
        .route("/{id}/activate", post(partners::activate_partner))
        .route("/{id}/deactivate", post(partners::deactivate_partner))
}
