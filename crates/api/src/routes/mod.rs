pub mod deals;
pub mod health;
pub mod notifications;
pub mod partner_portal;
pub mod partners;

use axum::routing::get;
use axum::Router;

use crate::handlers;
use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// ```text
/// /stages                                  stage taxonomy (any auth)
///
/// /deals                                   list (internal), create (admin)
/// /deals/{id}                              get (role-shaped)
/// /deals/{id}/transitions                  available transitions (internal)
/// /deals/{id}/activity                     activity log (internal)
/// /deals/{id}/releases                     release records (admin)
/// /deals/advance-stage                     AdvanceStage (admin)
/// /deals/notes                             SaveNotes (admin)
/// /deals/handoff                           SetHandoff (admin)
/// /deals/release                           release gate (admin)
/// /deals/score                             enqueue scoring (admin)
///
/// /partners                                list, create (admin)
/// /partners/{id}/activate                  activate (admin)
/// /partners/{id}/deactivate                deactivate (admin)
///
/// /partner/releases                        own releases (partner)
/// /partner/releases/{id}                   release-scoped deal view
/// /partner/releases/{id}/view              record view
/// /partner/releases/{id}/interest          express interest
/// /partner/releases/{id}/pass              pass
///
/// /notifications                           own notifications (any auth)
/// /notifications/{id}/read                 mark read
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/stages", get(handlers::stages::list_stages))
        .nest("/deals", deals::router())
        .nest("/partners", partners::router())
        .nest("/partner", partner_portal::router())
        .nest("/notifications", notifications::router())
}
