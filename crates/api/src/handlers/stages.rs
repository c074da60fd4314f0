//! Stage taxonomy for the presentation layer.

use axum::response::IntoResponse;
use axum::Json;
use dealflow_core::stage;

use crate::error::AppResult;
use crate::middleware::rbac::RequireAuth;
use crate::response::DataResponse;

/// GET /stages -- ordered stages with label, color and terminal flag.
pub async fn list_stages(RequireAuth(_user): RequireAuth) -> AppResult<impl IntoResponse> {
    Ok(Json(DataResponse {
        data: stage::taxonomy(),
    }))
}
