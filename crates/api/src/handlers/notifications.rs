//! The caller's in-app notification inbox.

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;

use dealflow_core::error::CoreError;
use dealflow_core::search::{clamp_limit, clamp_offset};
use dealflow_core::types::DbId;
use dealflow_db::repositories::NotificationRepo;

use crate::error::AppResult;
use crate::extract::{ApiPath, ApiQuery};
use crate::middleware::rbac::RequireAuth;
use crate::query::NotificationListParams;
use crate::response::DataResponse;
use crate::state::AppState;

/// GET /notifications?unread_only=&limit=&offset=
pub async fn list_notifications(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    ApiQuery(params): ApiQuery<NotificationListParams>,
) -> AppResult<impl IntoResponse> {
    let inbox = NotificationRepo::list_for_user(
        &state.pool,
        user.user_id,
        params.unread_only,
        clamp_limit(params.limit, 50, 200),
        clamp_offset(params.offset),
    )
    .await?;
    Ok(Json(DataResponse { data: inbox }))
}

/// POST /notifications/{id}/read
///
/// Someone else's notification, or one already read, answers 404.
pub async fn mark_read(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<DbId>,
) -> AppResult<impl IntoResponse> {
    let notification = NotificationRepo::mark_read(&state.pool, id, user.user_id)
        .await?
        .ok_or(CoreError::NotFound {
            entity: "Notification",
            id,
        })?;
    Ok(Json(DataResponse { data: notification }))
}
