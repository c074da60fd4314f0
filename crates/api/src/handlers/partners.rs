//! Handlers for funding partner administration.
//!
//! All endpoints require the admin role.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use validator::Validate;

use dealflow_core::error::CoreError;
use dealflow_core::types::DbId;
use dealflow_db::models::partner::{CreateFundingPartner, FundingPartner};
use dealflow_db::repositories::PartnerRepo;

use crate::error::AppResult;
use crate::extract::{ApiJson, ApiPath, ApiQuery};
use crate::middleware::rbac::RequireAdmin;
use crate::query::IncludeInactiveParams;
use crate::response::DataResponse;
use crate::state::AppState;

/// POST /partners
pub async fn create_partner(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    ApiJson(input): ApiJson<CreateFundingPartner>,
) -> AppResult<impl IntoResponse> {
    input.validate()?;
    let partner = PartnerRepo::create(&state.pool, &input).await?;

    tracing::info!(
        partner_id = partner.id,
        slug = %partner.slug,
        user_id = admin.user_id,
        "Funding partner created",
    );

    Ok((StatusCode::CREATED, Json(DataResponse { data: partner })))
}

/// GET /partners
pub async fn list_partners(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
    ApiQuery(params): ApiQuery<IncludeInactiveParams>,
) -> AppResult<impl IntoResponse> {
    let partners = PartnerRepo::list(&state.pool, params.include_inactive).await?;
    Ok(Json(DataResponse { data: partners }))
}

/// POST /partners/{id}/activate
pub async fn activate_partner(
    admin: RequireAdmin,
    state: State<AppState>,
    ApiPath(id): ApiPath<DbId>,
) -> AppResult<impl IntoResponse> {
    set_active(admin, state, id, true).await
}

/// POST /partners/{id}/deactivate
///
/// Existing releases stay in place; the partner simply cannot receive new
/// ones until reactivated.
pub async fn deactivate_partner(
    admin: RequireAdmin,
    state: State<AppState>,
    ApiPath(id): ApiPath<DbId>,
) -> AppResult<impl IntoResponse> {
    set_active(admin, state, id, false).await
}

async fn set_active(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    id: DbId,
    is_active: bool,
) -> AppResult<Json<DataResponse<FundingPartner>>> {
    let partner = PartnerRepo::set_active(&state.pool, id, is_active)
        .await?
        .ok_or(CoreError::NotFound {
            entity: "FundingPartner",
            id,
        })?;

    tracing::info!(partner_id = id, is_active, user_id = admin.user_id, "Partner status changed");
    Ok(Json(DataResponse { data: partner }))
}
