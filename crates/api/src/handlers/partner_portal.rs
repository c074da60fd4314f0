//! Handlers for the funding partner portal.
//!
//! A partner only ever sees its own releases; another partner's release id
//! answers 404.

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;

use dealflow_core::deal::PartnerAction;
use dealflow_core::types::DbId;

use crate::error::AppResult;
use crate::extract::ApiPath;
use crate::middleware::rbac::RequirePartner;
use crate::response::DataResponse;
use crate::state::AppState;

/// GET /partner/releases
pub async fn list_releases(
    RequirePartner(partner): RequirePartner,
    State(state): State<AppState>,
) -> AppResult<impl IntoResponse> {
    let releases = state
        .workflow
        .list_partner_releases(&partner.caller())
        .await?;
    Ok(Json(DataResponse { data: releases }))
}

/// GET /partner/releases/{id} -- the release with its deal projection.
pub async fn get_release(
    RequirePartner(partner): RequirePartner,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<DbId>,
) -> AppResult<impl IntoResponse> {
    let view = state
        .workflow
        .partner_release_view(&partner.caller(), id)
        .await?;
    Ok(Json(DataResponse { data: view }))
}

pub async fn view_release(
    partner: RequirePartner,
    state: State<AppState>,
    ApiPath(id): ApiPath<DbId>,
) -> AppResult<impl IntoResponse> {
    act(partner, state, id, PartnerAction::View).await
}

pub async fn express_interest(
    partner: RequirePartner,
    state: State<AppState>,
    ApiPath(id): ApiPath<DbId>,
) -> AppResult<impl IntoResponse> {
    act(partner, state, id, PartnerAction::Interest).await
}

pub async fn pass_release(
    partner: RequirePartner,
    state: State<AppState>,
    ApiPath(id): ApiPath<DbId>,
) -> AppResult<impl IntoResponse> {
    act(partner, state, id, PartnerAction::Pass).await
}

async fn act(
    RequirePartner(partner): RequirePartner,
    State(state): State<AppState>,
    release_id: DbId,
    action: PartnerAction,
) -> AppResult<impl IntoResponse> {
    let release = state
        .workflow
        .partner_action(&partner.caller(), release_id, action)
        .await?;
    Ok(Json(DataResponse { data: release }))
}
