//! Handlers for the deal pipeline.
//!
//! Reads serve the dashboard; the POST endpoints are the workflow mutators
//! and the release gate. Every handler resolves the token into a
//! [`Caller`](dealflow_core::roles::Caller) and hands it to the workflow
//! service, which owns the authorization rules.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use validator::Validate;

use dealflow_core::deal::{AccessLevel, HandoffTarget, ReleaseStatus};
use dealflow_core::search::{clamp_limit, clamp_offset};
use dealflow_core::stage::Stage;
use dealflow_core::types::DbId;
use dealflow_db::models::deal::{CreateDeal, DealListParams};
use dealflow_db::repositories::deal_repo::DealFilter;
use dealflow_workflow::ScoringInput;

use crate::error::AppResult;
use crate::extract::{ApiJson, ApiPath, ApiQuery};
use crate::middleware::auth::AuthUser;
use crate::middleware::rbac::{RequireAdmin, RequireInternal};
use crate::query::PaginationParams;
use crate::response::DataResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request bodies
// ---------------------------------------------------------------------------

/// Body of `POST /deals/advance-stage`.
///
/// `stage` stays a string so an unknown value surfaces as a validation
/// error rather than a JSON rejection.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdvanceStageRequest {
    pub deal_id: DbId,
    pub stage: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveNotesRequest {
    pub deal_id: DbId,
    pub notes: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetHandoffRequest {
    pub deal_id: DbId,
    pub target: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseRequest {
    pub deal_id: DbId,
    pub partner_id: DbId,
    pub access_level: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreRequest {
    pub deal_id: DbId,
    #[serde(flatten)]
    pub input: ScoringInput,
}

fn parse_filter(params: &DealListParams) -> AppResult<DealFilter> {
    Ok(DealFilter {
        stage: params.stage.as_deref().map(str::parse::<Stage>).transpose()?,
        handoff_target: params
            .handoff_target
            .as_deref()
            .map(str::parse::<HandoffTarget>)
            .transpose()?,
        release_status: params
            .release_status
            .as_deref()
            .map(str::parse::<ReleaseStatus>)
            .transpose()?,
    })
}

// ---------------------------------------------------------------------------
// POST /deals
// ---------------------------------------------------------------------------

/// Create a deal in `draft` with a generated qualification code.
pub async fn create_deal(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    ApiJson(input): ApiJson<CreateDeal>,
) -> AppResult<impl IntoResponse> {
    input.validate()?;
    let deal = state.workflow.create_deal(&admin.caller(), input).await?;
    Ok((StatusCode::CREATED, Json(DataResponse { data: deal })))
}

// ---------------------------------------------------------------------------
// GET /deals
// ---------------------------------------------------------------------------

/// List deals for the pipeline dashboard with optional filters.
pub async fn list_deals(
    RequireInternal(user): RequireInternal,
    State(state): State<AppState>,
    ApiQuery(params): ApiQuery<DealListParams>,
) -> AppResult<impl IntoResponse> {
    let filter = parse_filter(&params)?;
    let limit = clamp_limit(params.limit, 50, 200);
    let offset = clamp_offset(params.offset);

    let deals = state
        .workflow
        .list_deals(&user.caller(), filter, limit, offset)
        .await?;
    Ok(Json(DataResponse { data: deals }))
}

// ---------------------------------------------------------------------------
// GET /deals/{id}
// ---------------------------------------------------------------------------

/// Read one deal. Partners get the projection their release allows.
pub async fn get_deal(
    auth: AuthUser,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<DbId>,
) -> AppResult<impl IntoResponse> {
    let view = state.workflow.read_deal(&auth.caller(), id).await?;
    Ok(Json(DataResponse { data: view }))
}

pub async fn get_transitions(
    RequireInternal(user): RequireInternal,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<DbId>,
) -> AppResult<impl IntoResponse> {
    let transitions = state
        .workflow
        .available_transitions(&user.caller(), id)
        .await?;
    Ok(Json(DataResponse { data: transitions }))
}

/// Activity log for one deal, newest first.
pub async fn get_activity(
    RequireInternal(user): RequireInternal,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<DbId>,
    ApiQuery(params): ApiQuery<PaginationParams>,
) -> AppResult<impl IntoResponse> {
    let limit = clamp_limit(params.limit, 50, 200);
    let offset = clamp_offset(params.offset);
    let entries = state
        .workflow
        .activity(&user.caller(), id, limit, offset)
        .await?;
    Ok(Json(DataResponse { data: entries }))
}

pub async fn list_releases(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<DbId>,
) -> AppResult<impl IntoResponse> {
    let releases = state
        .workflow
        .list_releases_for_deal(&admin.caller(), id)
        .await?;
    Ok(Json(DataResponse { data: releases }))
}

// ---------------------------------------------------------------------------
// Mutators
// ---------------------------------------------------------------------------

/// POST /deals/advance-stage
pub async fn advance_stage(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    ApiJson(input): ApiJson<AdvanceStageRequest>,
) -> AppResult<impl IntoResponse> {
    let target: Stage = input.stage.parse()?;
    let deal = state
        .workflow
        .advance_stage(&admin.caller(), input.deal_id, target)
        .await?;
    Ok(Json(DataResponse { data: deal }))
}

/// POST /deals/notes
pub async fn save_notes(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    ApiJson(input): ApiJson<SaveNotesRequest>,
) -> AppResult<impl IntoResponse> {
    let deal = state
        .workflow
        .save_notes(&admin.caller(), input.deal_id, &input.notes)
        .await?;
    Ok(Json(DataResponse { data: deal }))
}

/// POST /deals/handoff
pub async fn set_handoff(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    ApiJson(input): ApiJson<SetHandoffRequest>,
) -> AppResult<impl IntoResponse> {
    let target: HandoffTarget = input.target.parse()?;
    let deal = state
        .workflow
        .set_handoff(&admin.caller(), input.deal_id, target)
        .await?;
    Ok(Json(DataResponse { data: deal }))
}

/// POST /deals/release
///
/// Responds 201 when a release record was created and 200 when the deal
/// was already released to this partner.
pub async fn release_deal(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    ApiJson(input): ApiJson<ReleaseRequest>,
) -> AppResult<impl IntoResponse> {
    let access_level = input
        .access_level
        .as_deref()
        .map(str::parse::<AccessLevel>)
        .transpose()?;

    let outcome = state
        .workflow
        .release_deal(&admin.caller(), input.deal_id, input.partner_id, access_level)
        .await?;

    let status = if outcome.created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(DataResponse { data: outcome })))
}

/// POST /deals/score -- enqueue a scoring job.
pub async fn request_scoring(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    ApiJson(body): ApiJson<ScoreRequest>,
) -> AppResult<impl IntoResponse> {
    let deal = state
        .workflow
        .request_scoring(&admin.caller(), body.deal_id, body.input)
        .await?;
    Ok((StatusCode::ACCEPTED, Json(DataResponse { data: deal })))
}
