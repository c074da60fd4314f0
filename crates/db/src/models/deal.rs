//! Deal entity model and DTOs.

use dealflow_core::deal::{AccessLevel, HandoffTarget, ReleaseStatus, ScoringStatus};
use dealflow_core::stage::Stage;
use dealflow_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// A row from the `deals` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Deal {
    pub id: DbId,
    pub qualification_code: String,
    pub owner_user_id: DbId,
    pub originator_name: String,
    pub requested_amount_cents: i64,
    #[sqlx(try_from = "String")]
    pub stage: Stage,
    #[sqlx(try_from = "String")]
    pub handoff_target: HandoffTarget,
    pub handed_off_at: Option<Timestamp>,
    #[sqlx(try_from = "String")]
    pub release_status: ReleaseStatus,
    pub release_partner_id: Option<DbId>,
    pub internal_notes: String,
    pub score: Option<f64>,
    pub grade: Option<String>,
    pub score_breakdown: Option<serde_json::Value>,
    #[sqlx(try_from = "String")]
    pub scoring_status: ScoringStatus,
    pub scoring_error: Option<String>,
    pub scored_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Deal {
    /// Whether the scoring collaborator has recorded a score.
    pub fn has_score(&self) -> bool {
        self.score.is_some()
    }
}

/// DTO for submitting a qualification application.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateDeal {
    pub owner_user_id: DbId,
    #[validate(length(min = 1, max = 200))]
    pub originator_name: String,
    #[validate(range(min = 1))]
    pub requested_amount_cents: i64,
}

/// Query parameters for the pipeline dashboard listing.
#[derive(Debug, Default, Deserialize)]
pub struct DealListParams {
    pub stage: Option<String>,
    pub handoff_target: Option<String>,
    pub release_status: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Assessment written back by the scoring collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreRecord {
    pub score: f64,
    pub grade: String,
    pub breakdown: serde_json::Value,
}

/// The slice of a deal a funding partner may see, shaped by access level.
///
/// Internal notes, handoff state, and the owner are never exposed.
#[derive(Debug, Clone, Serialize)]
pub struct PartnerDealView {
    pub deal_id: DbId,
    pub qualification_code: String,
    pub originator_name: String,
    pub requested_amount_cents: i64,
    pub grade: Option<String>,
    pub access_level: AccessLevel,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage: Option<Stage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score_breakdown: Option<serde_json::Value>,
    pub document_room_enabled: bool,
}

impl PartnerDealView {
    pub fn build(deal: &Deal, access_level: AccessLevel) -> Self {
        let full = access_level.grants(AccessLevel::Full);
        Self {
            deal_id: deal.id,
            qualification_code: deal.qualification_code.clone(),
            originator_name: deal.originator_name.clone(),
            requested_amount_cents: deal.requested_amount_cents,
            grade: deal.grade.clone(),
            access_level,
            stage: full.then_some(deal.stage),
            score: if full { deal.score } else { None },
            score_breakdown: if full { deal.score_breakdown.clone() } else { None },
            document_room_enabled: access_level.grants(AccessLevel::Documents),
        }
    }
}
