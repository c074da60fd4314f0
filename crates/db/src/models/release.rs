//! Deal release (deal x partner) entity model and DTOs.

use dealflow_core::deal::{AccessLevel, EngagementStatus};
use dealflow_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `deal_releases` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct DealRelease {
    pub id: DbId,
    pub deal_id: DbId,
    pub partner_id: DbId,
    #[sqlx(try_from = "String")]
    pub status: EngagementStatus,
    #[sqlx(try_from = "String")]
    pub access_level: AccessLevel,
    pub released_by: DbId,
    pub released_at: Timestamp,
    pub viewed_at: Option<Timestamp>,
    pub interested_at: Option<Timestamp>,
    pub passed_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// Insert payload for a new release.
#[derive(Debug, Clone)]
pub struct CreateDealRelease {
    pub deal_id: DbId,
    pub partner_id: DbId,
    pub access_level: AccessLevel,
    pub released_by: DbId,
    pub released_at: Timestamp,
}
