//! Activity log and access log models.

use dealflow_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `deal_activity` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct DealActivity {
    pub id: DbId,
    pub deal_id: DbId,
    pub actor_user_id: Option<DbId>,
    pub action: String,
    pub details: serde_json::Value,
    pub created_at: Timestamp,
}

/// Insert payload for an activity entry.
#[derive(Debug, Clone)]
pub struct CreateDealActivity {
    pub deal_id: DbId,
    pub actor_user_id: Option<DbId>,
    pub action: &'static str,
    pub details: serde_json::Value,
}

/// A row from the `deal_access_logs` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct AccessLogEntry {
    pub id: DbId,
    pub deal_id: DbId,
    pub partner_id: DbId,
    pub user_id: DbId,
    pub action: String,
    pub created_at: Timestamp,
}
