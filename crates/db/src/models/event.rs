//! Persisted bus events.

use dealflow_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `deal_events` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct DealEventRecord {
    pub id: DbId,
    pub event_type: String,
    pub deal_id: DbId,
    pub actor_user_id: Option<DbId>,
    pub payload: serde_json::Value,
    pub occurred_at: Timestamp,
    pub created_at: Timestamp,
}

/// Insert payload for a persisted event.
#[derive(Debug, Clone)]
pub struct CreateDealEvent<'a> {
    pub event_type: &'a str,
    pub deal_id: DbId,
    pub actor_user_id: Option<DbId>,
    pub payload: &'a serde_json::Value,
    pub occurred_at: Timestamp,
}
