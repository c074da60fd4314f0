//! Repository for the `deal_access_logs` table.

use dealflow_core::types::DbId;
use sqlx::PgPool;

use crate::models::activity::AccessLogEntry;

pub struct AccessLogRepo;

impl AccessLogRepo {
    /// Record one partner-facing access event.
    pub async fn insert(
        pool: &PgPool,
        deal_id: DbId,
        partner_id: DbId,
        user_id: DbId,
        action: &str,
    ) -> Result<DbId, sqlx::Error> {
        sqlx::query_scalar(
            "INSERT INTO deal_access_logs (deal_id, partner_id, user_id, action) \
             VALUES ($1, $2, $3, $4) \
             RETURNING id",
        )
        .bind(deal_id)
        .bind(partner_id)
        .bind(user_id)
        .bind(action)
        .fetch_one(pool)
        .await
    }

    /// Access events for a deal, oldest first.
    pub async fn list_for_deal(
        pool: &PgPool,
        deal_id: DbId,
    ) -> Result<Vec<AccessLogEntry>, sqlx::Error> {
        sqlx::query_as::<_, AccessLogEntry>(
            "SELECT id, deal_id, partner_id, user_id, action, created_at \
             FROM deal_access_logs WHERE deal_id = $1 ORDER BY created_at, id",
        )
        .bind(deal_id)
        .fetch_all(pool)
        .await
    }
}
