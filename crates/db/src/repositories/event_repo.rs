//! Repository for the `deal_events` table.

use dealflow_core::types::DbId;
use sqlx::PgPool;

use crate::models::event::{CreateDealEvent, DealEventRecord};

const COLUMNS: &str = "id, event_type, deal_id, actor_user_id, payload, occurred_at, created_at";

pub struct EventRepo;

impl EventRepo {
    pub async fn insert(pool: &PgPool, input: &CreateDealEvent<'_>) -> Result<DbId, sqlx::Error> {
        sqlx::query_scalar(
            "INSERT INTO deal_events (event_type, deal_id, actor_user_id, payload, occurred_at) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING id",
        )
        .bind(input.event_type)
        .bind(input.deal_id)
        .bind(input.actor_user_id)
        .bind(input.payload)
        .bind(input.occurred_at)
        .fetch_one(pool)
        .await
    }

    /// Events for a deal in the order they happened.
    pub async fn list_for_deal(
        pool: &PgPool,
        deal_id: DbId,
    ) -> Result<Vec<DealEventRecord>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM deal_events WHERE deal_id = $1 ORDER BY occurred_at, id"
        );
        sqlx::query_as::<_, DealEventRecord>(&query)
            .bind(deal_id)
            .fetch_all(pool)
            .await
    }
}
