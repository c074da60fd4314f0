//! Repository for the `deal_activity` table.

use dealflow_core::types::DbId;
use sqlx::PgPool;

use crate::models::activity::{CreateDealActivity, DealActivity};

const COLUMNS: &str = "id, deal_id, actor_user_id, action, details, created_at";

pub struct ActivityRepo;

impl ActivityRepo {
    /// Append an activity entry, returning the generated ID.
    pub async fn insert(pool: &PgPool, input: &CreateDealActivity) -> Result<DbId, sqlx::Error> {
        sqlx::query_scalar(
            "INSERT INTO deal_activity (deal_id, actor_user_id, action, details) \
             VALUES ($1, $2, $3, $4) \
             RETURNING id",
        )
        .bind(input.deal_id)
        .bind(input.actor_user_id)
        .bind(input.action)
        .bind(&input.details)
        .fetch_one(pool)
        .await
    }

    /// Activity for a deal, newest first.
    pub async fn list_for_deal(
        pool: &PgPool,
        deal_id: DbId,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<DealActivity>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM deal_activity WHERE deal_id = $1 \
             ORDER BY created_at DESC, id DESC LIMIT $2 OFFSET $3"
        );
        sqlx::query_as::<_, DealActivity>(&query)
            .bind(deal_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await
    }
}
