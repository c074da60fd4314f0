//! Repository for the `deal_releases` table.

use dealflow_core::deal::{EngagementStatus, PartnerAction, ReleaseStatus};
use dealflow_core::types::{DbId, Timestamp};
use sqlx::PgPool;

use crate::models::deal::Deal;
use crate::models::release::{CreateDealRelease, DealRelease};
use crate::repositories::deal_repo::COLUMNS as DEAL_COLUMNS;

/// Column list for `deal_releases` queries.
const COLUMNS: &str = "\
    id, deal_id, partner_id, status, access_level, released_by, released_at, \
    viewed_at, interested_at, passed_at, created_at, updated_at";

/// Provides queries for deal releases.
pub struct ReleaseRepo;

impl ReleaseRepo {
    /// Insert the release and mark the deal released to its partner in one
    /// transaction.
    ///
    /// Returns `None` when the pair already has a release; nothing is
    /// written in that case. If the deal update fails the release row is
    /// rolled back with it.
    pub async fn create_and_mark_released(
        pool: &PgPool,
        input: &CreateDealRelease,
    ) -> Result<Option<(DealRelease, Deal)>, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let insert = format!(
            "INSERT INTO deal_releases \
                (deal_id, partner_id, status, access_level, released_by, released_at) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             ON CONFLICT ON CONSTRAINT uq_deal_releases_deal_partner DO NOTHING \
             RETURNING {COLUMNS}"
        );
        let release = sqlx::query_as::<_, DealRelease>(&insert)
            .bind(input.deal_id)
            .bind(input.partner_id)
            .bind(EngagementStatus::Pending.as_str())
            .bind(input.access_level.as_str())
            .bind(input.released_by)
            .bind(input.released_at)
            .fetch_optional(&mut *tx)
            .await?;
        let Some(release) = release else {
            return Ok(None);
        };

        let update = format!(
            "UPDATE deals SET release_status = $1, release_partner_id = $2, updated_at = $3 \
             WHERE id = $4 RETURNING {DEAL_COLUMNS}"
        );
        let deal = sqlx::query_as::<_, Deal>(&update)
            .bind(ReleaseStatus::Released.as_str())
            .bind(input.partner_id)
            .bind(input.released_at)
            .bind(input.deal_id)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(Some((release, deal)))
    }

    /// Find a release by ID.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<DealRelease>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM deal_releases WHERE id = $1");
        sqlx::query_as::<_, DealRelease>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Find the release for a (deal, partner) pair.
    pub async fn find_for_pair(
        pool: &PgPool,
        deal_id: DbId,
        partner_id: DbId,
    ) -> Result<Option<DealRelease>, sqlx::Error> {
        let query =
            format!("SELECT {COLUMNS} FROM deal_releases WHERE deal_id = $1 AND partner_id = $2");
        sqlx::query_as::<_, DealRelease>(&query)
            .bind(deal_id)
            .bind(partner_id)
            .fetch_optional(pool)
            .await
    }

    /// All releases of a deal, oldest first.
    pub async fn list_for_deal(
        pool: &PgPool,
        deal_id: DbId,
    ) -> Result<Vec<DealRelease>, sqlx::Error> {
        let query =
            format!("SELECT {COLUMNS} FROM deal_releases WHERE deal_id = $1 ORDER BY released_at");
        sqlx::query_as::<_, DealRelease>(&query)
            .bind(deal_id)
            .fetch_all(pool)
            .await
    }

    /// All releases visible to a partner, newest first.
    pub async fn list_for_partner(
        pool: &PgPool,
        partner_id: DbId,
    ) -> Result<Vec<DealRelease>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM deal_releases WHERE partner_id = $1 ORDER BY released_at DESC"
        );
        sqlx::query_as::<_, DealRelease>(&query)
            .bind(partner_id)
            .fetch_all(pool)
            .await
    }

    /// Write the status and timestamp for a partner action.
    pub async fn apply_partner_action(
        pool: &PgPool,
        id: DbId,
        action: PartnerAction,
        now: Timestamp,
    ) -> Result<Option<DealRelease>, sqlx::Error> {
        let column = match action {
            PartnerAction::View => "viewed_at",
            PartnerAction::Interest => "interested_at",
            PartnerAction::Pass => "passed_at",
        };
        let query = format!(
            "UPDATE deal_releases SET status = $1, {column} = $2, updated_at = $2 \
             WHERE id = $3 RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, DealRelease>(&query)
            .bind(action.resulting_status().as_str())
            .bind(now)
            .bind(id)
            .fetch_optional(pool)
            .await
    }
}
