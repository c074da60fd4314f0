//! Repository for the `funding_partners` table.

use dealflow_core::types::DbId;
use sqlx::PgPool;

use crate::models::partner::{CreateFundingPartner, FundingPartner};

/// Column list for `funding_partners` queries.
const COLUMNS: &str = "id, slug, name, contact_email, is_active, created_at, updated_at";

/// Provides CRUD operations for funding partners.
pub struct PartnerRepo;

impl PartnerRepo {
    /// Register a partner, returning the full row.
    pub async fn create(
        pool: &PgPool,
        input: &CreateFundingPartner,
    ) -> Result<FundingPartner, sqlx::Error> {
        let query = format!(
            "INSERT INTO funding_partners (slug, name, contact_email) \
             VALUES ($1, $2, $3) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, FundingPartner>(&query)
            .bind(&input.slug)
            .bind(&input.name)
            .bind(&input.contact_email)
            .fetch_one(pool)
            .await
    }

    /// Find a partner by ID, active or not.
    pub async fn find_by_id(
        pool: &PgPool,
        id: DbId,
    ) -> Result<Option<FundingPartner>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM funding_partners WHERE id = $1");
        sqlx::query_as::<_, FundingPartner>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// List partners ordered by name.
    pub async fn list(
        pool: &PgPool,
        include_inactive: bool,
    ) -> Result<Vec<FundingPartner>, sqlx::Error> {
        let filter = if include_inactive {
            ""
        } else {
            "WHERE is_active = true"
        };
        let query = format!("SELECT {COLUMNS} FROM funding_partners {filter} ORDER BY name");
        sqlx::query_as::<_, FundingPartner>(&query)
            .fetch_all(pool)
            .await
    }

    /// Activate or deactivate a partner. Returns the updated row if found.
    pub async fn set_active(
        pool: &PgPool,
        id: DbId,
        is_active: bool,
    ) -> Result<Option<FundingPartner>, sqlx::Error> {
        let query = format!(
            "UPDATE funding_partners SET is_active = $1, updated_at = NOW() \
             WHERE id = $2 RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, FundingPartner>(&query)
            .bind(is_active)
            .bind(id)
            .fetch_optional(pool)
            .await
    }
}
