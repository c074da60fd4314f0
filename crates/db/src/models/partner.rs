//! Funding partner entity model and DTOs.

use dealflow_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// A row from the `funding_partners` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct FundingPartner {
    pub id: DbId,
    pub slug: String,
    pub name: String,
    pub contact_email: String,
    pub is_active: bool,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// DTO for registering a funding partner.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateFundingPartner {
    #[validate(length(min = 2, max = 64))]
    pub slug: String,
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[validate(email)]
    pub contact_email: String,
}
