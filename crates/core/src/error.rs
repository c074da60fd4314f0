use crate::stage::Stage;
use crate::types::DbId;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: DbId },

    #[error("Invalid stage transition from '{from}' to '{to}'")]
    InvalidTransition { from: Stage, to: Stage },

    #[error("Deal {deal_id} has no recorded score; scoring must complete before release")]
    ScoringRequired { deal_id: DbId },

    #[error("Deal {deal_id} was rejected by scoring and cannot be released")]
    DealRejected { deal_id: DbId },

    #[error("Funding partner {partner_id} does not exist or is inactive")]
    PartnerNotFound { partner_id: DbId },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Internal error: {0}")]
    Internal(String),
}
