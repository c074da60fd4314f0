//! Role names and the explicit caller context.
//!
//! Business logic never looks up the session itself; the HTTP boundary
//! resolves the token into a [`Caller`] and passes it down.

use crate::deal::HandoffTarget;
use crate::error::CoreError;
use crate::types::DbId;

pub const ROLE_ADMIN: &str = "admin";
pub const ROLE_LEGAL: &str = "legal";
pub const ROLE_PARTNER: &str = "partner";

define_str_enum! {
    /// Resolved role of an authenticated caller.
    Role ("role") {
        Admin => "admin",
        Legal => "legal",
        Partner => "partner",
    }
}

/// An authenticated caller with a resolved role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caller {
    pub user_id: DbId,
    pub role: Role,
    /// Set for partner users: the funding partner they act for.
    pub partner_id: Option<DbId>,
}

impl Caller {
    pub fn admin(user_id: DbId) -> Self {
        Self {
            user_id,
            role: Role::Admin,
            partner_id: None,
        }
    }

    pub fn legal(user_id: DbId) -> Self {
        Self {
            user_id,
            role: Role::Legal,
            partner_id: None,
        }
    }

    pub fn partner(user_id: DbId, partner_id: DbId) -> Self {
        Self {
            user_id,
            role: Role::Partner,
            partner_id: Some(partner_id),
        }
    }

    /// All workflow mutators require the admin role.
    pub fn require_admin(&self) -> Result<(), CoreError> {
        if self.role == Role::Admin {
            Ok(())
        } else {
            Err(CoreError::Forbidden("Admin role required".into()))
        }
    }

    /// Dashboard reads are limited to internal staff.
    pub fn require_internal(&self) -> Result<(), CoreError> {
        match self.role {
            Role::Admin | Role::Legal => Ok(()),
            Role::Partner => Err(CoreError::Forbidden("Internal staff role required".into())),
        }
    }

    /// The partner this caller acts for, or `Forbidden` for non-partners.
    pub fn require_partner(&self) -> Result<DbId, CoreError> {
        match (self.role, self.partner_id) {
            (Role::Partner, Some(partner_id)) => Ok(partner_id),
            _ => Err(CoreError::Forbidden(
                "Funding partner account required".into(),
            )),
        }
    }

    /// Read access to a deal.
    ///
    /// Admin and legal read every deal. A partner reads a deal only while it
    /// is handed off to the funding-partner team and has been released to
    /// that partner.
    pub fn can_read_deal(&self, handoff: HandoffTarget, released_to_caller: bool) -> bool {
        match self.role {
            Role::Admin | Role::Legal => true,
            Role::Partner => handoff == HandoffTarget::FundingPartner && released_to_caller,
        }
    }
}
