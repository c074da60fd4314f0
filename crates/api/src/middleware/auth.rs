//! Bearer-token authentication.

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use dealflow_core::error::CoreError;
use dealflow_core::roles::{Caller, Role};
use dealflow_core::types::DbId;

use crate::auth::jwt::{validate_token, Claims};
use crate::error::AppError;
use crate::state::AppState;

/// The authenticated user behind a request.
///
/// Handlers never look at the token themselves; they take an `AuthUser`
/// (or one of the RBAC wrappers) and pass [`AuthUser::caller`] into the
/// workflow service.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: DbId,
    pub role: Role,
    /// Set only for `partner` users.
    pub partner_id: Option<DbId>,
}

impl AuthUser {
    pub fn caller(&self) -> Caller {
        Caller {
            user_id: self.user_id,
            role: self.role,
            partner_id: self.partner_id,
        }
    }
}

fn unauthorized(msg: &str) -> CoreError {
    CoreError::Unauthorized(msg.to_owned())
}

fn bearer_token(parts: &Parts) -> Result<&str, CoreError> {
    let header = parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| unauthorized("Missing Authorization header"))?;
    header
        .strip_prefix("Bearer ")
        .ok_or_else(|| unauthorized("Invalid Authorization format. Expected: Bearer <token>"))
}

impl TryFrom<Claims> for AuthUser {
    type Error = CoreError;

    /// A partner token without a partner id cannot act for anyone.
    fn try_from(claims: Claims) -> Result<Self, Self::Error> {
        let role: Role = claims
            .role
            .parse()
            .map_err(|_| unauthorized("Unknown role in token"))?;
        if role == Role::Partner && claims.partner_id.is_none() {
            return Err(unauthorized("Partner token is missing its funding partner"));
        }
        Ok(Self {
            user_id: claims.sub,
            role,
            partner_id: claims.partner_id,
        })
    }
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)?;
        let claims = validate_token(token, &state.config.jwt)
            .map_err(|_| unauthorized("Invalid or expired token"))?;
        Ok(AuthUser::try_from(claims)?)
    }
}
