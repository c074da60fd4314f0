//! Role-based access control (RBAC) extractors.
//!
//! Each extractor wraps [`AuthUser`] and rejects callers whose role fails
//! the matching [`Caller`] check. The workflow service repeats the check on
//! every operation; these reject early at the boundary.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use dealflow_core::error::CoreError;
use dealflow_core::roles::Caller;

use super::auth::AuthUser;
use crate::error::AppError;
use crate::state::AppState;

async fn authorize(
    parts: &mut Parts,
    state: &AppState,
    check: impl FnOnce(&Caller) -> Result<(), CoreError>,
) -> Result<AuthUser, AppError> {
    let user = AuthUser::from_request_parts(parts, state).await?;
    check(&user.caller())?;
    Ok(user)
}

macro_rules! role_extractor {
    ($(#[$meta:meta])* $name:ident, $check:expr) => {
        $(#[$meta])*
        pub struct $name(pub AuthUser);

        impl FromRequestParts<AppState> for $name {
            type Rejection = AppError;

            async fn from_request_parts(
                parts: &mut Parts,
                state: &AppState,
            ) -> Result<Self, Self::Rejection> {
                authorize(parts, state, $check).await.map($name)
            }
        }
    };
}

role_extractor!(
    /// Requires the `admin` role. Rejects with 403 otherwise.
    ///
    /// ```ignore
    /// async fn admin_only(RequireAdmin(user): RequireAdmin) -> AppResult<Json<()>> {
    ///     Ok(Json(()))
    /// }
    /// ```
    RequireAdmin,
    Caller::require_admin
);

role_extractor!(
    /// Requires `admin` or `legal`. Partners get 403.
    RequireInternal,
    Caller::require_internal
);

role_extractor!(
    /// Requires a `partner` user bound to a funding partner.
    RequirePartner,
    |caller: &Caller| caller.require_partner().map(|_| ())
);

role_extractor!(
    /// Any authenticated user. Same as [`AuthUser`], named for routes where
    /// "requires authentication" should read explicitly.
    RequireAuth,
    |_: &Caller| Ok(())
);
