//! Request extractors for authentication and role checks.
//!
//! - [`auth::AuthUser`] resolves the Bearer token into a caller.
//! - [`rbac`] wraps it per role: `RequireAdmin`, `RequireInternal`
//!   (admin or legal), `RequirePartner`, `RequireAuth`.

pub mod auth;
pub mod rbac;
