//! HS256 access tokens.
//!
//! Tokens are issued outside this service; the API only validates them and
//! resolves the [`Claims`] into a caller. [`generate_access_token`] exists
//! for tooling and tests.

use chrono::Utc;
use dealflow_core::types::DbId;
use jsonwebtoken::errors::Error as JwtError;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::{env_or, ConfigError};

/// Token payload.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// User id.
    pub sub: DbId,
    /// `"admin"`, `"legal"` or `"partner"`.
    pub role: String,
    /// The funding partner a partner user acts for.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partner_id: Option<DbId>,
    pub exp: i64,
    pub iat: i64,
    pub jti: String,
}

impl Claims {
    /// Claims for `user_id` valid for `ttl_mins` from now.
    pub fn issue(user_id: DbId, role: &str, partner_id: Option<DbId>, ttl_mins: i64) -> Self {
        let iat = Utc::now().timestamp();
        Self {
            sub: user_id,
            role: role.to_owned(),
            partner_id,
            exp: iat + ttl_mins * 60,
            iat,
            jti: Uuid::new_v4().to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub secret: String,
    /// Lifetime of generated tokens in minutes.
    pub access_token_expiry_mins: i64,
}

const DEFAULT_ACCESS_EXPIRY_MINS: i64 = 15;

impl JwtConfig {
    /// `JWT_SECRET` (required, non-empty) and `JWT_ACCESS_EXPIRY_MINS`
    /// (default 15).
    pub fn from_env() -> Result<Self, ConfigError> {
        let secret = std::env::var("JWT_SECRET")
            .ok()
            .filter(|s| !s.is_empty())
            .ok_or(ConfigError::Missing("JWT_SECRET"))?;

        Ok(Self {
            secret,
            access_token_expiry_mins: env_or("JWT_ACCESS_EXPIRY_MINS", DEFAULT_ACCESS_EXPIRY_MINS)?,
        })
    }

    fn sign(&self, claims: &Claims) -> Result<String, JwtError> {
        encode(
            &Header::default(),
            claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
    }
}

pub fn generate_access_token(
    user_id: DbId,
    role: &str,
    partner_id: Option<DbId>,
    config: &JwtConfig,
) -> Result<String, JwtError> {
    config.sign(&Claims::issue(
        user_id,
        role,
        partner_id,
        config.access_token_expiry_mins,
    ))
}

/// Check the signature and expiry, returning the claims.
pub fn validate_token(token: &str, config: &JwtConfig) -> Result<Claims, JwtError> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
}
