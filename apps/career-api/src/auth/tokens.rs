//! HS256 access tokens shared by the HTTP API and the gateway handshake.

use chrono::{Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::models::user::Role;

const ALGORITHM: Algorithm = Algorithm::HS256;

/// Claims embedded in an access token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: the user's prefixed ULID.
    pub sub: String,
    /// Role at issuance. Authorization re-reads the role from the directory.
    pub role: Role,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("token has expired")]
    Expired,
    #[error("token signature is invalid")]
    BadSignature,
    #[error("token is malformed")]
    Malformed,
    #[error("token signing failed")]
    Signing,
}

/// Mint an access token for `user_id`, valid for `ttl_minutes`.
pub fn issue_access_token(
    secret: &str,
    user_id: &str,
    role: Role,
    ttl_minutes: i64,
) -> Result<String, TokenError> {
    let now = Utc::now();
    let claims = Claims {
        sub: user_id.to_string(),
        role,
        iat: now.timestamp(),
        exp: (now + Duration::minutes(ttl_minutes)).timestamp(),
    };

    jsonwebtoken::encode(
        &Header::new(ALGORITHM),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| {
        tracing::error!(?e, "failed to sign access token");
        TokenError::Signing
    })
}

/// Verify signature and expiry, returning the embedded claims.
pub fn verify_access_token(token: &str, secret: &str) -> Result<Claims, TokenError> {
    let validation = Validation::new(ALGORITHM);

    jsonwebtoken::decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map(|data| data.claims)
    .map_err(|e| match e.kind() {
        ErrorKind::ExpiredSignature => TokenError::Expired,
        ErrorKind::InvalidSignature => TokenError::BadSignature,
        _ => TokenError::Malformed,
    })
}
