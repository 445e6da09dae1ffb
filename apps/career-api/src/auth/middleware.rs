//! Bearer-token extraction for HTTP routes.

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;

use crate::auth::tokens;
use crate::error::ApiError;
use crate::models::user::Role;
use crate::AppState;

/// Authenticated user extracted from the `Authorization: Bearer <jwt>` header.
///
/// The role comes from the directory, not the token, so a demoted or
/// deactivated account loses access before its token expires.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: String,
    pub email: String,
    pub full_name: Option<String>,
    pub role: Role,
}

impl AuthUser {
    pub fn display_name(&self) -> &str {
        self.full_name.as_deref().unwrap_or(&self.email)
    }

    /// `403` unless the caller holds `role`.
    pub fn require(&self, role: Role, message: &str) -> Result<(), ApiError> {
        if self.role == role {
            Ok(())
        } else {
            Err(ApiError::forbidden(message))
        }
    }

    /// `403` unless the caller holds one of `roles`.
    pub fn require_any(&self, roles: &[Role], message: &str) -> Result<(), ApiError> {
        if roles.contains(&self.role) {
            Ok(())
        } else {
            Err(ApiError::forbidden(message))
        }
    }
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| ApiError::unauthorized("Missing Authorization header"))?;

        let token = header
            .strip_prefix("Bearer ")
            .ok_or_else(|| ApiError::unauthorized("Invalid Authorization header format"))?;

        let claims = tokens::verify_access_token(token, &state.config.secret_key)
            .map_err(|_| ApiError::unauthorized("Could not validate credentials"))?;

        let user = state
            .users
            .find_user(&claims.sub)
            .await?
            .ok_or_else(|| ApiError::not_found("User not found"))?;

        if !user.is_active {
            return Err(ApiError::bad_request("Inactive user"));
        }

        Ok(AuthUser {
            user_id: user.id,
            email: user.email,
            full_name: user.full_name,
            role: user.role,
        })
    }
}
