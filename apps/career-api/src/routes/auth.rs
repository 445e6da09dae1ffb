//! Password login and self-registration.

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Form, Json, Router};
use chrono::Utc;
use diesel::prelude::*;
use diesel::result::OptionalExtension;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use career_common::id::{prefix, prefixed_ulid};

use crate::auth::password::{self, MIN_PASSWORD_LEN};
use crate::auth::tokens;
use crate::db::schema::users;
use crate::error::{conflict_on_unique, ApiError, ApiErrorBody, FieldError};
use crate::models::user::{NewUser, Role, User, UserResponse};
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/login/access-token", post(login))
        .route("/register", post(register))
}

// ---------------------------------------------------------------------------
// POST /api/v1/login/access-token
// ---------------------------------------------------------------------------

/// OAuth2 password-style form. `username` carries the e-mail address.
#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: &'static str,
    /// Seconds until the token expires.
    pub expires_in: i64,
    /// Where to open the real-time connection (`?token=<access_token>`).
    pub ws_url: String,
}

#[utoipa::path(
    post,
    path = "/api/v1/login/access-token",
    tag = "Auth",
    request_body(content = LoginForm, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 200, description = "Login successful", body = TokenResponse),
        (status = 400, description = "Bad credentials or inactive user", body = ApiErrorBody),
    ),
)]
pub async fn login(
    State(state): State<AppState>,
    Form(form): Form<LoginForm>,
) -> Result<Json<TokenResponse>, ApiError> {
    let email = form.username.trim().to_lowercase();

    let mut conn = state.db.get().await?;
    let user: Option<User> = diesel_async::RunQueryDsl::get_result(
        users::table
            .filter(users::email.eq(&email))
            .select(User::as_select()),
        &mut conn,
    )
    .await
    .optional()?;
    drop(conn);

    let user = user.ok_or_else(|| ApiError::bad_request("Incorrect email or password"))?;

    if !password::verify_password(&form.password, &user.password_hash)? {
        return Err(ApiError::bad_request("Incorrect email or password"));
    }
    if !user.is_active {
        return Err(ApiError::bad_request("Inactive user"));
    }

    let role = user.role().ok_or_else(|| {
        tracing::error!(user_id = %user.id, role = %user.role, "user has unknown role");
        ApiError::internal("Account is misconfigured")
    })?;

    let ttl = state.config.access_token_expire_minutes;
    let access_token = tokens::issue_access_token(&state.config.secret_key, &user.id, role, ttl)
        .map_err(|_| ApiError::internal("Token signing failed"))?;

    tracing::info!(user_id = %user.id, role = %role, "user logged in");

    Ok(Json(TokenResponse {
        access_token,
        token_type: "bearer",
        expires_in: ttl * 60,
        ws_url: state.config.ws_url(),
    }))
}

// ---------------------------------------------------------------------------
// POST /api/v1/register
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, ToSchema)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub full_name: Option<String>,
    /// Defaults to `student`. `admin` cannot be self-assigned.
    pub role: Option<Role>,
}

pub(crate) fn validate_email(email: &str, errors: &mut Vec<FieldError>) {
    let valid = email.len() <= 255
        && email
            .split_once('@')
            .is_some_and(|(local, domain)| !local.is_empty() && domain.contains('.'));
    if !valid {
        errors.push(FieldError::new("email", "A valid email address is required"));
    }
}

pub(crate) fn validate_full_name(full_name: Option<&str>, errors: &mut Vec<FieldError>) {
    if full_name.is_some_and(|n| n.chars().count() > 100) {
        errors.push(FieldError::new(
            "full_name",
            "Full name must be 100 characters or fewer",
        ));
    }
}

#[utoipa::path(
    post,
    path = "/api/v1/register",
    tag = "Auth",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created", body = UserResponse),
        (status = 400, description = "Validation error", body = ApiErrorBody),
        (status = 403, description = "Role cannot be self-assigned", body = ApiErrorBody),
        (status = 409, description = "Email already registered", body = ApiErrorBody),
    ),
)]
pub async fn register(
    State(state): State<AppState>,
    Json(body): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<UserResponse>), ApiError> {
    let role = body.role.unwrap_or(Role::Student);
    if role == Role::Admin {
        return Err(ApiError::forbidden(
            "Admin accounts are provisioned with career-setup",
        ));
    }

    let email = body.email.trim().to_lowercase();
    let full_name = body
        .full_name
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty());

    let mut errors = Vec::new();
    validate_email(&email, &mut errors);
    validate_full_name(full_name, &mut errors);
    if body.password.chars().count() < MIN_PASSWORD_LEN {
        errors.push(FieldError::new(
            "password",
            format!("Password must be at least {MIN_PASSWORD_LEN} characters"),
        ));
    }
    ApiError::check(errors)?;

    let password_hash = password::hash_password(&body.password)?;
    let user_id = prefixed_ulid(prefix::USER);
    let now = Utc::now();

    let mut conn = state.db.get().await?;
    let user: User = diesel_async::RunQueryDsl::get_result(
        diesel::insert_into(users::table)
            .values(NewUser {
                id: &user_id,
                email: &email,
                password_hash: &password_hash,
                full_name,
                role: role.as_str(),
                is_active: true,
                created_at: now,
                updated_at: now,
            })
            .returning(User::as_returning()),
        &mut conn,
    )
    .await
    .map_err(|e| conflict_on_unique(e, "Email already registered"))?;

    tracing::info!(user_id = %user.id, role = %role, "user registered");

    Ok((StatusCode::CREATED, Json(UserResponse::from(user))))
}
