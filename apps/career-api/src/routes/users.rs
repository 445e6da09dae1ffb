//! The current user's own account.

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use diesel::prelude::*;
use serde::Deserialize;
use utoipa::ToSchema;

use crate::auth::middleware::AuthUser;
use crate::auth::password::{self, MIN_PASSWORD_LEN};
use crate::db::schema::users;
use crate::error::{conflict_on_unique, ApiError, ApiErrorBody, FieldError};
use crate::models::user::{UpdateUser, User, UserResponse};
use crate::routes::auth::{validate_email, validate_full_name};
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/users/me", get(get_me).put(update_me))
        .route("/users/change-password", post(change_password))
}

async fn load_user(state: &AppState, user_id: &str) -> Result<User, ApiError> {
    let mut conn = state.db.get().await?;
    diesel_async::RunQueryDsl::get_result(
        users::table.find(user_id).select(User::as_select()),
        &mut conn,
    )
    .await
    .map_err(|e| match e {
        diesel::result::Error::NotFound => ApiError::not_found("User not found"),
        other => other.into(),
    })
}

#[utoipa::path(
    get,
    path = "/api/v1/users/me",
    tag = "Users",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Current user", body = UserResponse),
        (status = 401, description = "Unauthorized", body = ApiErrorBody),
    ),
)]
pub async fn get_me(
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<UserResponse>, ApiError> {
    let user = load_user(&state, &auth.user_id).await?;
    Ok(Json(user.into()))
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateMeRequest {
    pub email: Option<String>,
    pub full_name: Option<String>,
}

#[utoipa::path(
    put,
    path = "/api/v1/users/me",
    tag = "Users",
    security(("bearer" = [])),
    request_body = UpdateMeRequest,
    responses(
        (status = 200, description = "Updated user", body = UserResponse),
        (status = 400, description = "Validation error", body = ApiErrorBody),
        (status = 409, description = "Email already registered", body = ApiErrorBody),
    ),
)]
pub async fn update_me(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(body): Json<UpdateMeRequest>,
) -> Result<Json<UserResponse>, ApiError> {
    let email = body.email.map(|e| e.trim().to_lowercase());
    let full_name = body.full_name.as_deref().map(str::trim);

    let mut errors = Vec::new();
    if let Some(email) = email.as_deref() {
        validate_email(email, &mut errors);
    }
    validate_full_name(full_name, &mut errors);
    ApiError::check(errors)?;

    let mut conn = state.db.get().await?;
    let user: User = diesel_async::RunQueryDsl::get_result(
        diesel::update(users::table.find(&auth.user_id))
            .set(UpdateUser {
                email: email.as_deref(),
                full_name,
                password_hash: None,
                updated_at: Utc::now(),
            })
            .returning(User::as_returning()),
        &mut conn,
    )
    .await
    .map_err(|e| conflict_on_unique(e, "Email already registered"))?;

    Ok(Json(user.into()))
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

#[utoipa::path(
    post,
    path = "/api/v1/users/change-password",
    tag = "Users",
    security(("bearer" = [])),
    request_body = ChangePasswordRequest,
    responses(
        (status = 204, description = "Password changed"),
        (status = 400, description = "Incorrect password or weak new password", body = ApiErrorBody),
    ),
)]
pub async fn change_password(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(body): Json<ChangePasswordRequest>,
) -> Result<StatusCode, ApiError> {
    if body.new_password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ApiError::validation(vec![FieldError::new(
            "new_password",
            format!("Password must be at least {MIN_PASSWORD_LEN} characters"),
        )]));
    }

    let user = load_user(&state, &auth.user_id).await?;
    if !password::verify_password(&body.current_password, &user.password_hash)? {
        return Err(ApiError::bad_request("Incorrect password"));
    }

    let new_hash = password::hash_password(&body.new_password)?;

    let mut conn = state.db.get().await?;
    diesel_async::RunQueryDsl::execute(
        diesel::update(users::table.find(&auth.user_id)).set(UpdateUser {
            email: None,
            full_name: None,
            password_hash: Some(&new_hash),
            updated_at: Utc::now(),
        }),
        &mut conn,
    )
    .await?;

    tracing::info!(user_id = %auth.user_id, "password changed");

    Ok(StatusCode::NO_CONTENT)
}
