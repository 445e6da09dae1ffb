//! The caller's durable notifications.

use axum::extract::{Path, Query, State};
use axum::routing::{get, put};
use axum::{Json, Router};
use diesel::prelude::*;
use diesel::result::OptionalExtension;
use serde::Serialize;
use utoipa::ToSchema;

use crate::auth::middleware::AuthUser;
use crate::db::schema::notifications;
use crate::error::{ApiError, ApiErrorBody};
use crate::models::notification::Notification;
use crate::routes::Pagination;
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/notifications", get(list_notifications))
        .route("/notifications/read-all", put(mark_all_read))
        .route("/notifications/{id}/read", put(mark_read))
}

#[utoipa::path(
    get,
    path = "/api/v1/notifications",
    tag = "Notifications",
    security(("bearer" = [])),
    params(Pagination),
    responses(
        (status = 200, description = "Notifications, newest first", body = [Notification]),
        (status = 401, description = "Unauthorized", body = ApiErrorBody),
    ),
)]
pub async fn list_notifications(
    auth: AuthUser,
    State(state): State<AppState>,
    Query(page): Query<Pagination>,
) -> Result<Json<Vec<Notification>>, ApiError> {
    let (offset, limit) = page.bounds();

    let mut conn = state.db.get().await?;
    let rows: Vec<Notification> = diesel_async::RunQueryDsl::load(
        notifications::table
            .filter(notifications::recipient_id.eq(&auth.user_id))
            .order((notifications::created_at.desc(), notifications::id.desc()))
            .offset(offset)
            .limit(limit)
            .select(Notification::as_select()),
        &mut conn,
    )
    .await?;

    Ok(Json(rows))
}

#[utoipa::path(
    put,
    path = "/api/v1/notifications/{id}/read",
    tag = "Notifications",
    security(("bearer" = [])),
    params(("id" = i64, Path, description = "Notification ID")),
    responses(
        (status = 200, description = "Notification marked read", body = Notification),
        (status = 403, description = "Not the recipient", body = ApiErrorBody),
        (status = 404, description = "Notification not found", body = ApiErrorBody),
    ),
)]
pub async fn mark_read(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Notification>, ApiError> {
    let mut conn = state.db.get().await?;

    let recipient: String = diesel_async::RunQueryDsl::get_result(
        notifications::table
            .find(id)
            .select(notifications::recipient_id),
        &mut conn,
    )
    .await
    .optional()?
    .ok_or_else(|| ApiError::not_found("Notification not found"))?;

    if recipient != auth.user_id {
        return Err(ApiError::forbidden("Not your notification"));
    }

    let updated: Notification = diesel_async::RunQueryDsl::get_result(
        diesel::update(notifications::table.find(id))
            .set(notifications::is_read.eq(true))
            .returning(Notification::as_returning()),
        &mut conn,
    )
    .await?;

    Ok(Json(updated))
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ReadAllResponse {
    /// Notifications that changed from unread to read.
    pub updated: usize,
}

#[utoipa::path(
    put,
    path = "/api/v1/notifications/read-all",
    tag = "Notifications",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "All notifications marked read", body = ReadAllResponse),
        (status = 401, description = "Unauthorized", body = ApiErrorBody),
    ),
)]
pub async fn mark_all_read(
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<ReadAllResponse>, ApiError> {
    let mut conn = state.db.get().await?;
    let updated = diesel_async::RunQueryDsl::execute(
        diesel::update(
            notifications::table
                .filter(notifications::recipient_id.eq(&auth.user_id))
                .filter(notifications::is_read.eq(false)),
        )
        .set(notifications::is_read.eq(true)),
        &mut conn,
    )
    .await?;

    Ok(Json(ReadAllResponse { updated }))
}
