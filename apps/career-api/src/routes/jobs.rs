//! Internship postings. Posting a job notifies every active student.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use diesel::prelude::*;
use diesel::result::OptionalExtension;
use diesel_async::AsyncConnection;
use scoped_futures::ScopedFutureExt;
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};

use crate::auth::middleware::AuthUser;
use crate::db::schema::{jobs, users};
use crate::error::{ApiError, ApiErrorBody, FieldError};
use crate::gateway::dispatch::Audience;
use crate::gateway::events::Event;
use crate::models::job::{Job, NewJob};
use crate::models::notification::{self, NotificationKind};
use crate::models::user::Role;
use crate::routes::Pagination;
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/jobs", post(create_job).get(list_jobs))
        .route("/jobs/{job_id}", get(get_job))
}

// ---------------------------------------------------------------------------
// POST /api/v1/jobs
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateJobRequest {
    pub title: String,
    pub description: String,
    pub requirements: String,
    pub job_type: Option<String>,
    pub department: Option<String>,
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn validate_job(body: &CreateJobRequest) -> Result<(), ApiError> {
    let mut errors = Vec::new();

    let title = body.title.trim();
    if title.is_empty() {
        errors.push(FieldError::new("title", "Title is required"));
    } else if title.chars().count() > 200 {
        errors.push(FieldError::new("title", "Title must be 200 characters or fewer"));
    }
    if body.description.trim().is_empty() {
        errors.push(FieldError::new("description", "Description is required"));
    }
    if body.requirements.trim().is_empty() {
        errors.push(FieldError::new("requirements", "Requirements are required"));
    }

    ApiError::check(errors)
}

#[utoipa::path(
    post,
    path = "/api/v1/jobs",
    tag = "Jobs",
    security(("bearer" = [])),
    request_body = CreateJobRequest,
    responses(
        (status = 201, description = "Job posted", body = Job),
        (status = 400, description = "Validation error", body = ApiErrorBody),
        (status = 403, description = "Caller is not an admin", body = ApiErrorBody),
    ),
)]
pub async fn create_job(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(body): Json<CreateJobRequest>,
) -> Result<(StatusCode, Json<Job>), ApiError> {
    auth.require(Role::Admin, "Only admins can post jobs")?;
    validate_job(&body)?;

    let now = Utc::now();
    let job_id = state.snowflake.generate();
    let ids = &state.snowflake;
    let admin_id = auth.user_id.as_str();

    let mut conn = state.db.get().await?;

    let (job, students) = conn
        .transaction::<_, ApiError, _>(|conn| {
            async move {
                let job: Job = diesel_async::RunQueryDsl::get_result(
                    diesel::insert_into(jobs::table)
                        .values(NewJob {
                            id: job_id,
                            title: body.title.trim(),
                            description: body.description.trim(),
                            requirements: body.requirements.trim(),
                            job_type: non_empty(body.job_type.as_deref()),
                            department: non_empty(body.department.as_deref()),
                            admin_id,
                            created_at: now,
                        })
                        .returning(Job::as_returning()),
                    conn,
                )
                .await?;

                let students: Vec<String> = diesel_async::RunQueryDsl::load(
                    users::table
                        .filter(users::role.eq(Role::Student.as_str()))
                        .filter(users::is_active.eq(true))
                        .select(users::id),
                    conn,
                )
                .await?;

                notification::record(
                    conn,
                    ids,
                    &students,
                    &format!("New job posted: {}", job.title),
                    NotificationKind::Info,
                )
                .await?;

                Ok((job, students))
            }
            .scope_boxed()
        })
        .await?;

    tracing::info!(
        job_id = job.id,
        admin_id = %auth.user_id,
        students = students.len(),
        "job posted"
    );

    let event = Event::job_posted(&job);
    state.events.publish(Audience::Users(students), event);

    Ok((StatusCode::CREATED, Json(job)))
}

// ---------------------------------------------------------------------------
// GET /api/v1/jobs
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, IntoParams)]
pub struct JobFilters {
    pub job_type: Option<String>,
    pub department: Option<String>,
}

#[utoipa::path(
    get,
    path = "/api/v1/jobs",
    tag = "Jobs",
    security(("bearer" = [])),
    params(Pagination, JobFilters),
    responses(
        (status = 200, description = "Jobs, newest first", body = [Job]),
        (status = 401, description = "Unauthorized", body = ApiErrorBody),
    ),
)]
pub async fn list_jobs(
    _auth: AuthUser,
    State(state): State<AppState>,
    Query(page): Query<Pagination>,
    Query(filters): Query<JobFilters>,
) -> Result<Json<Vec<Job>>, ApiError> {
    let (offset, limit) = page.bounds();

    let mut query = jobs::table.select(Job::as_select()).into_boxed();
    if let Some(job_type) = non_empty(filters.job_type.as_deref()) {
        query = query.filter(jobs::job_type.eq(job_type.to_string()));
    }
    if let Some(department) = non_empty(filters.department.as_deref()) {
        query = query.filter(jobs::department.eq(department.to_string()));
    }

    let mut conn = state.db.get().await?;
    let rows: Vec<Job> = diesel_async::RunQueryDsl::load(
        query
            .order((jobs::created_at.desc(), jobs::id.desc()))
            .offset(offset)
            .limit(limit),
        &mut conn,
    )
    .await?;

    Ok(Json(rows))
}

// ---------------------------------------------------------------------------
// GET /api/v1/jobs/{job_id}
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/api/v1/jobs/{job_id}",
    tag = "Jobs",
    security(("bearer" = [])),
    params(("job_id" = i64, Path, description = "Job ID")),
    responses(
        (status = 200, description = "Job", body = Job),
        (status = 404, description = "Job not found", body = ApiErrorBody),
    ),
)]
pub async fn get_job(
    _auth: AuthUser,
    State(state): State<AppState>,
    Path(job_id): Path<i64>,
) -> Result<Json<Job>, ApiError> {
    let mut conn = state.db.get().await?;
    let job: Job = diesel_async::RunQueryDsl::get_result(
        jobs::table.find(job_id).select(Job::as_select()),
        &mut conn,
    )
    .await
    .optional()?
    .ok_or_else(|| ApiError::not_found("Job not found"))?;

    Ok(Json(job))
}
