//! Applying to jobs and moving applications through review.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use chrono::Utc;
use diesel::prelude::*;
use diesel::result::OptionalExtension;
use diesel_async::AsyncConnection;
use scoped_futures::ScopedFutureExt;
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};

use crate::auth::middleware::AuthUser;
use crate::db::schema::{applications, jobs, users};
use crate::error::{conflict_on_unique, ApiError, ApiErrorBody};
use crate::gateway::dispatch::Audience;
use crate::gateway::events::Event;
use crate::models::application::{
    ApplicantSummary, Application, ApplicationDetail, ApplicationStatus, NewApplication,
    StudentApplication,
};
use crate::models::job::Job;
use crate::models::notification::{self, NotificationKind};
use crate::models::user::Role;
use crate::routes::Pagination;
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/applications/{id}/apply", post(apply))
        .route("/applications/admin/list", get(admin_list))
        .route("/applications/my-applications", get(my_applications))
        .route("/applications/{id}/status", put(update_status))
}

// ---------------------------------------------------------------------------
// POST /api/v1/applications/{id}/apply
// ---------------------------------------------------------------------------

#[utoipa::path(
    post,
    path = "/api/v1/applications/{id}/apply",
    tag = "Applications",
    security(("bearer" = [])),
    params(("id" = i64, Path, description = "ID of the job to apply for")),
    responses(
        (status = 201, description = "Application submitted", body = Application),
        (status = 403, description = "Caller is not a student", body = ApiErrorBody),
        (status = 404, description = "Job not found", body = ApiErrorBody),
        (status = 409, description = "Already applied", body = ApiErrorBody),
    ),
)]
pub async fn apply(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(job_id): Path<i64>,
) -> Result<(StatusCode, Json<Application>), ApiError> {
    auth.require(Role::Student, "Only students can apply for jobs")?;

    let mut conn = state.db.get().await?;

    let job: Job = diesel_async::RunQueryDsl::get_result(
        jobs::table.find(job_id).select(Job::as_select()),
        &mut conn,
    )
    .await
    .optional()?
    .ok_or_else(|| ApiError::not_found("Job not found"))?;

    let now = Utc::now();
    let application_id = state.snowflake.generate();
    let ids = &state.snowflake;
    let student_id = auth.user_id.as_str();
    let student_name = auth.display_name();
    let message = format!("{student_name} applied for {}", job.title);
    let admin = [job.admin_id.clone()];

    let application = conn
        .transaction::<_, ApiError, _>(|conn| {
            async move {
                let application: Application = diesel_async::RunQueryDsl::get_result(
                    diesel::insert_into(applications::table)
                        .values(NewApplication {
                            id: application_id,
                            job_id,
                            student_id,
                            status: ApplicationStatus::Applied.as_str(),
                            created_at: now,
                            updated_at: now,
                        })
                        .returning(Application::as_returning()),
                    conn,
                )
                .await
                .map_err(|e| conflict_on_unique(e, "You have already applied for this job"))?;

                notification::record(conn, ids, &admin, &message, NotificationKind::Info).await?;

                Ok(application)
            }
            .scope_boxed()
        })
        .await?;

    tracing::info!(
        application_id = application.id,
        job_id,
        student_id = %auth.user_id,
        "application submitted"
    );

    state.events.publish(
        Audience::User(job.admin_id.clone()),
        Event::application_submitted(job.id, &job.title, student_name, application.id),
    );

    Ok((StatusCode::CREATED, Json(application)))
}

// ---------------------------------------------------------------------------
// GET /api/v1/applications/admin/list
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, IntoParams)]
pub struct AdminListFilters {
    pub job_id: Option<i64>,
    pub status: Option<ApplicationStatus>,
}

#[utoipa::path(
    get,
    path = "/api/v1/applications/admin/list",
    tag = "Applications",
    security(("bearer" = [])),
    params(Pagination, AdminListFilters),
    responses(
        (status = 200, description = "Applications with applicant details", body = [ApplicationDetail]),
        (status = 403, description = "Caller is not an admin", body = ApiErrorBody),
    ),
)]
pub async fn admin_list(
    auth: AuthUser,
    State(state): State<AppState>,
    Query(page): Query<Pagination>,
    Query(filters): Query<AdminListFilters>,
) -> Result<Json<Vec<ApplicationDetail>>, ApiError> {
    auth.require(Role::Admin, "Only admins can list applications")?;
    let (offset, limit) = page.bounds();

    let mut query = applications::table
        .inner_join(jobs::table.on(jobs::id.eq(applications::job_id)))
        .inner_join(users::table.on(users::id.eq(applications::student_id)))
        .select((
            Application::as_select(),
            jobs::title,
            users::email,
            users::full_name,
        ))
        .into_boxed();
    if let Some(job_id) = filters.job_id {
        query = query.filter(applications::job_id.eq(job_id));
    }
    if let Some(status) = filters.status {
        query = query.filter(applications::status.eq(status.as_str()));
    }

    let mut conn = state.db.get().await?;
    let rows: Vec<(Application, String, String, Option<String>)> =
        diesel_async::RunQueryDsl::load(
            query
                .order((applications::created_at.desc(), applications::id.desc()))
                .offset(offset)
                .limit(limit),
            &mut conn,
        )
        .await?;

    let details = rows
        .into_iter()
        .map(|(app, job_title, email, full_name)| ApplicationDetail {
            id: app.id,
            job_id: app.job_id,
            job_title,
            status: app.status,
            student: ApplicantSummary {
                id: app.student_id,
                email,
                full_name,
            },
            created_at: app.created_at,
            updated_at: app.updated_at,
        })
        .collect();

    Ok(Json(details))
}

// ---------------------------------------------------------------------------
// GET /api/v1/applications/my-applications
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/api/v1/applications/my-applications",
    tag = "Applications",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "The caller's applications, newest first", body = [StudentApplication]),
        (status = 401, description = "Unauthorized", body = ApiErrorBody),
    ),
)]
pub async fn my_applications(
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<StudentApplication>>, ApiError> {
    let mut conn = state.db.get().await?;
    let rows: Vec<(Application, String, Option<String>)> = diesel_async::RunQueryDsl::load(
        applications::table
            .inner_join(jobs::table.on(jobs::id.eq(applications::job_id)))
            .filter(applications::student_id.eq(&auth.user_id))
            .select((Application::as_select(), jobs::title, jobs::department))
            .order((applications::created_at.desc(), applications::id.desc())),
        &mut conn,
    )
    .await?;

    let apps = rows
        .into_iter()
        .map(|(app, job_title, department)| StudentApplication {
            id: app.id,
            job_id: app.job_id,
            job_title,
            department,
            status: app.status,
            created_at: app.created_at,
            updated_at: app.updated_at,
        })
        .collect();

    Ok(Json(apps))
}

// ---------------------------------------------------------------------------
// PUT /api/v1/applications/{id}/status
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateStatusRequest {
    pub status: ApplicationStatus,
}

fn status_message(job_title: &str, status: ApplicationStatus) -> (String, NotificationKind) {
    let kind = match status {
        ApplicationStatus::Accepted => NotificationKind::Success,
        ApplicationStatus::Rejected => NotificationKind::Warning,
        ApplicationStatus::Applied | ApplicationStatus::Shortlisted => NotificationKind::Info,
    };
    (
        format!("Your application for {job_title} is now {status}"),
        kind,
    )
}

#[utoipa::path(
    put,
    path = "/api/v1/applications/{id}/status",
    tag = "Applications",
    security(("bearer" = [])),
    params(("id" = i64, Path, description = "Application ID")),
    request_body = UpdateStatusRequest,
    responses(
        (status = 200, description = "Status updated", body = Application),
        (status = 403, description = "Caller does not own the job", body = ApiErrorBody),
        (status = 404, description = "Application not found", body = ApiErrorBody),
    ),
)]
pub async fn update_status(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(application_id): Path<i64>,
    Json(body): Json<UpdateStatusRequest>,
) -> Result<Json<Application>, ApiError> {
    auth.require(Role::Admin, "Only admins can update application status")?;

    let mut conn = state.db.get().await?;

    let (application, job): (Application, Job) = diesel_async::RunQueryDsl::get_result(
        applications::table
            .inner_join(jobs::table.on(jobs::id.eq(applications::job_id)))
            .filter(applications::id.eq(application_id))
            .select((Application::as_select(), Job::as_select())),
        &mut conn,
    )
    .await
    .optional()?
    .ok_or_else(|| ApiError::not_found("Application not found"))?;

    if job.admin_id != auth.user_id {
        return Err(ApiError::forbidden(
            "Only the admin who posted this job can update its applications",
        ));
    }

    let status = body.status;
    let ids = &state.snowflake;
    let student = [application.student_id.clone()];
    let (message, kind) = status_message(&job.title, status);

    let updated = conn
        .transaction::<_, ApiError, _>(|conn| {
            async move {
                let updated: Application = diesel_async::RunQueryDsl::get_result(
                    diesel::update(applications::table.find(application_id))
                        .set((
                            applications::status.eq(status.as_str()),
                            applications::updated_at.eq(Utc::now()),
                        ))
                        .returning(Application::as_returning()),
                    conn,
                )
                .await?;

                notification::record(conn, ids, &student, &message, kind).await?;

                Ok(updated)
            }
            .scope_boxed()
        })
        .await?;

    tracing::info!(
        application_id,
        job_id = job.id,
        status = %status,
        "application status updated"
    );

    state.events.publish(
        Audience::User(updated.student_id.clone()),
        Event::status_updated(updated.id, status, updated.job_id, &updated.student_id),
    );

    Ok(Json(updated))
}
