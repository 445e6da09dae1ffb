//! Student projects and mentor reviews. Submissions are announced live to
//! online mentors; a review notifies the project's owner.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use diesel::prelude::*;
use diesel::result::OptionalExtension;
use diesel_async::{AsyncConnection, AsyncPgConnection};
use scoped_futures::ScopedFutureExt;
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};

use crate::auth::middleware::AuthUser;
use crate::db::schema::{projects, reviews};
use crate::error::{ApiError, ApiErrorBody, FieldError};
use crate::gateway::dispatch::Audience;
use crate::gateway::events::Event;
use crate::models::notification::{self, NotificationKind};
use crate::models::project::{
    NewProject, NewReview, Project, ProjectStatus, Review, ReviewVerdict,
};
use crate::models::user::Role;
use crate::routes::Pagination;
use crate::AppState;

const REVIEWERS: [Role; 2] = [Role::Mentor, Role::Admin];

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/projects", post(create_project).get(list_projects))
        .route("/projects/{project_id}", get(get_project))
        .route(
            "/projects/{project_id}/reviews",
            post(create_review).get(list_reviews),
        )
}

/// Loads a project the caller may see. Students only see their own.
async fn visible_project(
    conn: &mut AsyncPgConnection,
    auth: &AuthUser,
    project_id: i64,
) -> Result<Project, ApiError> {
    let project: Project = diesel_async::RunQueryDsl::get_result(
        projects::table.find(project_id).select(Project::as_select()),
        conn,
    )
    .await
    .optional()?
    .ok_or_else(|| ApiError::not_found("Project not found"))?;

    if auth.role == Role::Student && project.student_id != auth.user_id {
        return Err(ApiError::forbidden("Not enough permissions"));
    }
    Ok(project)
}

// ---------------------------------------------------------------------------
// POST /api/v1/projects
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateProjectRequest {
    pub title: String,
    pub description: String,
}

fn validate_project(body: &CreateProjectRequest) -> Result<(), ApiError> {
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

    ApiError::check(errors)
}

#[utoipa::path(
    post,
    path = "/api/v1/projects",
    tag = "Projects",
    security(("bearer" = [])),
    request_body = CreateProjectRequest,
    responses(
        (status = 201, description = "Project submitted", body = Project),
        (status = 400, description = "Validation error", body = ApiErrorBody),
        (status = 403, description = "Caller is not a student", body = ApiErrorBody),
    ),
)]
pub async fn create_project(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(body): Json<CreateProjectRequest>,
) -> Result<(StatusCode, Json<Project>), ApiError> {
    auth.require(Role::Student, "Only students can submit projects")?;
    validate_project(&body)?;

    let now = Utc::now();
    let mut conn = state.db.get().await?;
    let project: Project = diesel_async::RunQueryDsl::get_result(
        diesel::insert_into(projects::table)
            .values(NewProject {
                id: state.snowflake.generate(),
                title: body.title.trim(),
                description: body.description.trim(),
                status: ProjectStatus::Pending.as_str(),
                student_id: &auth.user_id,
                created_at: now,
                updated_at: now,
            })
            .returning(Project::as_returning()),
        &mut conn,
    )
    .await?;

    tracing::info!(project_id = project.id, student_id = %auth.user_id, "project submitted");

    // Live only: mentors who are offline pick submissions up from the list.
    let event = Event::project_submitted(project.id, &project.title, auth.display_name());
    state.events.publish(Audience::Role(Role::Mentor), event);

    Ok((StatusCode::CREATED, Json(project)))
}

// ---------------------------------------------------------------------------
// GET /api/v1/projects
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, IntoParams)]
pub struct ProjectFilters {
    /// `pending`, `approved` or `rejected`.
    pub status: Option<String>,
}

#[utoipa::path(
    get,
    path = "/api/v1/projects",
    tag = "Projects",
    security(("bearer" = [])),
    params(Pagination, ProjectFilters),
    responses(
        (status = 200, description = "Projects, newest first", body = [Project]),
        (status = 400, description = "Unknown status filter", body = ApiErrorBody),
    ),
)]
pub async fn list_projects(
    auth: AuthUser,
    State(state): State<AppState>,
    Query(page): Query<Pagination>,
    Query(filters): Query<ProjectFilters>,
) -> Result<Json<Vec<Project>>, ApiError> {
    let (offset, limit) = page.bounds();

    let mut query = projects::table.select(Project::as_select()).into_boxed();
    if auth.role == Role::Student {
        query = query.filter(projects::student_id.eq(auth.user_id.clone()));
    }
    if let Some(raw) = filters.status.as_deref() {
        let status = ProjectStatus::parse(raw)
            .ok_or_else(|| ApiError::bad_request(format!("Unknown project status: {raw}")))?;
        query = query.filter(projects::status.eq(status.as_str()));
    }

    let mut conn = state.db.get().await?;
    let rows: Vec<Project> = diesel_async::RunQueryDsl::load(
        query
            .order((projects::created_at.desc(), projects::id.desc()))
            .offset(offset)
            .limit(limit),
        &mut conn,
    )
    .await?;

    Ok(Json(rows))
}

// ---------------------------------------------------------------------------
// GET /api/v1/projects/{project_id}
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/api/v1/projects/{project_id}",
    tag = "Projects",
    security(("bearer" = [])),
    params(("project_id" = i64, Path, description = "Project ID")),
    responses(
        (status = 200, description = "Project", body = Project),
        (status = 403, description = "Project belongs to another student", body = ApiErrorBody),
        (status = 404, description = "Project not found", body = ApiErrorBody),
    ),
)]
pub async fn get_project(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(project_id): Path<i64>,
) -> Result<Json<Project>, ApiError> {
    let mut conn = state.db.get().await?;
    let project = visible_project(&mut conn, &auth, project_id).await?;
    Ok(Json(project))
}

// ---------------------------------------------------------------------------
// POST /api/v1/projects/{project_id}/reviews
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateReviewRequest {
    pub comments: String,
    pub verdict: ReviewVerdict,
}

fn validate_review(body: &CreateReviewRequest) -> Result<(), ApiError> {
    let mut errors = Vec::new();
    if body.comments.trim().is_empty() {
        errors.push(FieldError::new("comments", "Comments are required"));
    }
    ApiError::check(errors)
}

#[utoipa::path(
    post,
    path = "/api/v1/projects/{project_id}/reviews",
    tag = "Projects",
    security(("bearer" = [])),
    params(("project_id" = i64, Path, description = "Project ID")),
    request_body = CreateReviewRequest,
    responses(
        (status = 201, description = "Review recorded", body = Review),
        (status = 400, description = "Validation error", body = ApiErrorBody),
        (status = 403, description = "Caller is not a mentor or admin", body = ApiErrorBody),
        (status = 404, description = "Project not found", body = ApiErrorBody),
    ),
)]
pub async fn create_review(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(project_id): Path<i64>,
    Json(body): Json<CreateReviewRequest>,
) -> Result<(StatusCode, Json<Review>), ApiError> {
    auth.require_any(&REVIEWERS, "Only mentors can review projects")?;
    validate_review(&body)?;

    let now = Utc::now();
    let review_id = state.snowflake.generate();
    let ids = &state.snowflake;
    let mentor_id = auth.user_id.as_str();
    let comments = body.comments.trim();
    let verdict = body.verdict;
    let status = verdict.resulting_status();

    let mut conn = state.db.get().await?;

    let (review, project) = conn
        .transaction::<_, ApiError, _>(|conn| {
            async move {
                let project: Project = diesel_async::RunQueryDsl::get_result(
                    diesel::update(projects::table.find(project_id))
                        .set((
                            projects::status.eq(status.as_str()),
                            projects::updated_at.eq(now),
                        ))
                        .returning(Project::as_returning()),
                    conn,
                )
                .await
                .optional()?
                .ok_or_else(|| ApiError::not_found("Project not found"))?;

                let review: Review = diesel_async::RunQueryDsl::get_result(
                    diesel::insert_into(reviews::table)
                        .values(NewReview {
                            id: review_id,
                            project_id,
                            mentor_id,
                            comments,
                            verdict: verdict.as_str(),
                            created_at: now,
                        })
                        .returning(Review::as_returning()),
                    conn,
                )
                .await?;

                let kind = match verdict {
                    ReviewVerdict::Approved => NotificationKind::Success,
                    ReviewVerdict::Rejected => NotificationKind::Error,
                    ReviewVerdict::ChangesRequested => NotificationKind::Warning,
                };
                notification::record(
                    conn,
                    ids,
                    std::slice::from_ref(&project.student_id),
                    &format!("Your project '{}' was reviewed: {}", project.title, verdict),
                    kind,
                )
                .await?;

                Ok((review, project))
            }
            .scope_boxed()
        })
        .await?;

    tracing::info!(
        project_id,
        review_id = review.id,
        mentor_id = %auth.user_id,
        verdict = %verdict,
        "project reviewed"
    );

    let event = Event::project_reviewed(project.id, review.id, verdict, status);
    state.events.publish(Audience::User(project.student_id), event);

    Ok((StatusCode::CREATED, Json(review)))
}

// ---------------------------------------------------------------------------
// GET /api/v1/projects/{project_id}/reviews
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/api/v1/projects/{project_id}/reviews",
    tag = "Projects",
    security(("bearer" = [])),
    params(("project_id" = i64, Path, description = "Project ID")),
    responses(
        (status = 200, description = "Reviews, oldest first", body = [Review]),
        (status = 403, description = "Project belongs to another student", body = ApiErrorBody),
        (status = 404, description = "Project not found", body = ApiErrorBody),
    ),
)]
pub async fn list_reviews(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(project_id): Path<i64>,
) -> Result<Json<Vec<Review>>, ApiError> {
    let mut conn = state.db.get().await?;
    visible_project(&mut conn, &auth, project_id).await?;

    let rows: Vec<Review> = diesel_async::RunQueryDsl::load(
        reviews::table
            .filter(reviews::project_id.eq(project_id))
            .select(Review::as_select())
            .order((reviews::created_at.asc(), reviews::id.asc())),
        &mut conn,
    )
    .await?;

    Ok(Json(rows))
}
