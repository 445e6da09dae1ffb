pub mod applications;
pub mod auth;
pub mod health;
pub mod jobs;
pub mod notifications;
pub mod profiles;
pub mod projects;
pub mod users;

use axum::Router;
use serde::Deserialize;
use utoipa::openapi::security::{Http, HttpAuthScheme, SecurityScheme};
use utoipa::{IntoParams, Modify, OpenApi};

use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new().merge(health::router()).nest(
        "/api/v1",
        auth::router()
            .merge(users::router())
            .merge(jobs::router())
            .merge(applications::router())
            .merge(notifications::router())
            .merge(profiles::router())
            .merge(projects::router())
            .merge(crate::gateway::server::router()),
    )
}

const DEFAULT_PAGE_SIZE: i64 = 100;
const MAX_PAGE_SIZE: i64 = 100;

/// `skip`/`limit` query parameters shared by list endpoints.
#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct Pagination {
    /// Rows to skip (default 0).
    pub skip: Option<i64>,
    /// Rows to return (1-100, default 100).
    pub limit: Option<i64>,
}

impl Pagination {
    /// Clamped `(offset, limit)`.
    pub fn bounds(&self) -> (i64, i64) {
        let offset = self.skip.unwrap_or(0).max(0);
        let limit = self
            .limit
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE);
        (offset, limit)
    }
}

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                SecurityScheme::Http(Http::new(HttpAuthScheme::Bearer)),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health,
        auth::login,
        auth::register,
        users::get_me,
        users::update_me,
        users::change_password,
        jobs::create_job,
        jobs::list_jobs,
        jobs::get_job,
        applications::apply,
        applications::admin_list,
        applications::my_applications,
        applications::update_status,
        notifications::list_notifications,
        notifications::mark_read,
        notifications::mark_all_read,
        profiles::get_my_profile,
        profiles::upsert_my_profile,
        profiles::get_profile,
        projects::create_project,
        projects::list_projects,
        projects::get_project,
        projects::create_review,
        projects::list_reviews,
    ),
    components(
        schemas(
            crate::error::ApiErrorBody,
            crate::error::ApiErrorDetail,
            crate::error::FieldError,
            crate::models::user::Role,
            crate::models::user::UserResponse,
            crate::models::job::Job,
            crate::models::application::Application,
            crate::models::application::ApplicationStatus,
            crate::models::application::ApplicationDetail,
            crate::models::application::ApplicantSummary,
            crate::models::application::StudentApplication,
            crate::models::notification::Notification,
            crate::models::notification::NotificationKind,
            crate::models::student_profile::StudentProfile,
            crate::models::project::Project,
            crate::models::project::ProjectStatus,
            crate::models::project::Review,
            crate::models::project::ReviewVerdict,
            health::HealthResponse,
            auth::LoginForm,
            auth::TokenResponse,
            auth::RegisterRequest,
            users::UpdateMeRequest,
            users::ChangePasswordRequest,
            jobs::CreateJobRequest,
            applications::UpdateStatusRequest,
            notifications::ReadAllResponse,
            profiles::UpsertProfileRequest,
            projects::CreateProjectRequest,
            projects::CreateReviewRequest,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Health check"),
        (name = "Auth", description = "Login and registration"),
        (name = "Users", description = "Current user account"),
        (name = "Jobs", description = "Internship postings"),
        (name = "Applications", description = "Job applications"),
        (name = "Notifications", description = "Durable notifications"),
        (name = "Profiles", description = "Student profiles"),
        (name = "Projects", description = "Student projects and mentor reviews"),
    )
)]
pub struct ApiDoc;
