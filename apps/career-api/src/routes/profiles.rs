//! Student portfolio profiles.

use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use diesel::prelude::*;
use diesel::result::OptionalExtension;
use serde::Deserialize;
use utoipa::ToSchema;

use crate::auth::middleware::AuthUser;
use crate::db::schema::student_profiles;
use crate::error::{ApiError, ApiErrorBody, FieldError};
use crate::models::student_profile::{StudentProfile, UpsertStudentProfile};
use crate::models::user::Role;
use crate::AppState;

const MAX_SKILLS: usize = 50;
const MAX_SKILL_LEN: usize = 50;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/profiles/me", get(get_my_profile).put(upsert_my_profile))
        .route("/profiles/{user_id}", get(get_profile))
}

async fn find_profile(state: &AppState, user_id: &str) -> Result<StudentProfile, ApiError> {
    let mut conn = state.db.get().await?;
    diesel_async::RunQueryDsl::get_result(
        student_profiles::table
            .find(user_id)
            .select(StudentProfile::as_select()),
        &mut conn,
    )
    .await
    .optional()?
    .ok_or_else(|| ApiError::not_found("Profile not found"))
}

#[utoipa::path(
    get,
    path = "/api/v1/profiles/me",
    tag = "Profiles",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "The caller's profile", body = StudentProfile),
        (status = 404, description = "No profile yet", body = ApiErrorBody),
    ),
)]
pub async fn get_my_profile(
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<StudentProfile>, ApiError> {
    find_profile(&state, &auth.user_id).await.map(Json)
}

#[utoipa::path(
    get,
    path = "/api/v1/profiles/{user_id}",
    tag = "Profiles",
    security(("bearer" = [])),
    params(("user_id" = String, Path, description = "User ID")),
    responses(
        (status = 200, description = "Profile", body = StudentProfile),
        (status = 404, description = "Profile not found", body = ApiErrorBody),
    ),
)]
pub async fn get_profile(
    _auth: AuthUser,
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<StudentProfile>, ApiError> {
    find_profile(&state, &user_id).await.map(Json)
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpsertProfileRequest {
    pub github_url: Option<String>,
    pub linkedin_url: Option<String>,
    pub portfolio_url: Option<String>,
    #[serde(default)]
    pub skills: Vec<String>,
}

fn clean_url<'a>(
    field: &str,
    value: Option<&'a str>,
    errors: &mut Vec<FieldError>,
) -> Option<&'a str> {
    let value = value.map(str::trim).filter(|v| !v.is_empty())?;
    if !(value.starts_with("https://") || value.starts_with("http://")) || value.len() > 500 {
        errors.push(FieldError::new(field, "Must be an http(s) URL"));
    }
    Some(value)
}

/// Trim, drop blanks and case-insensitive duplicates, keep first-seen order.
fn clean_skills(skills: &[String], errors: &mut Vec<FieldError>) -> Vec<String> {
    let mut cleaned: Vec<String> = Vec::new();
    for skill in skills.iter().map(|s| s.trim()).filter(|s| !s.is_empty()) {
        if skill.chars().count() > MAX_SKILL_LEN {
            errors.push(FieldError::new(
                "skills",
                format!("Skills must be {MAX_SKILL_LEN} characters or fewer"),
            ));
            break;
        }
        if !cleaned.iter().any(|s| s.eq_ignore_ascii_case(skill)) {
            cleaned.push(skill.to_string());
        }
    }
    if cleaned.len() > MAX_SKILLS {
        errors.push(FieldError::new(
            "skills",
            format!("At most {MAX_SKILLS} skills are allowed"),
        ));
    }
    cleaned
}

#[utoipa::path(
    put,
    path = "/api/v1/profiles/me",
    tag = "Profiles",
    security(("bearer" = [])),
    request_body = UpsertProfileRequest,
    responses(
        (status = 200, description = "Profile saved", body = StudentProfile),
        (status = 400, description = "Validation error", body = ApiErrorBody),
        (status = 403, description = "Caller is not a student", body = ApiErrorBody),
    ),
)]
pub async fn upsert_my_profile(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(body): Json<UpsertProfileRequest>,
) -> Result<Json<StudentProfile>, ApiError> {
    auth.require(Role::Student, "Only students have profiles")?;

    let mut errors = Vec::new();
    let github_url = clean_url("github_url", body.github_url.as_deref(), &mut errors);
    let linkedin_url = clean_url("linkedin_url", body.linkedin_url.as_deref(), &mut errors);
    let portfolio_url = clean_url("portfolio_url", body.portfolio_url.as_deref(), &mut errors);
    let skills = clean_skills(&body.skills, &mut errors);
    ApiError::check(errors)?;

    let row = UpsertStudentProfile {
        user_id: &auth.user_id,
        github_url,
        linkedin_url,
        portfolio_url,
        skills: &skills,
        updated_at: Utc::now(),
    };

    let mut conn = state.db.get().await?;
    let profile: StudentProfile = diesel_async::RunQueryDsl::get_result(
        diesel::insert_into(student_profiles::table)
            .values(&row)
            .on_conflict(student_profiles::user_id)
            .do_update()
            .set(&row)
            .returning(StudentProfile::as_returning()),
        &mut conn,
    )
    .await?;

    Ok(Json(profile))
}
