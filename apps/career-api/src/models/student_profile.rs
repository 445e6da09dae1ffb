use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::Serialize;
use utoipa::ToSchema;

use crate::db::schema::student_profiles;

#[derive(Debug, Clone, Queryable, Selectable, Serialize, ToSchema)]
#[diesel(table_name = student_profiles)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct StudentProfile {
    pub user_id: String,
    pub github_url: Option<String>,
    pub linkedin_url: Option<String>,
    pub portfolio_url: Option<String>,
    pub skills: Vec<String>,
    pub updated_at: DateTime<Utc>,
}

/// Insert-or-replace row for `PUT /profiles/me`.
#[derive(Debug, Insertable, AsChangeset)]
#[diesel(table_name = student_profiles)]
#[diesel(primary_key(user_id))]
#[diesel(treat_none_as_null = true)]
pub struct UpsertStudentProfile<'a> {
    pub user_id: &'a str,
    pub github_url: Option<&'a str>,
    pub linkedin_url: Option<&'a str>,
    pub portfolio_url: Option<&'a str>,
    pub skills: &'a [String],
    pub updated_at: DateTime<Utc>,
}
