use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::Serialize;
use utoipa::ToSchema;

use crate::db::schema::jobs;

/// An internship posting owned by the admin who created it.
#[derive(Debug, Clone, Queryable, Selectable, Serialize, ToSchema)]
#[diesel(table_name = jobs)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Job {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub requirements: String,
    pub job_type: Option<String>,
    pub department: Option<String>,
    pub admin_id: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = jobs)]
pub struct NewJob<'a> {
    pub id: i64,
    pub title: &'a str,
    pub description: &'a str,
    pub requirements: &'a str,
    pub job_type: Option<&'a str>,
    pub department: Option<&'a str>,
    pub admin_id: &'a str,
    pub created_at: DateTime<Utc>,
}
