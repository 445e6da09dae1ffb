use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use career_common::SnowflakeGenerator;

use crate::db::schema::notifications;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Info,
    Success,
    Warning,
    Error,
}

impl NotificationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            NotificationKind::Info => "info",
            NotificationKind::Success => "success",
            NotificationKind::Warning => "warning",
            NotificationKind::Error => "error",
        }
    }
}

#[derive(Debug, Clone, Queryable, Selectable, Serialize, ToSchema)]
#[diesel(table_name = notifications)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Notification {
    pub id: i64,
    pub recipient_id: String,
    pub message: String,
    pub kind: String,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = notifications)]
pub struct NewNotification<'a> {
    pub id: i64,
    pub recipient_id: &'a str,
    pub message: &'a str,
    pub kind: &'a str,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

/// Durably record one notification per recipient.
///
/// Meant to run inside the same transaction as the state change it
/// describes, so a committed change always has its notification rows.
pub async fn record(
    conn: &mut AsyncPgConnection,
    ids: &SnowflakeGenerator,
    recipients: &[String],
    message: &str,
    kind: NotificationKind,
) -> QueryResult<usize> {
    if recipients.is_empty() {
        return Ok(0);
    }

    let now = Utc::now();
    let rows: Vec<NewNotification<'_>> = recipients
        .iter()
        .map(|recipient_id| NewNotification {
            id: ids.generate(),
            recipient_id,
            message,
            kind: kind.as_str(),
            is_read: false,
            created_at: now,
        })
        .collect();

    diesel::insert_into(notifications::table)
        .values(&rows)
        .execute(conn)
        .await
}
