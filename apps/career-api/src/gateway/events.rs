//! Event kinds and the `{ "event": ..., "data": ... }` wire format.

use axum::extract::ws::Message;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::models::application::ApplicationStatus;
use crate::models::job::Job;
use crate::models::project::{ProjectStatus, ReviewVerdict};

pub struct EventName;

impl EventName {
    pub const JOB_POSTED: &'static str = "job_posted";
    pub const APPLICATION_SUBMITTED: &'static str = "application_submitted";
    pub const STATUS_UPDATED: &'static str = "status_updated";
    pub const PROJECT_SUBMITTED: &'static str = "project_submitted";
    pub const PROJECT_REVIEWED: &'static str = "project_reviewed";
    pub const PONG: &'static str = "pong";
}

/// A server → client notification.
///
/// Serialized once per publish and shared by every target connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    event: String,
    data: Value,
}

impl Event {
    pub fn new(kind: &str, data: Value) -> Self {
        Self {
            event: kind.to_string(),
            data,
        }
    }

    pub fn kind(&self) -> &str {
        &self.event
    }

    pub fn data(&self) -> &Value {
        &self.data
    }

    pub fn job_posted(job: &Job) -> Self {
        Self::new(
            EventName::JOB_POSTED,
            json!({
                "job_id": job.id,
                "title": job.title,
                "department": job.department,
                "job_type": job.job_type,
            }),
        )
    }

    pub fn application_submitted(
        job_id: i64,
        job_title: &str,
        student_name: &str,
        application_id: i64,
    ) -> Self {
        Self::new(
            EventName::APPLICATION_SUBMITTED,
            json!({
                "job_id": job_id,
                "job_title": job_title,
                "student_name": student_name,
                "application_id": application_id,
            }),
        )
    }

    pub fn status_updated(
        application_id: i64,
        status: ApplicationStatus,
        job_id: i64,
        student_id: &str,
    ) -> Self {
        Self::new(
            EventName::STATUS_UPDATED,
            json!({
                "application_id": application_id,
                "status": status,
                "job_id": job_id,
                "student_id": student_id,
            }),
        )
    }

    pub fn project_submitted(project_id: i64, title: &str, student_name: &str) -> Self {
        Self::new(
            EventName::PROJECT_SUBMITTED,
            json!({
                "project_id": project_id,
                "title": title,
                "student_name": student_name,
            }),
        )
    }

    pub fn project_reviewed(
        project_id: i64,
        review_id: i64,
        verdict: ReviewVerdict,
        status: ProjectStatus,
    ) -> Self {
        Self::new(
            EventName::PROJECT_REVIEWED,
            json!({
                "project_id": project_id,
                "review_id": review_id,
                "verdict": verdict,
                "status": status,
            }),
        )
    }

    pub fn pong() -> Self {
        Self::new(EventName::PONG, json!({}))
    }

    /// Encode as a WebSocket text frame.
    pub fn to_frame(&self) -> Result<Message, serde_json::Error> {
        let text = serde_json::to_string(self)?;
        Ok(Message::Text(text.into()))
    }
}

/// A message received from the client. Only `ping` is acted on.
#[derive(Debug, Deserialize)]
pub struct ClientMessage {
    pub event: String,
    #[serde(default)]
    pub data: Value,
}

/// True for a bare `ping` text frame or `{"event": "ping"}`.
pub fn is_ping(text: &str) -> bool {
    let text = text.trim();
    if text.eq_ignore_ascii_case("ping") {
        return true;
    }
    serde_json::from_str::<ClientMessage>(text)
        .map(|m| m.event == "ping")
        .unwrap_or(false)
}
