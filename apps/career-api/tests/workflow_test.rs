//! End-to-end hiring flow against PostgreSQL.
//!
//! Run with `cargo test -p career-api --test workflow_test -- --ignored`.
//! `DATABASE_URL` names the database; `_test` is appended and migrations
//! are applied on startup.

mod common;

use std::net::SocketAddr;
use std::time::Duration;

use futures_util::StreamExt;
use serde_json::{json, Value};
use tokio::time;
use tokio_tungstenite::tungstenite::Message;

type Ws = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

async fn login(client: &reqwest::Client, addr: SocketAddr, email: &str, password: &str) -> Value {
    let resp = client
        .post(format!("http://{addr}/api/v1/login/access-token"))
        .form(&[("username", email), ("password", password)])
        .send()
        .await
        .expect("login request");
    assert_eq!(resp.status(), 200, "login failed for {email}");
    resp.json().await.expect("parse login response")
}

async fn next_event(ws: &mut Ws, kind: &str) -> Value {
    loop {
        let msg = time::timeout(Duration::from_secs(5), ws.next())
            .await
            .unwrap_or_else(|_| panic!("timeout waiting for {kind}"))
            .expect("stream ended")
            .expect("ws read error");
        if let Message::Text(text) = msg {
            let frame: Value = serde_json::from_str(&text).expect("parse frame");
            if frame["event"] == kind {
                return frame["data"].clone();
            }
        }
    }
}

fn unique_email(tag: &str) -> String {
    let id = career_common::id::prefixed_ulid("t").to_lowercase();
    format!("{tag}-{id}@example.com")
}

#[tokio::test]
#[ignore = "Requires PostgreSQL database"]
async fn hiring_flow_delivers_realtime_events() {
    let state = common::db_state().await;
    let addr = common::serve(&state).await;
    let client = reqwest::Client::new();

    let admin_email = unique_email("admin");
    let admin_id = common::create_admin(&state, &admin_email, "admin-password").await;

    // Student self-registers and logs in.
    let student_email = unique_email("student");
    let resp = client
        .post(format!("http://{addr}/api/v1/register"))
        .json(&json!({
            "email": student_email,
            "password": "student-password",
            "full_name": "Ada Student",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);
    let student: Value = resp.json().await.unwrap();
    let student_id = student["id"].as_str().unwrap().to_string();
    assert_eq!(student["role"], "student");

    let admin_login = login(&client, addr, &admin_email, "admin-password").await;
    let student_login = login(&client, addr, &student_email, "student-password").await;
    let admin_token = admin_login["access_token"].as_str().unwrap().to_string();
    let student_token = student_login["access_token"].as_str().unwrap().to_string();
    assert_eq!(student_login["token_type"], "bearer");

    let (mut admin_ws, _) =
        tokio_tungstenite::connect_async(format!("ws://{addr}/api/v1/ws?token={admin_token}"))
            .await
            .unwrap();
    let (mut student_ws, _) =
        tokio_tungstenite::connect_async(format!("ws://{addr}/api/v1/ws?token={student_token}"))
            .await
            .unwrap();
    assert!(
        common::eventually(|| state.connections.is_connected(&admin_id)
            && state.connections.is_connected(&student_id))
        .await
    );

    // Admin posts a job; the student hears about it.
    let resp = client
        .post(format!("http://{addr}/api/v1/jobs"))
        .bearer_auth(&admin_token)
        .json(&json!({
            "title": "Backend Intern",
            "description": "Build APIs",
            "requirements": "Rust",
            "department": "Engineering",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);
    let job: Value = resp.json().await.unwrap();
    let job_id = job["id"].as_i64().unwrap();

    let posted = next_event(&mut student_ws, "job_posted").await;
    assert_eq!(posted["job_id"], job_id);
    assert_eq!(posted["title"], "Backend Intern");

    // Student applies; the owning admin hears about it.
    let resp = client
        .post(format!("http://{addr}/api/v1/applications/{job_id}/apply"))
        .bearer_auth(&student_token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);
    let application: Value = resp.json().await.unwrap();
    let application_id = application["id"].as_i64().unwrap();
    assert_eq!(application["status"], "applied");

    let submitted = next_event(&mut admin_ws, "application_submitted").await;
    assert_eq!(submitted["application_id"], application_id);
    assert_eq!(submitted["student_name"], "Ada Student");

    // A second application to the same job conflicts.
    let resp = client
        .post(format!("http://{addr}/api/v1/applications/{job_id}/apply"))
        .bearer_auth(&student_token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 409);

    // Admin accepts; the student hears about it.
    let resp = client
        .put(format!("http://{addr}/api/v1/applications/{application_id}/status"))
        .bearer_auth(&admin_token)
        .json(&json!({ "status": "accepted" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let updated = next_event(&mut student_ws, "status_updated").await;
    assert_eq!(updated["application_id"], application_id);
    assert_eq!(updated["status"], "accepted");
    assert_eq!(updated["student_id"], student_id.as_str());

    // Every event was also recorded durably.
    let notes: Value = client
        .get(format!("http://{addr}/api/v1/notifications"))
        .bearer_auth(&student_token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let notes = notes.as_array().unwrap();
    assert_eq!(notes.len(), 2);
    assert_eq!(notes[0]["kind"], "success");

    let read_all: Value = client
        .put(format!("http://{addr}/api/v1/notifications/read-all"))
        .bearer_auth(&student_token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(read_all["updated"], 2);

    let mine: Value = client
        .get(format!("http://{addr}/api/v1/applications/my-applications"))
        .bearer_auth(&student_token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(mine[0]["job_title"], "Backend Intern");
    assert_eq!(mine[0]["status"], "accepted");

    common::cleanup_user(&state, &student_id).await;
    common::cleanup_user(&state, &admin_id).await;
}

#[tokio::test]
#[ignore = "Requires PostgreSQL database"]
async fn other_admins_cannot_review_applications() {
    let state = common::db_state().await;
    let addr = common::serve(&state).await;
    let client = reqwest::Client::new();

    let owner_email = unique_email("owner");
    let owner_id = common::create_admin(&state, &owner_email, "owner-password").await;
    let other_email = unique_email("other");
    let other_id = common::create_admin(&state, &other_email, "other-password").await;

    let owner_token = login(&client, addr, &owner_email, "owner-password").await["access_token"]
        .as_str()
        .unwrap()
        .to_string();
    let other_token = login(&client, addr, &other_email, "other-password").await["access_token"]
        .as_str()
        .unwrap()
        .to_string();

    let job: Value = client
        .post(format!("http://{addr}/api/v1/jobs"))
        .bearer_auth(&owner_token)
        .json(&json!({ "title": "Data Intern", "description": "d", "requirements": "r" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let job_id = job["id"].as_i64().unwrap();

    let student_email = unique_email("applicant");
    let student: Value = client
        .post(format!("http://{addr}/api/v1/register"))
        .json(&json!({ "email": student_email, "password": "student-password" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let student_id = student["id"].as_str().unwrap().to_string();
    let student_token = login(&client, addr, &student_email, "student-password").await
        ["access_token"]
        .as_str()
        .unwrap()
        .to_string();

    let application: Value = client
        .post(format!("http://{addr}/api/v1/applications/{job_id}/apply"))
        .bearer_auth(&student_token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let application_id = application["id"].as_i64().unwrap();

    let resp = client
        .put(format!("http://{addr}/api/v1/applications/{application_id}/status"))
        .bearer_auth(&other_token)
        .json(&json!({ "status": "rejected" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 403);

    let resp = client
        .put(format!("http://{addr}/api/v1/applications/{application_id}/status"))
        .bearer_auth(&owner_token)
        .json(&json!({ "status": "shortlisted" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    for id in [&student_id, &owner_id, &other_id] {
        common::cleanup_user(&state, id).await;
    }
}
