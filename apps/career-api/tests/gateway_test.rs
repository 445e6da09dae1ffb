mod common;

use std::net::SocketAddr;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use tokio::time;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use career_api::auth::tokens;
use career_api::config::GatewayConfig;
use career_api::gateway::dispatch::Audience;
use career_api::gateway::events::Event;
use career_api::gateway::server::CLOSE_FORBIDDEN;
use career_api::models::user::Role;

type Ws = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

async fn connect(addr: SocketAddr, token: Option<&str>) -> Ws {
    let url = match token {
        Some(token) => format!("ws://{addr}/api/v1/ws?token={token}"),
        None => format!("ws://{addr}/api/v1/ws"),
    };
    let (ws, _) = tokio_tungstenite::connect_async(&url)
        .await
        .expect("ws connect");
    ws
}

/// Next text frame as JSON, skipping control frames.
async fn next_json(ws: &mut Ws) -> serde_json::Value {
    loop {
        let msg = time::timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("timeout waiting for frame")
            .expect("stream ended")
            .expect("ws read error");
        match msg {
            Message::Text(text) => return serde_json::from_str(&text).expect("parse frame"),
            Message::Ping(_) | Message::Pong(_) => continue,
            other => panic!("unexpected frame: {other:?}"),
        }
    }
}

/// Read until the server's close frame; returns its code and reason.
async fn expect_close(ws: &mut Ws) -> (u16, String) {
    loop {
        let msg = time::timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("timeout waiting for close")
            .expect("stream ended before close frame")
            .expect("ws read error");
        if let Message::Close(frame) = msg {
            let frame = frame.expect("close frame has a code");
            return (u16::from(frame.code), frame.reason.as_str().to_string());
        }
    }
}

/// Nothing but control frames arrive within `wait`.
async fn expect_silence(ws: &mut Ws, wait: Duration) {
    let deadline = time::Instant::now() + wait;
    loop {
        match time::timeout_at(deadline, ws.next()).await {
            Err(_) => return,
            Ok(Some(Ok(Message::Ping(_) | Message::Pong(_)))) => continue,
            Ok(other) => panic!("expected no frames, got {other:?}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Handshake
// ---------------------------------------------------------------------------

#[tokio::test]
async fn valid_token_registers_connection() {
    let (state, directory) = common::test_state();
    let addr = common::serve(&state).await;
    let (student, token) = common::add_user(&directory, Role::Student);

    let _ws = connect(addr, Some(&token)).await;

    assert!(common::eventually(|| state.connections.is_connected(&student.id)).await);
    assert_eq!(state.connections.connection_count(), 1);
}

#[tokio::test]
async fn missing_token_closes_with_4003() {
    let (state, _directory) = common::test_state();
    let addr = common::serve(&state).await;

    let mut ws = connect(addr, None).await;
    let (code, reason) = expect_close(&mut ws).await;
    assert_eq!(code, CLOSE_FORBIDDEN);
    assert_eq!(reason, "Forbidden");

    let mut ws = connect(addr, Some("")).await;
    assert_eq!(expect_close(&mut ws).await.0, CLOSE_FORBIDDEN);
    assert_eq!(state.connections.connection_count(), 0);
}

#[tokio::test]
async fn bad_tokens_close_with_4003() {
    let (state, directory) = common::test_state();
    let addr = common::serve(&state).await;
    let (student, _) = common::add_user(&directory, Role::Student);

    let wrong_secret =
        tokens::issue_access_token("some-other-secret", &student.id, Role::Student, 30).unwrap();
    let expired = common::mint_token(&student.id, Role::Student, -10);

    for token in [wrong_secret.as_str(), expired.as_str(), "not-a-jwt"] {
        let mut ws = connect(addr, Some(token)).await;
        assert_eq!(expect_close(&mut ws).await.0, CLOSE_FORBIDDEN);
    }
    assert!(!state.connections.is_connected(&student.id));
}

#[tokio::test]
async fn unknown_or_inactive_user_closes_with_4003() {
    let (state, directory) = common::test_state();
    let addr = common::serve(&state).await;

    let ghost = common::mint_token("usr_01GHOSTGHOSTGHOSTGHOSTGHOST", Role::Student, 30);
    let mut ws = connect(addr, Some(&ghost)).await;
    assert_eq!(expect_close(&mut ws).await.0, CLOSE_FORBIDDEN);

    let (student, token) = common::add_user(&directory, Role::Student);
    directory.set_active(&student.id, false);
    let mut ws = connect(addr, Some(&token)).await;
    assert_eq!(expect_close(&mut ws).await.0, CLOSE_FORBIDDEN);

    assert_eq!(state.connections.connection_count(), 0);
}

// ---------------------------------------------------------------------------
// Delivery
// ---------------------------------------------------------------------------

#[tokio::test]
async fn published_event_reaches_connected_user() {
    let (state, directory) = common::test_state();
    let addr = common::serve(&state).await;
    let (student, token) = common::add_user(&directory, Role::Student);

    let mut ws = connect(addr, Some(&token)).await;
    assert!(common::eventually(|| state.connections.is_connected(&student.id)).await);

    state.events.publish(
        Audience::User(student.id.clone()),
        Event::new("status_updated", json!({ "application_id": 7, "status": "accepted" })),
    );

    let frame = next_json(&mut ws).await;
    assert_eq!(frame["event"], "status_updated");
    assert_eq!(frame["data"]["application_id"], 7);
    assert_eq!(frame["data"]["status"], "accepted");
}

#[tokio::test]
async fn every_tab_of_a_user_receives_unicast() {
    let (state, directory) = common::test_state();
    let addr = common::serve(&state).await;
    let (student, token) = common::add_user(&directory, Role::Student);
    let (other, other_token) = common::add_user(&directory, Role::Student);

    let mut tab_a = connect(addr, Some(&token)).await;
    let mut tab_b = connect(addr, Some(&token)).await;
    let mut bystander = connect(addr, Some(&other_token)).await;
    assert!(
        common::eventually(|| state.connections.connections_for(&student.id).len() == 2
            && state.connections.is_connected(&other.id))
        .await
    );

    state.events.publish(
        Audience::User(student.id.clone()),
        Event::new("job_posted", json!({ "job_id": 1 })),
    );

    assert_eq!(next_json(&mut tab_a).await["event"], "job_posted");
    assert_eq!(next_json(&mut tab_b).await["event"], "job_posted");
    expect_silence(&mut bystander, Duration::from_millis(200)).await;

    // Closing one tab leaves the other registered and reachable.
    tab_a.close(None).await.unwrap();
    assert!(
        common::eventually(|| state.connections.connections_for(&student.id).len() == 1).await
    );

    state.events.publish(
        Audience::User(student.id.clone()),
        Event::new("job_posted", json!({ "job_id": 2 })),
    );
    assert_eq!(next_json(&mut tab_b).await["data"]["job_id"], 2);
}

#[tokio::test]
async fn role_audience_skips_other_roles() {
    let (state, directory) = common::test_state();
    let addr = common::serve(&state).await;
    let (_student, student_token) = common::add_user(&directory, Role::Student);
    let (_admin, admin_token) = common::add_user(&directory, Role::Admin);

    let mut student_ws = connect(addr, Some(&student_token)).await;
    let mut admin_ws = connect(addr, Some(&admin_token)).await;
    assert!(common::eventually(|| state.connections.connection_count() == 2).await);

    state.events.publish(
        Audience::Role(Role::Student),
        Event::new("job_posted", json!({ "job_id": 3 })),
    );

    assert_eq!(next_json(&mut student_ws).await["data"]["job_id"], 3);
    expect_silence(&mut admin_ws, Duration::from_millis(200)).await;
}

#[tokio::test]
async fn events_arrive_in_publish_order() {
    let (state, directory) = common::test_state();
    let addr = common::serve(&state).await;
    let (student, token) = common::add_user(&directory, Role::Student);

    let mut ws = connect(addr, Some(&token)).await;
    assert!(common::eventually(|| state.connections.is_connected(&student.id)).await);

    for seq in 0..20 {
        state.events.publish(
            Audience::Everyone,
            Event::new("job_posted", json!({ "job_id": seq })),
        );
    }
    for seq in 0..20 {
        assert_eq!(next_json(&mut ws).await["data"]["job_id"], seq);
    }
}

// ---------------------------------------------------------------------------
// Session lifetime
// ---------------------------------------------------------------------------

#[tokio::test]
async fn ping_is_answered_with_pong() {
    let (state, directory) = common::test_state();
    let addr = common::serve(&state).await;
    let (_user, token) = common::add_user(&directory, Role::Mentor);

    let mut ws = connect(addr, Some(&token)).await;

    ws.send(Message::Text("ping".into())).await.unwrap();
    assert_eq!(
        next_json(&mut ws).await,
        json!({ "event": "pong", "data": {} })
    );

    ws.send(Message::Text(json!({ "event": "ping" }).to_string().into()))
        .await
        .unwrap();
    assert_eq!(next_json(&mut ws).await["event"], "pong");

    // Anything else is ignored.
    ws.send(Message::Text("hello".into())).await.unwrap();
    expect_silence(&mut ws, Duration::from_millis(200)).await;
}

#[tokio::test]
async fn client_close_deregisters() {
    let (state, directory) = common::test_state();
    let addr = common::serve(&state).await;
    let (student, token) = common::add_user(&directory, Role::Student);

    let mut ws = connect(addr, Some(&token)).await;
    assert!(common::eventually(|| state.connections.is_connected(&student.id)).await);

    ws.close(None).await.unwrap();

    assert!(common::eventually(|| !state.connections.is_connected(&student.id)).await);
    assert_eq!(state.connections.connection_count(), 0);
}

#[tokio::test]
async fn dropped_socket_deregisters() {
    let (state, directory) = common::test_state();
    let addr = common::serve(&state).await;
    let (student, token) = common::add_user(&directory, Role::Student);

    let ws = connect(addr, Some(&token)).await;
    assert!(common::eventually(|| state.connections.is_connected(&student.id)).await);

    drop(ws);

    assert!(common::eventually(|| !state.connections.is_connected(&student.id)).await);
}

#[tokio::test]
async fn idle_connection_is_closed() {
    let mut config = common::test_config();
    config.gateway = GatewayConfig {
        ping_interval: Duration::from_secs(60),
        idle_timeout: Duration::from_millis(300),
        ..GatewayConfig::default()
    };
    let (state, directory) = common::test_state_with(config);
    let addr = common::serve(&state).await;
    let (student, token) = common::add_user(&directory, Role::Student);

    let mut ws = connect(addr, Some(&token)).await;
    assert!(common::eventually(|| state.connections.is_connected(&student.id)).await);

    let (code, reason) = expect_close(&mut ws).await;
    assert_eq!(code, 1001);
    assert_eq!(reason, "Idle timeout");
    assert!(!state.connections.is_connected(&student.id));
}

#[tokio::test]
async fn server_sends_keepalive_pings() {
    let mut config = common::test_config();
    config.gateway = GatewayConfig {
        ping_interval: Duration::from_millis(100),
        ..GatewayConfig::default()
    };
    let (state, directory) = common::test_state_with(config);
    let addr = common::serve(&state).await;
    let (_user, token) = common::add_user(&directory, Role::Student);

    let mut ws = connect(addr, Some(&token)).await;

    let msg = time::timeout(Duration::from_secs(2), ws.next())
        .await
        .expect("timeout waiting for ping")
        .expect("stream ended")
        .expect("ws read error");
    assert!(matches!(msg, Message::Ping(_)), "got {msg:?}");
}
