//! WebSocket endpoint and token handshake.

use axum::extract::ws::{CloseFrame, Message, WebSocket};
use axum::extract::{Query, State, WebSocketUpgrade};
use axum::response::Response;
use axum::routing::get;
use axum::Router;
use futures_util::SinkExt;
use serde::Deserialize;

use crate::auth::tokens::{self, TokenError};
use crate::db::directory::UserRecord;
use crate::AppState;

use super::session;

/// Application close code for a rejected handshake.
pub const CLOSE_FORBIDDEN: u16 = 4003;
/// Standard close code for an unexpected server-side condition.
pub const CLOSE_INTERNAL_ERROR: u16 = 1011;

#[derive(Debug, Deserialize)]
pub struct ConnectParams {
    #[serde(default)]
    token: Option<String>,
}

/// Why a connection was refused before registration.
#[derive(Debug, thiserror::Error)]
pub enum HandshakeError {
    #[error("missing token")]
    MissingToken,
    #[error(transparent)]
    Token(#[from] TokenError),
    #[error("unknown user")]
    UnknownUser,
    #[error("inactive user")]
    InactiveUser,
    #[error("user lookup failed")]
    Directory,
}

impl HandshakeError {
    fn close_frame(&self) -> CloseFrame {
        let (code, reason) = match self {
            HandshakeError::Directory => (CLOSE_INTERNAL_ERROR, "Internal error"),
            _ => (CLOSE_FORBIDDEN, "Forbidden"),
        };
        CloseFrame {
            code,
            reason: reason.into(),
        }
    }
}

pub fn router() -> Router<AppState> {
    Router::new().route("/ws", get(ws_upgrade))
}

async fn ws_upgrade(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Query(params): Query<ConnectParams>,
) -> Response {
    match authenticate(&state, params.token.as_deref()).await {
        Ok(user) => ws.on_upgrade(move |socket| session::run(socket, state, user)),
        Err(err) => {
            tracing::info!(reason = %err, "gateway handshake rejected");
            ws.on_upgrade(move |socket| reject(socket, err))
        }
    }
}

/// Verify the token and resolve its subject to an active user.
pub async fn authenticate(
    state: &AppState,
    token: Option<&str>,
) -> Result<UserRecord, HandshakeError> {
    let token = token
        .filter(|t| !t.is_empty())
        .ok_or(HandshakeError::MissingToken)?;

    let claims = tokens::verify_access_token(token, &state.config.secret_key)?;

    let user = state
        .users
        .find_user(&claims.sub)
        .await
        .map_err(|_| HandshakeError::Directory)?
        .ok_or(HandshakeError::UnknownUser)?;

    if !user.is_active {
        return Err(HandshakeError::InactiveUser);
    }

    Ok(user)
}

/// Complete the upgrade only to send the close frame.
async fn reject(mut socket: WebSocket, err: HandshakeError) {
    let _ = socket.send(Message::Close(Some(err.close_frame()))).await;
    let _ = socket.close().await;
}
