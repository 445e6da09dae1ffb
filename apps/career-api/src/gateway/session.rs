//! Lifetime of one authenticated gateway connection.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::ws::{CloseFrame, Message, WebSocket};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::time::{self, Instant};

use crate::config::GatewayConfig;
use crate::db::directory::UserRecord;
use crate::AppState;

use super::events::{is_ping, Event};
use super::registry::{Connection, Registration, SendError};

const CLOSE_GOING_AWAY: u16 = 1001;

/// How long the writer gets to flush after the receive loop ends.
const WRITER_GRACE: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Exit {
    ClientClosed,
    ReadError,
    IdleTimeout,
    WriterGone,
}

impl Exit {
    fn as_str(self) -> &'static str {
        match self {
            Exit::ClientClosed => "client closed",
            Exit::ReadError => "read error",
            Exit::IdleTimeout => "idle timeout",
            Exit::WriterGone => "writer gone",
        }
    }
}

/// Register the connection, run it to completion, deregister.
pub async fn run(socket: WebSocket, state: AppState, user: UserRecord) {
    let settings = state.config.gateway.clone();
    let (sink, mut stream) = socket.split();
    let (outbound, rx) = mpsc::channel(settings.outbound_buffer);

    let conn = Connection::new(&user.id, user.role, outbound);
    let registration = Registration::new(Arc::clone(&state.connections), conn.clone());
    let conn_id = registration.id();

    tracing::info!(
        conn_id = %conn_id,
        user_id = %user.id,
        role = %user.role,
        "gateway connection registered"
    );

    let writer = tokio::spawn(write_loop(sink, rx));
    let exit = receive_loop(&mut stream, &conn, &settings).await;

    drop(registration);

    if exit == Exit::IdleTimeout {
        let _ = conn.try_send(Message::Close(Some(CloseFrame {
            code: CLOSE_GOING_AWAY,
            reason: "Idle timeout".into(),
        })));
    }
    drop(conn);

    let abort = writer.abort_handle();
    if time::timeout(WRITER_GRACE, writer).await.is_err() {
        abort.abort();
    }

    tracing::info!(
        conn_id = %conn_id,
        user_id = %user.id,
        reason = exit.as_str(),
        "gateway connection closed"
    );
}

/// Read client frames until the socket ends or goes idle. Answers `ping`
/// and keeps the server-side keepalive going; everything else is ignored.
async fn receive_loop(
    stream: &mut SplitStream<WebSocket>,
    conn: &Connection,
    settings: &GatewayConfig,
) -> Exit {
    let mut keepalive = time::interval(settings.ping_interval);
    keepalive.tick().await; // First tick fires immediately; skip it.

    let idle = time::sleep(settings.idle_timeout);
    tokio::pin!(idle);

    loop {
        tokio::select! {
            msg = stream.next() => {
                let msg = match msg {
                    Some(Ok(msg)) => msg,
                    Some(Err(e)) => {
                        tracing::debug!(?e, conn_id = %conn.id(), "ws read error");
                        return Exit::ReadError;
                    }
                    None => return Exit::ClientClosed,
                };

                idle.as_mut().reset(Instant::now() + settings.idle_timeout);

                match msg {
                    Message::Text(text) if is_ping(&text) => {
                        if let Ok(frame) = Event::pong().to_frame() {
                            if conn.try_send(frame) == Err(SendError::Closed) {
                                return Exit::WriterGone;
                            }
                        }
                    }
                    Message::Close(_) => return Exit::ClientClosed,
                    _ => {}
                }
            }

            _ = keepalive.tick() => {
                if conn.try_send(Message::Ping(Bytes::new())) == Err(SendError::Closed) {
                    return Exit::WriterGone;
                }
            }

            () = &mut idle => return Exit::IdleTimeout,
        }
    }
}

/// Drain the outbound queue into the socket. Ends when every sender is
/// dropped, after a close frame, or on the first write error.
async fn write_loop(mut sink: SplitSink<WebSocket, Message>, mut rx: mpsc::Receiver<Message>) {
    while let Some(msg) = rx.recv().await {
        let closing = matches!(msg, Message::Close(_));
        if let Err(e) = sink.send(msg).await {
            tracing::debug!(?e, "ws write error");
            return;
        }
        if closing {
            return;
        }
    }
    let _ = sink.close().await;
}
