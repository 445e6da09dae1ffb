//! Best-effort fan-out of one event to a set of connections.

use axum::extract::ws::Message;

use crate::models::user::Role;

use super::events::Event;
use super::registry::{Connection, ConnectionRegistry, SendError};

/// Outcome of one fan-out.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FanOut {
    /// Connections a send was attempted on.
    pub attempted: usize,
    pub delivered: usize,
    /// Sends skipped because the connection's outbound queue was full.
    pub dropped: usize,
    /// Connections found closed and deregistered.
    pub pruned: usize,
}

impl std::ops::AddAssign for FanOut {
    fn add_assign(&mut self, other: Self) {
        self.attempted += other.attempted;
        self.delivered += other.delivered;
        self.dropped += other.dropped;
        self.pruned += other.pruned;
    }
}

/// Send `event` to every connection `user_id` has open.
pub fn send_to_user(registry: &ConnectionRegistry, user_id: &str, event: &Event) -> FanOut {
    fan_out(registry, registry.connections_for(user_id), event)
}

/// Send `event` to every live connection.
pub fn broadcast(registry: &ConnectionRegistry, event: &Event) -> FanOut {
    fan_out(registry, registry.all_connections(), event)
}

/// Send `event` to every connection tagged with `role`.
pub fn send_to_role(registry: &ConnectionRegistry, role: Role, event: &Event) -> FanOut {
    fan_out(registry, registry.connections_for_role(role), event)
}

/// Serialize once, then push onto each target's queue.
///
/// A failing target never affects the others. Closed targets are
/// deregistered; full targets miss this event.
fn fan_out(registry: &ConnectionRegistry, targets: Vec<Connection>, event: &Event) -> FanOut {
    let mut report = FanOut::default();
    if targets.is_empty() {
        return report;
    }

    let frame: Message = match event.to_frame() {
        Ok(frame) => frame,
        Err(e) => {
            tracing::error!(?e, event = event.kind(), "failed to encode event");
            return report;
        }
    };

    for conn in targets {
        report.attempted += 1;
        match conn.try_send(frame.clone()) {
            Ok(()) => report.delivered += 1,
            Err(SendError::Full) => {
                report.dropped += 1;
                tracing::warn!(
                    conn_id = %conn.id(),
                    user_id = %conn.user_id(),
                    event = event.kind(),
                    "outbound queue full; dropping event"
                );
            }
            Err(SendError::Closed) => {
                if registry.deregister(conn.user_id(), conn.id()) {
                    report.pruned += 1;
                }
                tracing::debug!(
                    conn_id = %conn.id(),
                    user_id = %conn.user_id(),
                    "pruned closed connection during delivery"
                );
            }
        }
    }

    report
}
