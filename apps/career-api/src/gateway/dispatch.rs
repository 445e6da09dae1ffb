//! Decouples event producers from delivery.
//!
//! Producers call [`EventDispatcher::publish`] after their database
//! transaction commits. Publishing never blocks and never fails; a single
//! worker drains the queue in order, so events from one producer reach a
//! given connection in publish order.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::models::user::Role;

use super::delivery::{self, FanOut};
use super::events::Event;
use super::registry::ConnectionRegistry;

/// Who an event is for.
///
/// Most producers address users by ID. `Role` carries live-only
/// announcements such as a project submission to online mentors;
/// `Everyone` goes through [`delivery::broadcast`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Audience {
    User(String),
    Users(Vec<String>),
    Role(Role),
    Everyone,
}

struct Dispatch {
    audience: Audience,
    event: Event,
}

/// Cloneable handle onto the delivery queue. Store in `AppState`.
#[derive(Clone)]
pub struct EventDispatcher {
    queue: mpsc::UnboundedSender<Dispatch>,
}

impl EventDispatcher {
    /// Start the delivery worker. It runs until every dispatcher clone is
    /// dropped.
    pub fn spawn(registry: Arc<ConnectionRegistry>) -> (Self, JoinHandle<()>) {
        let (queue, rx) = mpsc::unbounded_channel();
        let worker = tokio::spawn(run_worker(registry, rx));
        (Self { queue }, worker)
    }

    pub fn publish(&self, audience: Audience, event: Event) {
        if self.queue.send(Dispatch { audience, event }).is_err() {
            tracing::warn!("delivery worker stopped; event discarded");
        }
    }
}

async fn run_worker(registry: Arc<ConnectionRegistry>, mut rx: mpsc::UnboundedReceiver<Dispatch>) {
    while let Some(Dispatch { audience, event }) = rx.recv().await {
        let report = deliver(&registry, &audience, &event);
        tracing::debug!(
            event = event.kind(),
            attempted = report.attempted,
            delivered = report.delivered,
            dropped = report.dropped,
            pruned = report.pruned,
            "event delivered"
        );
    }
    tracing::info!("delivery worker stopped");
}

/// Resolve `audience` against the registry and fan out.
pub fn deliver(registry: &ConnectionRegistry, audience: &Audience, event: &Event) -> FanOut {
    match audience {
        Audience::User(user_id) => delivery::send_to_user(registry, user_id, event),
        Audience::Users(user_ids) => {
            let mut total = FanOut::default();
            for user_id in user_ids {
                total += delivery::send_to_user(registry, user_id, event);
            }
            total
        }
        Audience::Role(role) => delivery::send_to_role(registry, *role, event),
        Audience::Everyone => delivery::broadcast(registry, event),
    }
}
