//! Process-wide registry of live gateway connections, keyed by user.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use axum::extract::ws::Message;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::models::user::Role;

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Stable handle for one live WebSocket connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SendError {
    /// The writer task has exited; the connection is gone.
    #[error("connection closed")]
    Closed,
    /// The outbound queue is at capacity.
    #[error("outbound queue full")]
    Full,
}

/// Sending half of one connection.
///
/// Cheap to clone; every clone feeds the same outbound queue. The owning
/// user and role are fixed at creation.
#[derive(Debug, Clone)]
pub struct Connection {
    id: ConnectionId,
    user_id: Arc<str>,
    role: Role,
    outbound: mpsc::Sender<Message>,
}

impl Connection {
    pub fn new(user_id: &str, role: Role, outbound: mpsc::Sender<Message>) -> Self {
        Self {
            id: ConnectionId(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed)),
            user_id: Arc::from(user_id),
            role,
            outbound,
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn role(&self) -> Role {
        self.role
    }

    /// Queue a frame without waiting.
    pub fn try_send(&self, frame: Message) -> Result<(), SendError> {
        self.outbound.try_send(frame).map_err(|e| match e {
            mpsc::error::TrySendError::Closed(_) => SendError::Closed,
            mpsc::error::TrySendError::Full(_) => SendError::Full,
        })
    }
}

#[derive(Default)]
struct Inner {
    connections: HashMap<ConnectionId, Connection>,
    by_user: HashMap<Arc<str>, HashSet<ConnectionId>>,
    by_role: HashMap<Role, HashSet<Arc<str>>>,
}

impl Inner {
    fn snapshot(&self, ids: &HashSet<ConnectionId>) -> Vec<Connection> {
        ids.iter()
            .filter_map(|id| self.connections.get(id))
            .cloned()
            .collect()
    }

    fn user_has_role(&self, user_id: &str, role: Role) -> bool {
        self.by_user.get(user_id).is_some_and(|ids| {
            ids.iter()
                .filter_map(|id| self.connections.get(id))
                .any(|c| c.role == role)
        })
    }
}

/// Thread-safe map of user → live connections, with a role index.
///
/// A single lock guards all three maps so every operation sees them
/// consistent. The lock is never held across an `.await`; readers get
/// owned snapshots.
///
/// Invariants:
/// - a user key is present iff its connection set is non-empty;
/// - a role key is present iff at least one user has a connection tagged
///   with that role;
/// - each connection appears under exactly one user.
#[derive(Default)]
pub struct ConnectionRegistry {
    inner: Mutex<Inner>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `conn` under `user_id`. Registering the same connection twice is
    /// a no-op.
    pub fn register(&self, user_id: &str, conn: Connection) {
        debug_assert_eq!(
            conn.user_id(),
            user_id,
            "{} registered under a second identity",
            conn.id
        );
        if conn.user_id() != user_id {
            tracing::error!(
                conn_id = %conn.id,
                owner = %conn.user_id(),
                user_id = %user_id,
                "connection registered under a second identity; ignoring"
            );
            return;
        }

        let mut guard = self.inner.lock();
        let inner = &mut *guard;

        if inner.connections.contains_key(&conn.id) {
            return;
        }

        let user = Arc::clone(&conn.user_id);
        inner
            .by_user
            .entry(Arc::clone(&user))
            .or_default()
            .insert(conn.id);
        inner.by_role.entry(conn.role).or_default().insert(user);
        inner.connections.insert(conn.id, conn);
    }

    /// Remove connection `id` from `user_id`. Returns `false` if it was not
    /// registered there. Empty user and role entries are pruned.
    pub fn deregister(&self, user_id: &str, id: ConnectionId) -> bool {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;

        match inner.connections.get(&id) {
            Some(conn) if conn.user_id() == user_id => {}
            _ => return false,
        }
        let Some(conn) = inner.connections.remove(&id) else {
            return false;
        };

        if let Some(ids) = inner.by_user.get_mut(user_id) {
            ids.remove(&id);
            if ids.is_empty() {
                inner.by_user.remove(user_id);
            }
        }

        if !inner.user_has_role(user_id, conn.role) {
            if let Some(users) = inner.by_role.get_mut(&conn.role) {
                users.remove(user_id);
                if users.is_empty() {
                    inner.by_role.remove(&conn.role);
                }
            }
        }

        true
    }

    /// Snapshot of `user_id`'s connections; empty when offline.
    pub fn connections_for(&self, user_id: &str) -> Vec<Connection> {
        let inner = self.inner.lock();
        inner
            .by_user
            .get(user_id)
            .map(|ids| inner.snapshot(ids))
            .unwrap_or_default()
    }

    /// Snapshot of every live connection.
    pub fn all_connections(&self) -> Vec<Connection> {
        self.inner.lock().connections.values().cloned().collect()
    }

    /// Snapshot of the connections tagged with `role`.
    pub fn connections_for_role(&self, role: Role) -> Vec<Connection> {
        let inner = self.inner.lock();
        let Some(users) = inner.by_role.get(&role) else {
            return Vec::new();
        };
        users
            .iter()
            .filter_map(|user| inner.by_user.get(user))
            .flat_map(|ids| ids.iter())
            .filter_map(|id| inner.connections.get(id))
            .filter(|c| c.role == role)
            .cloned()
            .collect()
    }

    pub fn is_connected(&self, user_id: &str) -> bool {
        self.inner.lock().by_user.contains_key(user_id)
    }

    pub fn user_count(&self) -> usize {
        self.inner.lock().by_user.len()
    }

    pub fn connection_count(&self) -> usize {
        self.inner.lock().connections.len()
    }

    #[cfg(test)]
    fn assert_consistent(&self) {
        let inner = self.inner.lock();

        let mut indexed = 0;
        for (user, ids) in &inner.by_user {
            assert!(!ids.is_empty(), "empty connection set kept for {user}");
            for id in ids {
                let conn = inner
                    .connections
                    .get(id)
                    .unwrap_or_else(|| panic!("{id} indexed but not stored"));
                assert_eq!(conn.user_id(), &**user);
                indexed += 1;
            }
        }
        assert_eq!(indexed, inner.connections.len(), "connection under two users");

        for (role, users) in &inner.by_role {
            assert!(!users.is_empty(), "empty role set kept for {role}");
            for user in users {
                assert!(inner.user_has_role(user, *role), "{user} stale under {role}");
            }
        }
    }
}

/// Registers a connection on creation and deregisters it on drop.
///
/// Held by the session task, so every exit path (including a panic
/// unwinding through the receive loop) removes the connection.
pub struct Registration {
    registry: Arc<ConnectionRegistry>,
    user_id: Arc<str>,
    id: ConnectionId,
}

impl Registration {
    pub fn new(registry: Arc<ConnectionRegistry>, conn: Connection) -> Self {
        let user_id = Arc::clone(&conn.user_id);
        let id = conn.id;
        registry.register(&user_id, conn);
        Self {
            registry,
            user_id,
            id,
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }
}

impl Drop for Registration {
    fn drop(&mut self) {
        self.registry.deregister(&self.user_id, self.id);
    }
}
