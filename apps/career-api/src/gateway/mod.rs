//! Real-time event delivery over WebSocket.
//!
//! HTTP handlers publish [`events::Event`]s through the
//! [`dispatch::EventDispatcher`] after their transaction commits. A single
//! delivery worker resolves the audience against the
//! [`registry::ConnectionRegistry`] and pushes frames onto each connection's
//! outbound queue; the per-connection writer task in [`session`] drains that
//! queue into the socket.

pub mod delivery;
pub mod dispatch;
pub mod events;
pub mod registry;
pub mod server;
pub mod session;
