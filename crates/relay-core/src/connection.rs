//! Connection identity and handle types.
//!
//! The registry never owns a socket. Each session task owns its WebSocket
//! exclusively; what the registry stores is a [`ConnectionHandle`] that can
//! only enqueue outbound commands onto the session's channel.

use crate::event::Event;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;
use tokio::sync::mpsc;

/// Identity of an authenticated broker client.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BrokerId(String);

impl BrokerId {
    /// Create a broker identity.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the identity as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BrokerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for BrokerId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for BrokerId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Atomic counter backing [`ConnectionId::next`].
static CONNECTION_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Process-unique identifier for one physical connection.
///
/// Two sessions for the same broker (an old connection superseded by a
/// reconnect) carry different `ConnectionId`s; the registry compares them
/// to tell a stale handle from the live one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Allocate the next connection ID.
    #[must_use]
    pub fn next() -> Self {
        Self(CONNECTION_COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn_{:x}", self.0)
    }
}

/// Commands delivered to a session's socket task.
#[derive(Debug, Clone)]
pub enum Outbound {
    /// Deliver an event payload as a text frame.
    Event(Event),
    /// Close the connection with the given code and reason.
    Close {
        /// WebSocket close code.
        code: u16,
        /// Human-readable close reason.
        reason: String,
    },
}

/// Errors surfaced when writing toward a connection.
#[derive(Debug, Error)]
pub enum SendError {
    /// The session's receiving end is gone; the connection is closing or
    /// already closed.
    #[error("connection closed")]
    Closed,

    /// No connection is registered for the broker.
    #[error("no connection registered for {0}")]
    NotConnected(BrokerId),
}

/// Non-owning, cloneable reference to a live connection.
///
/// Held by the registry for sending and for shutdown closure; the socket
/// itself stays with the session task that drains the paired receiver.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    id: ConnectionId,
    broker: BrokerId,
    outbound: mpsc::UnboundedSender<Outbound>,
}

impl ConnectionHandle {
    /// Create a handle and the receiving end its session task will drain.
    #[must_use]
    pub fn channel(broker: BrokerId) -> (Self, mpsc::UnboundedReceiver<Outbound>) {
        let (outbound, rx) = mpsc::unbounded_channel();
        let handle = Self {
            id: ConnectionId::next(),
            broker,
            outbound,
        };
        (handle, rx)
    }

    /// This connection's unique identifier.
    #[must_use]
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// The broker this connection belongs to.
    #[must_use]
    pub fn broker(&self) -> &BrokerId {
        &self.broker
    }

    /// Enqueue a command for the session task. Never blocks.
    ///
    /// # Errors
    ///
    /// Returns [`SendError::Closed`] if the session has dropped its
    /// receiver, which happens once the connection is closing.
    pub fn enqueue(&self, command: Outbound) -> Result<(), SendError> {
        self.outbound.send(command).map_err(|_| SendError::Closed)
    }

    /// Whether two handles refer to the same physical connection.
    #[must_use]
    pub fn is_same_connection(&self, other: &ConnectionHandle) -> bool {
        self.id == other.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_ids_unique() {
        let a = ConnectionId::next();
        let b = ConnectionId::next();
        assert_ne!(a, b);
        assert!(a.to_string().starts_with("conn_"));
    }

    #[test]
    fn test_broker_id_from_str() {
        let id: BrokerId = "broker1".into();
        assert_eq!(id.as_str(), "broker1");
        assert_eq!(id.to_string(), "broker1");
    }

    #[test]
    fn test_handle_identity() {
        let (a, _rx_a) = ConnectionHandle::channel(BrokerId::new("broker1"));
        let (b, _rx_b) = ConnectionHandle::channel(BrokerId::new("broker1"));

        assert!(a.is_same_connection(&a.clone()));
        assert!(!a.is_same_connection(&b));
    }

    #[test]
    fn test_enqueue_after_receiver_dropped() {
        let (handle, rx) = ConnectionHandle::channel(BrokerId::new("broker1"));
        drop(rx);

        let event = Event::new(&serde_json::json!({"k": 1})).unwrap();
        assert!(matches!(
            handle.enqueue(Outbound::Event(event)),
            Err(SendError::Closed)
        ));
    }
}
