//! Per-connection session lifecycle.
//!
//! A session exists from successful authentication until its connection
//! reaches a terminal state. The machine itself performs no I/O; the
//! server's socket task drives the transitions and owns the actual
//! WebSocket.

use crate::connection::ConnectionHandle;
use crate::registry::ConnectionRegistry;
use std::sync::Arc;
use tracing::debug;

/// Literal text a client sends to request an orderly close.
pub const CLOSE_SENTINEL: &str = "close";

/// Lifecycle states of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Handshake finished, not yet registered.
    Connecting,
    /// Registered and serving the read loop.
    Open,
    /// Close handshake in progress.
    Closing,
    /// Terminal; the registry entry is gone.
    Closed,
}

/// What the socket driver should do with an inbound text frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextDisposition {
    /// Application-level message; no state transition.
    Ignored,
    /// The close sentinel: perform the close handshake.
    CloseRequested,
}

/// State machine for one connection.
///
/// The session registers its handle on [`open`](Self::open) and removes it
/// again exactly once when the close completes. It is never shared between
/// tasks.
#[derive(Debug)]
pub struct Session {
    registry: Arc<ConnectionRegistry>,
    handle: ConnectionHandle,
    state: SessionState,
}

impl Session {
    /// Create a session in `Connecting`; it is not yet visible in the
    /// registry.
    #[must_use]
    pub fn new(registry: Arc<ConnectionRegistry>, handle: ConnectionHandle) -> Self {
        Self {
            registry,
            handle,
            state: SessionState::Connecting,
        }
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// The handle this session registered (or will register).
    #[must_use]
    pub fn handle(&self) -> &ConnectionHandle {
        &self.handle
    }

    /// Complete the handshake: register the connection and move to `Open`.
    pub fn open(&mut self) {
        if self.state != SessionState::Connecting {
            return;
        }
        self.registry.register(self.handle.clone());
        self.state = SessionState::Open;
        debug!(broker = %self.handle.broker(), connection = %self.handle.id(), "Session open");
    }

    /// Interpret an inbound text frame.
    ///
    /// Only the literal close sentinel carries control meaning; any other
    /// text is application traffic the relay logs and ignores without a
    /// state transition. Frames arriving outside `Open` are dropped.
    pub fn on_text(&mut self, text: &str) -> TextDisposition {
        if self.state != SessionState::Open {
            return TextDisposition::Ignored;
        }

        if text == CLOSE_SENTINEL {
            self.begin_close();
            TextDisposition::CloseRequested
        } else {
            debug!(broker = %self.handle.broker(), "Ignoring application message");
            TextDisposition::Ignored
        }
    }

    /// Move `Open -> Closing`.
    ///
    /// Triggered by the close sentinel, a remote close frame, a transport
    /// error, a failed write, or an external shutdown command. Idempotent;
    /// triggers arriving while already `Closing` or `Closed` are ignored.
    pub fn begin_close(&mut self) {
        if self.state == SessionState::Open {
            self.state = SessionState::Closing;
            debug!(broker = %self.handle.broker(), connection = %self.handle.id(), "Session closing");
        }
    }

    /// Terminal transition: deregister and mark `Closed`.
    ///
    /// Safe to call from any state with exactly-once effect. The registry's
    /// identity guard makes the removal a no-op when this session was
    /// superseded by a newer connection for the same broker.
    pub fn complete_close(&mut self) {
        if self.state == SessionState::Closed {
            return;
        }
        self.state = SessionState::Closed;
        let removed = self.registry.unregister(&self.handle);
        debug!(broker = %self.handle.broker(), connection = %self.handle.id(), removed, "Session closed");
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.complete_close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::BrokerId;

    fn session(registry: &Arc<ConnectionRegistry>, broker: &str) -> Session {
        let (handle, _rx) = ConnectionHandle::channel(BrokerId::new(broker));
        Session::new(Arc::clone(registry), handle)
    }

    #[test]
    fn test_lifecycle() {
        let registry = Arc::new(ConnectionRegistry::new());
        let mut session = session(&registry, "broker1");
        assert_eq!(session.state(), SessionState::Connecting);

        session.open();
        assert_eq!(session.state(), SessionState::Open);
        assert!(registry.get(&BrokerId::new("broker1")).is_some());

        session.begin_close();
        assert_eq!(session.state(), SessionState::Closing);

        session.complete_close();
        assert_eq!(session.state(), SessionState::Closed);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_close_sentinel() {
        let registry = Arc::new(ConnectionRegistry::new());
        let mut session = session(&registry, "broker1");
        session.open();

        assert_eq!(session.on_text("hello"), TextDisposition::Ignored);
        assert_eq!(session.state(), SessionState::Open);

        assert_eq!(session.on_text("close"), TextDisposition::CloseRequested);
        assert_eq!(session.state(), SessionState::Closing);

        // Already closing: further frames carry no meaning.
        assert_eq!(session.on_text("close"), TextDisposition::Ignored);
    }

    #[test]
    fn test_close_is_idempotent() {
        let registry = Arc::new(ConnectionRegistry::new());
        let mut session = session(&registry, "broker1");
        session.open();

        session.begin_close();
        session.begin_close();
        session.complete_close();
        session.complete_close();
        assert_eq!(session.state(), SessionState::Closed);
    }

    #[test]
    fn test_superseded_session_leaves_successor_registered() {
        let registry = Arc::new(ConnectionRegistry::new());
        let mut old = session(&registry, "broker1");
        let mut new = session(&registry, "broker1");

        old.open();
        new.open();

        old.begin_close();
        old.complete_close();

        let current = registry.get(&BrokerId::new("broker1")).unwrap();
        assert!(current.is_same_connection(new.handle()));
    }

    #[test]
    fn test_drop_unregisters() {
        let registry = Arc::new(ConnectionRegistry::new());
        {
            let mut session = session(&registry, "broker1");
            session.open();
        }
        assert!(registry.is_empty());
    }
}
