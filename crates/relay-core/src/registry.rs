//! Concurrency-safe registry of live broker connections.

use crate::connection::{BrokerId, ConnectionHandle};
use parking_lot::Mutex;
use std::collections::HashMap;
use tracing::debug;

/// Mapping from broker identity to its live connection handle.
///
/// At most one connection per broker at any instant. Every mutation and the
/// copy inside [`snapshot`](Self::snapshot) run under one exclusive
/// critical section; nothing is awaited and no I/O happens while it is
/// held, so all operations complete in bounded time.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    connections: Mutex<HashMap<BrokerId, ConnectionHandle>>,
}

impl ConnectionRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the connection for the handle's broker.
    ///
    /// Replacing is deliberate: a reconnecting broker supersedes its old
    /// entry. The superseded connection stays owned by its own session,
    /// which observes its stream ending and closes itself; the registry
    /// never closes connections it no longer tracks.
    pub fn register(&self, handle: ConnectionHandle) {
        let broker = handle.broker().clone();
        let connection = handle.id();
        let previous = self.connections.lock().insert(broker.clone(), handle);

        match previous {
            Some(old) => {
                debug!(broker = %broker, connection = %connection, superseded = %old.id(), "Connection replaced");
            }
            None => debug!(broker = %broker, connection = %connection, "Connection registered"),
        }
    }

    /// Remove the mapping for the handle's broker, but only if the
    /// registered connection is this exact one.
    ///
    /// A session that was superseded by a reconnect still calls this on
    /// its way out; the identity guard keeps it from evicting its
    /// successor. Returns whether an entry was removed.
    pub fn unregister(&self, handle: &ConnectionHandle) -> bool {
        let mut connections = self.connections.lock();
        match connections.get(handle.broker()) {
            Some(current) if current.is_same_connection(handle) => {
                connections.remove(handle.broker());
                debug!(broker = %handle.broker(), connection = %handle.id(), "Connection unregistered");
                true
            }
            Some(_) => {
                debug!(broker = %handle.broker(), connection = %handle.id(), "Stale unregister ignored");
                false
            }
            None => false,
        }
    }

    /// Current connection for a broker, if any.
    #[must_use]
    pub fn get(&self, broker: &BrokerId) -> Option<ConnectionHandle> {
        self.connections.lock().get(broker).cloned()
    }

    /// Point-in-time copy of every live connection.
    ///
    /// The copy is taken under the critical section and iterated after it
    /// is released, so broadcast and shutdown fan-outs never block
    /// registrations. Connections registered after the snapshot was taken
    /// are not in it.
    #[must_use]
    pub fn snapshot(&self) -> Vec<ConnectionHandle> {
        self.connections.lock().values().cloned().collect()
    }

    /// Number of live connections.
    #[must_use]
    pub fn len(&self) -> usize {
        self.connections.lock().len()
    }

    /// Whether the registry has no live connections.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.connections.lock().is_empty()
    }
}
