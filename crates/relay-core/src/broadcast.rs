//! Event fan-out to registered connections.

use crate::connection::{BrokerId, Outbound, SendError};
use crate::event::Event;
use crate::registry::ConnectionRegistry;
use std::sync::Arc;
use tracing::{debug, warn};

/// Result of one broadcast pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastOutcome {
    /// Recipients whose session accepted the event.
    pub delivered: usize,
    /// Recipients whose session was already gone.
    pub failed: usize,
}

/// Fans events out to live connections.
///
/// The broadcaster only enqueues toward sessions; it never mutates the
/// registry. A connection whose enqueue fails is already on its way down,
/// and its own session performs the removal.
#[derive(Debug, Clone)]
pub struct Broadcaster {
    registry: Arc<ConnectionRegistry>,
}

impl Broadcaster {
    /// Create a broadcaster over the given registry.
    #[must_use]
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self { registry }
    }

    /// Deliver an event to a single broker.
    ///
    /// # Errors
    ///
    /// Returns [`SendError::NotConnected`] if the broker has no live
    /// connection, or [`SendError::Closed`] if its session is already
    /// shutting down. The session detects the same condition on its own
    /// and drives itself to `Closing`; the broadcaster never unregisters.
    pub fn send(&self, broker: &BrokerId, event: &Event) -> Result<(), SendError> {
        let handle = self
            .registry
            .get(broker)
            .ok_or_else(|| SendError::NotConnected(broker.clone()))?;
        handle.enqueue(Outbound::Event(event.clone()))
    }

    /// Deliver an event to every connection in a point-in-time snapshot.
    ///
    /// Recipients are independent: a failed enqueue is logged and counted,
    /// and never keeps the remaining recipients from being attempted.
    /// Connections registered after the snapshot was taken receive nothing
    /// from this call.
    pub fn broadcast(&self, event: &Event) -> BroadcastOutcome {
        let snapshot = self.registry.snapshot();
        let mut outcome = BroadcastOutcome::default();

        for handle in snapshot {
            match handle.enqueue(Outbound::Event(event.clone())) {
                Ok(()) => outcome.delivered += 1,
                Err(e) => {
                    warn!(broker = %handle.broker(), error = %e, "Broadcast send failed");
                    outcome.failed += 1;
                }
            }
        }

        debug!(
            delivered = outcome.delivered,
            failed = outcome.failed,
            bytes = event.payload_size(),
            "Broadcast complete"
        );
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::ConnectionHandle;
    use serde_json::json;

    #[test]
    fn test_broadcast_reaches_every_registered_connection() {
        let registry = Arc::new(ConnectionRegistry::new());
        let (conn1, mut rx1) = ConnectionHandle::channel(BrokerId::new("broker1"));
        let (conn2, mut rx2) = ConnectionHandle::channel(BrokerId::new("broker2"));
        registry.register(conn1);
        registry.register(conn2);

        let broadcaster = Broadcaster::new(Arc::clone(&registry));
        let event = Event::new(&json!({"new_favorite_number": 42})).unwrap();
        let outcome = broadcaster.broadcast(&event);

        assert_eq!(outcome, BroadcastOutcome { delivered: 2, failed: 0 });

        for rx in [&mut rx1, &mut rx2] {
            match rx.try_recv().unwrap() {
                Outbound::Event(received) => {
                    assert_eq!(received.as_str(), r#"{"new_favorite_number":42}"#);
                }
                other => panic!("expected event, got {:?}", other),
            }
        }
    }

    #[test]
    fn test_one_dead_recipient_does_not_abort_the_rest() {
        let registry = Arc::new(ConnectionRegistry::new());
        let (dead, dead_rx) = ConnectionHandle::channel(BrokerId::new("broker1"));
        let (live, mut live_rx) = ConnectionHandle::channel(BrokerId::new("broker2"));
        registry.register(dead);
        registry.register(live);
        drop(dead_rx);

        let broadcaster = Broadcaster::new(Arc::clone(&registry));
        let event = Event::new(&json!({"n": 1})).unwrap();
        let outcome = broadcaster.broadcast(&event);

        assert_eq!(outcome.delivered, 1);
        assert_eq!(outcome.failed, 1);
        assert!(matches!(live_rx.try_recv().unwrap(), Outbound::Event(_)));
    }

    #[test]
    fn test_send_to_unknown_broker() {
        let registry = Arc::new(ConnectionRegistry::new());
        let broadcaster = Broadcaster::new(registry);
        let event = Event::new(&json!({"n": 1})).unwrap();

        assert!(matches!(
            broadcaster.send(&BrokerId::new("broker1"), &event),
            Err(SendError::NotConnected(_))
        ));
    }

    #[test]
    fn test_send_to_single_broker() {
        let registry = Arc::new(ConnectionRegistry::new());
        let (conn, mut rx) = ConnectionHandle::channel(BrokerId::new("broker1"));
        registry.register(conn);

        let broadcaster = Broadcaster::new(registry);
        let event = Event::new(&json!({"n": 7})).unwrap();
        broadcaster.send(&BrokerId::new("broker1"), &event).unwrap();

        match rx.try_recv().unwrap() {
            Outbound::Event(received) => assert_eq!(received.as_str(), r#"{"n":7}"#),
            other => panic!("expected event, got {:?}", other),
        }
    }
}
