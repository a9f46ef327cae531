//! Orderly teardown of every live connection.

use crate::connection::Outbound;
use crate::registry::ConnectionRegistry;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{info, warn};

/// WebSocket close code sent during shutdown (going away).
pub const SHUTDOWN_CLOSE_CODE: u16 = 1001;

/// Close reason sent during shutdown.
pub const SHUTDOWN_REASON: &str = "Server shutdown";

/// How often the drain wait re-checks the registry.
const DRAIN_POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Closes every registered connection during process teardown.
///
/// Invoked once, before the listener and runtime are torn down. Symmetric
/// with broadcast: close commands go out per-recipient over a released
/// snapshot, and one failing connection never blocks the others.
pub struct ShutdownCoordinator {
    registry: Arc<ConnectionRegistry>,
    grace: Duration,
}

impl ShutdownCoordinator {
    /// Default grace period before giving up on stragglers.
    pub const DEFAULT_GRACE: Duration = Duration::from_secs(5);

    /// Create a coordinator with the default grace period.
    #[must_use]
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self::with_grace(registry, Self::DEFAULT_GRACE)
    }

    /// Create a coordinator with a custom grace period.
    #[must_use]
    pub fn with_grace(registry: Arc<ConnectionRegistry>, grace: Duration) -> Self {
        Self { registry, grace }
    }

    /// Close every connection in the current snapshot.
    ///
    /// Sends each session a close command carrying
    /// [`SHUTDOWN_CLOSE_CODE`] / [`SHUTDOWN_REASON`], tolerating
    /// per-connection failures, then waits up to the grace period for the
    /// sessions to deregister themselves. It does not wait for close
    /// acknowledgments. Returns the number of close commands delivered.
    pub async fn shutdown(&self) -> usize {
        let snapshot = self.registry.snapshot();
        info!(connections = snapshot.len(), "Closing websocket sessions");

        let mut closed = 0;
        for handle in snapshot {
            let command = Outbound::Close {
                code: SHUTDOWN_CLOSE_CODE,
                reason: SHUTDOWN_REASON.to_string(),
            };
            match handle.enqueue(command) {
                Ok(()) => closed += 1,
                Err(e) => {
                    warn!(broker = %handle.broker(), error = %e, "Close command not delivered");
                }
            }
        }

        let deadline = Instant::now() + self.grace;
        while !self.registry.is_empty() && Instant::now() < deadline {
            sleep(DRAIN_POLL_INTERVAL).await;
        }

        let remaining = self.registry.len();
        if remaining > 0 {
            warn!(remaining, "Sessions still registered after grace period");
        } else {
            info!(closed, "All sessions drained");
        }
        closed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::{BrokerId, ConnectionHandle};
    use crate::session::Session;

    /// Spawn a minimal stand-in for a socket task: drain commands until a
    /// close arrives, then complete the session's close.
    fn spawn_session(registry: &Arc<ConnectionRegistry>, broker: &str) {
        let (handle, mut rx) = ConnectionHandle::channel(BrokerId::new(broker));
        let mut session = Session::new(Arc::clone(registry), handle);
        session.open();

        tokio::spawn(async move {
            while let Some(command) = rx.recv().await {
                if let Outbound::Close { code, reason } = command {
                    assert_eq!(code, SHUTDOWN_CLOSE_CODE);
                    assert_eq!(reason, SHUTDOWN_REASON);
                    break;
                }
            }
            session.begin_close();
            session.complete_close();
        });
    }

    #[tokio::test]
    async fn test_shutdown_closes_and_drains() {
        let registry = Arc::new(ConnectionRegistry::new());
        spawn_session(&registry, "broker1");
        spawn_session(&registry, "broker2");
        assert_eq!(registry.len(), 2);

        let coordinator = ShutdownCoordinator::new(Arc::clone(&registry));
        let closed = coordinator.shutdown().await;

        assert_eq!(closed, 2);
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_shutdown_tolerates_dead_sessions() {
        let registry = Arc::new(ConnectionRegistry::new());
        spawn_session(&registry, "broker1");

        // A session whose receiver is already gone but whose entry is
        // still registered.
        let (dead, dead_rx) = ConnectionHandle::channel(BrokerId::new("broker2"));
        registry.register(dead.clone());
        drop(dead_rx);

        let coordinator =
            ShutdownCoordinator::with_grace(Arc::clone(&registry), Duration::from_millis(200));
        let closed = coordinator.shutdown().await;

        assert_eq!(closed, 1);
        assert!(registry.get(&BrokerId::new("broker1")).is_none());
        // The dead entry never drains; shutdown gives up after the grace
        // period instead of hanging.
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn test_shutdown_with_empty_registry() {
        let registry = Arc::new(ConnectionRegistry::new());
        let coordinator = ShutdownCoordinator::new(registry);
        assert_eq!(coordinator.shutdown().await, 0);
    }
}
