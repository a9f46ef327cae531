//! # relay-core
//!
//! Connection registry and broadcast engine for the broker notification
//! relay.
//!
//! This crate provides the transport-free building blocks:
//!
//! - **Authenticator** - allow-list credential checking
//! - **ConnectionRegistry** - broker identity to live connection mapping
//! - **Session** - per-connection lifecycle state machine
//! - **Broadcaster** - event fan-out with per-recipient failure isolation
//! - **ShutdownCoordinator** - drains the registry at process teardown
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────┐     ┌──────────────────────┐     ┌─────────────┐
//! │    Session    │────▶│  ConnectionRegistry  │◀────│ Broadcaster │
//! └───────────────┘     └──────────────────────┘     └─────────────┘
//!                                  ▲
//!                                  │
//!                       ┌──────────────────────┐
//!                       │ ShutdownCoordinator  │
//!                       └──────────────────────┘
//! ```
//!
//! Sessions are the only writers of their own registry entry; the
//! broadcaster and the shutdown coordinator observe the registry through
//! point-in-time snapshots and enqueue toward sessions without ever holding
//! the registry lock across a write.

pub mod auth;
pub mod broadcast;
pub mod connection;
pub mod event;
pub mod registry;
pub mod session;
pub mod shutdown;

pub use auth::{AuthError, Authenticator};
pub use broadcast::{BroadcastOutcome, Broadcaster};
pub use connection::{BrokerId, ConnectionHandle, ConnectionId, Outbound, SendError};
pub use event::Event;
pub use registry::ConnectionRegistry;
pub use session::{Session, SessionState, TextDisposition, CLOSE_SENTINEL};
pub use shutdown::{ShutdownCoordinator, SHUTDOWN_CLOSE_CODE, SHUTDOWN_REASON};
