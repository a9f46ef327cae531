//! # Relay Server
//!
//! Push-notification relay for broker clients.
//!
//! ## Usage
//!
//! ```bash
//! # Run with default settings
//! relay
//!
//! # Run with custom config
//! # (first of ./relay.toml, /etc/relay/relay.toml, ~/.config/relay/relay.toml)
//!
//! # Run with environment variables
//! RELAY_PORT=8080 RELAY_HOST=0.0.0.0 relay
//! ```

mod config;
mod handlers;
mod metrics;
mod producer;

use anyhow::Result;
use relay_core::{Broadcaster, ConnectionRegistry};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "relay=debug,relay_core=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = config::Config::load()?;

    tracing::info!("Starting relay on {}:{}", config.host, config.port);

    // Initialize metrics
    metrics::init_metrics();

    // One registry instance shared by sessions, broadcaster, and shutdown.
    let registry = Arc::new(ConnectionRegistry::new());

    let producer_task = if config.producer.enabled {
        let broadcaster = Broadcaster::new(Arc::clone(&registry));
        Some(tokio::spawn(producer::run(
            broadcaster,
            config.producer.clone(),
        )))
    } else {
        None
    };

    // Serve until the shutdown path has drained every session
    handlers::run_server(config, registry).await?;

    if let Some(task) = producer_task {
        task.abort();
    }

    Ok(())
}
