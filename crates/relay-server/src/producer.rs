//! Simulated upstream event source.
//!
//! Stands in for the database change listener: at jittered intervals it
//! broadcasts a fresh favorite number to every connected broker. A real
//! deployment would replace this task with a feed from the actual change
//! source, delivered through the same [`Broadcaster`].

use crate::config::ProducerConfig;
use crate::metrics;
use rand::Rng;
use relay_core::{Broadcaster, Event};
use serde_json::json;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, warn};

/// Run the producer loop until the task is aborted.
pub async fn run(broadcaster: Broadcaster, config: ProducerConfig) {
    info!(
        min_secs = config.min_interval_secs,
        max_secs = config.max_interval_secs,
        "Producer started"
    );

    loop {
        let wait = {
            let mut rng = rand::thread_rng();
            rng.gen_range(config.min_interval_secs..=config.max_interval_secs)
        };
        sleep(Duration::from_secs(wait)).await;

        let number: u32 = rand::thread_rng().gen_range(1..=100);
        let event = match Event::new(&json!({ "new_favorite_number": number })) {
            Ok(event) => event,
            Err(e) => {
                warn!(error = %e, "Failed to serialize event");
                continue;
            }
        };

        let outcome = broadcaster.broadcast(&event);
        metrics::record_broadcast(outcome.failed);
        info!(
            number,
            delivered = outcome.delivered,
            failed = outcome.failed,
            "Broadcast favorite number"
        );
    }
}
