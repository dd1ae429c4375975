//! Log line generation and fan-out to connected clients

use chrono::{DateTime, SecondsFormat, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tokio::time::{interval_at, Instant};
use tracing::info;
use ulid::Ulid;

use super::metrics::ServerMetrics;

/// Lines buffered per client before it starts lagging
pub const LOG_CHANNEL_SIZE: usize = 100;

/// Fans each published line out to every subscribed client
#[derive(Clone)]
pub struct Broadcaster {
    lines: broadcast::Sender<String>,
    metrics: Arc<ServerMetrics>,
}

impl Broadcaster {
    pub fn new(metrics: Arc<ServerMetrics>) -> Self {
        let (lines, _) = broadcast::channel(LOG_CHANNEL_SIZE);
        Self { lines, metrics }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<String> {
        self.lines.subscribe()
    }

    pub fn client_count(&self) -> usize {
        self.lines.receiver_count()
    }

    /// Publish a line; returns how many clients it reached
    pub fn publish(&self, line: String) -> usize {
        info!(line = %line, clients = self.client_count(), "Broadcasting log message");
        self.metrics.messages_broadcast.inc();
        // No subscribers is not a failure
        self.lines.send(line).unwrap_or(0)
    }
}

/// `hash: <ulid>, number: <timestamp>`
pub fn format_log_line(id: Ulid, at: DateTime<Utc>) -> String {
    format!(
        "hash: {}, number: {}",
        id,
        at.to_rfc3339_opts(SecondsFormat::Secs, true)
    )
}

/// Publish a generated line every `period` until shutdown is signalled
pub async fn generate_log_messages(
    broadcaster: Broadcaster,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = interval_at(Instant::now() + period, period);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                broadcaster.publish(format_log_line(Ulid::new(), Utc::now()));
            }
            _ = shutdown.changed() => {
                info!("Stopping log message broadcast");
                return;
            }
        }
    }
}
