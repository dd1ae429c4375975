//! Prometheus metrics for the log server

use prometheus::{Encoder, IntCounter, IntGauge, Registry, TextEncoder};

use crate::error::{Result, StreamError};

/// Counters exposed on `/metrics`
///
/// Each server owns its registry so several can coexist in one process.
pub struct ServerMetrics {
    registry: Registry,
    pub connected_clients: IntGauge,
    pub messages_broadcast: IntCounter,
    pub clients_dropped: IntCounter,
}

impl ServerMetrics {
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let connected_clients = IntGauge::new(
            "ws_log_connected_clients",
            "WebSocket clients currently subscribed to the log stream",
        )?;
        let messages_broadcast = IntCounter::new(
            "ws_log_messages_broadcast_total",
            "Log lines published to the broadcast channel",
        )?;
        let clients_dropped = IntCounter::new(
            "ws_log_clients_dropped_total",
            "Clients removed after a failed write",
        )?;

        registry.register(Box::new(connected_clients.clone()))?;
        registry.register(Box::new(messages_broadcast.clone()))?;
        registry.register(Box::new(clients_dropped.clone()))?;

        Ok(Self {
            registry,
            connected_clients,
            messages_broadcast,
            clients_dropped,
        })
    }

    /// Render in the Prometheus text exposition format
    pub fn render(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| StreamError::ServerError(e.to_string()))
    }
}
