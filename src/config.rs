//! Configuration module for the log stream client and server

use serde::Deserialize;
use std::env;
use std::net::SocketAddr;
use std::time::Duration;

use crate::error::{Result, StreamError};
use crate::telemetry::LogFormat;

/// Endpoint the consumer connects to when none is configured
pub const DEFAULT_WS_ENDPOINT: &str = "ws://localhost:8080/ws";

/// Application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// WebSocket endpoint the consumer connects to
    pub ws_endpoint: String,

    /// Upper bound on the opening handshake, in milliseconds
    pub connect_timeout_ms: u64,

    /// Address the log server listens on
    pub server_addr: SocketAddr,

    /// Host name written into the index page's socket URL
    pub public_host: String,

    /// Seconds between generated log lines
    pub log_interval_secs: u64,

    /// Log output format
    pub log_format: LogFormat,
}

impl Config {
    /// Load configuration from environment variables
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let server_addr = match lookup("SERVER_ADDR") {
            Some(raw) => raw.trim().parse::<SocketAddr>().map_err(|e| {
                StreamError::ConfigError(format!("SERVER_ADDR {:?}: {}", raw, e))
            })?,
            None => defaults.server_addr,
        };

        let log_format = match lookup("LOG_FORMAT") {
            Some(raw) => raw.parse()?,
            None => defaults.log_format,
        };

        Ok(Self {
            ws_endpoint: lookup("WS_ENDPOINT").unwrap_or(defaults.ws_endpoint),
            connect_timeout_ms: lookup("CONNECT_TIMEOUT_MS")
                .and_then(|v| v.trim().parse::<u64>().ok())
                .unwrap_or(defaults.connect_timeout_ms),
            server_addr,
            public_host: lookup("PUBLIC_HOST").unwrap_or(defaults.public_host),
            log_interval_secs: lookup("LOG_INTERVAL_SECS")
                .and_then(|v| v.trim().parse::<u64>().ok())
                .filter(|secs| *secs > 0)
                .unwrap_or(defaults.log_interval_secs),
            log_format,
        })
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn log_interval(&self) -> Duration {
        Duration::from_secs(self.log_interval_secs)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            ws_endpoint: DEFAULT_WS_ENDPOINT.to_string(),
            connect_timeout_ms: 10_000,
            server_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            public_host: "localhost".to_string(),
            log_interval_secs: 5,
            log_format: LogFormat::Pretty,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_unset() {
        let config = Config::from_lookup(|_| None).unwrap();
        assert_eq!(config.ws_endpoint, "ws://localhost:8080/ws");
        assert_eq!(config.connect_timeout(), Duration::from_secs(10));
        assert_eq!(config.server_addr.port(), 8080);
        assert_eq!(config.log_interval(), Duration::from_secs(5));
        assert_eq!(config.log_format, LogFormat::Pretty);
    }

    #[test]
    fn test_overrides() {
        let config = Config::from_lookup(lookup_from(&[
            ("WS_ENDPOINT", "ws://10.0.0.2:9000/ws"),
            ("CONNECT_TIMEOUT_MS", "250"),
            ("SERVER_ADDR", "127.0.0.1:9000"),
            ("LOG_INTERVAL_SECS", "1"),
            ("LOG_FORMAT", "json"),
        ]))
        .unwrap();

        assert_eq!(config.ws_endpoint, "ws://10.0.0.2:9000/ws");
        assert_eq!(config.connect_timeout_ms, 250);
        assert_eq!(config.server_addr, "127.0.0.1:9000".parse::<SocketAddr>().unwrap());
        assert_eq!(config.log_interval_secs, 1);
        assert_eq!(config.log_format, LogFormat::Json);
    }

    #[test]
    fn test_bad_numbers_fall_back() {
        let config = Config::from_lookup(lookup_from(&[
            ("CONNECT_TIMEOUT_MS", "soon"),
            ("LOG_INTERVAL_SECS", "0"),
        ]))
        .unwrap();

        assert_eq!(config.connect_timeout_ms, 10_000);
        assert_eq!(config.log_interval_secs, 5);
    }

    #[test]
    fn test_bad_addr_and_format_are_errors() {
        let err = Config::from_lookup(lookup_from(&[("SERVER_ADDR", "localhost")])).unwrap_err();
        assert!(matches!(err, StreamError::ConfigError(_)));

        let err = Config::from_lookup(lookup_from(&[("LOG_FORMAT", "xml")])).unwrap_err();
        assert!(matches!(err, StreamError::ConfigError(_)));
    }
}
