//! Logging setup shared by both binaries

use serde::Deserialize;
use std::str::FromStr;
use tracing::Level;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::error::StreamError;

/// Output format of the log sink
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

impl FromStr for LogFormat {
    type Err = StreamError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" | "text" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            other => Err(StreamError::ConfigError(format!(
                "unknown LOG_FORMAT {:?}, expected \"pretty\" or \"json\"",
                other
            ))),
        }
    }
}

/// Install the global subscriber. `RUST_LOG` refines the INFO default.
pub fn init(format: LogFormat) {
    let json = format == LogFormat::Json;

    tracing_subscriber::registry()
        .with(json.then(|| fmt::layer().json()))
        .with((!json).then(|| fmt::layer()))
        .with(EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .init();
}
