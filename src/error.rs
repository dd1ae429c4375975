//! Error types for the log stream client and server

use thiserror::Error;

/// Log stream errors
///
/// Inside a [`ConnectionHandle`](crate::ConnectionHandle) these never reach the
/// caller: they are rendered into the detail of an `Errored` event and logged.
#[derive(Error, Debug)]
pub enum StreamError {
    #[error("WebSocket connection error: {0}")]
    WebSocketConnection(String),

    #[error("WebSocket message error: {0}")]
    WebSocketMessage(String),

    #[error("Connection timeout")]
    ConnectionTimeout,

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(String),

    #[error("Server error: {0}")]
    ServerError(String),
}

impl From<tokio_tungstenite::tungstenite::Error> for StreamError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        StreamError::WebSocketConnection(err.to_string())
    }
}

impl From<std::io::Error> for StreamError {
    fn from(err: std::io::Error) -> Self {
        StreamError::IoError(err.to_string())
    }
}

impl From<prometheus::Error> for StreamError {
    fn from(err: prometheus::Error) -> Self {
        StreamError::ServerError(format!("metrics: {}", err))
    }
}

pub type Result<T> = std::result::Result<T, StreamError>;
