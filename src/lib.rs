//! WebSocket log stream
//!
//! A managed WebSocket client that dispatches lifecycle events (opened,
//! message, closed, errored) to single-slot callbacks, plus the log
//! streaming server it was built to consume.

pub mod config;
pub mod error;
pub mod event;
pub mod server;
pub mod telemetry;
pub mod websocket;

#[cfg(test)]
mod test_support;

pub use config::Config;
pub use error::{Result, StreamError};
pub use event::{CloseInfo, ConnectionState, LifecycleEvent};
pub use server::LogServer;
pub use websocket::ConnectionHandle;
