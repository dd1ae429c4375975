//! Lifecycle events delivered by the transport to a connection handle
//!
//! Covers the four notifications (opened, message, closed, errored) and the
//! connection state they drive.

use serde::Serialize;
use std::fmt;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;

/// Close code reported when the transport ends without a closing handshake
pub const ABNORMAL_CLOSURE: u16 = 1006;

/// Close code reported when the peer's close frame carried no status
pub const NO_STATUS_RECEIVED: u16 = 1005;

/// Connection state, ordered by lifecycle position
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum ConnectionState {
    Connecting,
    Open,
    Closing,
    Closed,
}

impl ConnectionState {
    /// True once no further events will be dispatched
    pub fn is_terminal(self) -> bool {
        self == ConnectionState::Closed
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::Connecting => "CONNECTING",
            ConnectionState::Open => "OPEN",
            ConnectionState::Closing => "CLOSING",
            ConnectionState::Closed => "CLOSED",
        };
        f.write_str(name)
    }
}

/// Details of a closed connection
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CloseInfo {
    /// Whether the closing handshake completed
    pub was_clean: bool,

    /// Close status code
    pub code: u16,

    /// Close reason sent by the peer
    pub reason: String,
}

impl CloseInfo {
    pub fn clean(code: u16, reason: impl Into<String>) -> Self {
        Self {
            was_clean: true,
            code,
            reason: reason.into(),
        }
    }

    /// Teardown without a completed closing handshake
    pub fn abnormal() -> Self {
        Self {
            was_clean: false,
            code: ABNORMAL_CLOSURE,
            reason: String::new(),
        }
    }

    /// Close info for a close frame received from the peer
    pub fn from_frame(frame: Option<&CloseFrame<'_>>) -> Self {
        match frame {
            Some(frame) => Self::clean(u16::from(frame.code), frame.reason.to_string()),
            None => Self::clean(NO_STATUS_RECEIVED, ""),
        }
    }
}

/// A single lifecycle notification
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum LifecycleEvent {
    Opened,
    Message(String),
    Closed(CloseInfo),
    Errored(String),
}

impl LifecycleEvent {
    /// Short name used in diagnostics
    pub fn kind(&self) -> &'static str {
        match self {
            LifecycleEvent::Opened => "opened",
            LifecycleEvent::Message(_) => "message",
            LifecycleEvent::Closed(_) => "closed",
            LifecycleEvent::Errored(_) => "errored",
        }
    }
}
