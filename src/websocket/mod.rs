//! WebSocket module for the managed consumer connection

mod handle;
mod transport;

pub use handle::{
    ClosedCallback, ConnectionHandle, ErroredCallback, MessageCallback, OpenedCallback,
    DEFAULT_CONNECT_TIMEOUT,
};
