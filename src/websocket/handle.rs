//! Connection handle
//!
//! Owns one transport and dispatches its lifecycle events to observers,
//! one callback at a time, mirroring every event to the log.

use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::transport::{Signal, Transport};
use crate::config::Config;
use crate::event::{CloseInfo, ConnectionState, LifecycleEvent};

/// Handshake bound used by [`ConnectionHandle::open`]
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

pub type OpenedCallback = Box<dyn FnMut() + Send>;
pub type MessageCallback = Box<dyn FnMut(&str) + Send>;
pub type ClosedCallback = Box<dyn FnMut(&CloseInfo) + Send>;
pub type ErroredCallback = Box<dyn FnMut(&str) + Send>;

/// One slot per event kind
#[derive(Default)]
struct Observers {
    opened: Option<OpenedCallback>,
    message: Option<MessageCallback>,
    closed: Option<ClosedCallback>,
    errored: Option<ErroredCallback>,
}

/// A single outbound WebSocket connection with lifecycle callbacks.
///
/// `open` starts connecting in the background and returns at once. Events
/// are delivered only while the owner drives the handle through
/// [`dispatch_next`](Self::dispatch_next) or [`run`](Self::run), so
/// callbacks registered before that never miss an event. Registering a
/// callback replaces the previous one of the same kind; past events are not
/// replayed.
///
/// Transport failures are reported through `Errored` and the log, never as
/// a returned error.
pub struct ConnectionHandle {
    uri: String,
    state: ConnectionState,
    signals: mpsc::UnboundedReceiver<Signal>,
    transport: Option<JoinHandle<()>>,
    observers: Observers,
}

impl ConnectionHandle {
    /// Begin connecting to `uri`. Must be called within a tokio runtime.
    pub fn open(uri: impl Into<String>) -> Self {
        Self::with_timeout(uri, DEFAULT_CONNECT_TIMEOUT)
    }

    /// Like [`open`](Self::open) with an explicit handshake bound
    pub fn with_timeout(uri: impl Into<String>, connect_timeout: Duration) -> Self {
        let uri = uri.into();
        let (tx, rx) = mpsc::unbounded_channel();
        let transport = tokio::spawn(Transport::new(uri.clone(), connect_timeout, tx).run());

        Self::from_parts(uri, rx, Some(transport))
    }

    /// Open the configured endpoint
    pub fn from_config(config: &Config) -> Self {
        Self::with_timeout(config.ws_endpoint.clone(), config.connect_timeout())
    }

    fn from_parts(
        uri: String,
        signals: mpsc::UnboundedReceiver<Signal>,
        transport: Option<JoinHandle<()>>,
    ) -> Self {
        Self {
            uri,
            state: ConnectionState::Connecting,
            signals,
            transport,
            observers: Observers::default(),
        }
    }

    /// Target URI given at construction
    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// Current connection state
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Check if the connection has closed
    pub fn is_closed(&self) -> bool {
        self.state.is_terminal()
    }

    /// Called once the handshake completes
    pub fn on_opened<F>(&mut self, callback: F) -> &mut Self
    where
        F: FnMut() + Send + 'static,
    {
        self.observers.opened = Some(Box::new(callback));
        self
    }

    /// Called for every non-empty payload
    pub fn on_message<F>(&mut self, callback: F) -> &mut Self
    where
        F: FnMut(&str) + Send + 'static,
    {
        self.observers.message = Some(Box::new(callback));
        self
    }

    /// Called when the connection closes, cleanly or not
    pub fn on_closed<F>(&mut self, callback: F) -> &mut Self
    where
        F: FnMut(&CloseInfo) + Send + 'static,
    {
        self.observers.closed = Some(Box::new(callback));
        self
    }

    /// Called with the detail of a transport failure
    pub fn on_errored<F>(&mut self, callback: F) -> &mut Self
    where
        F: FnMut(&str) + Send + 'static,
    {
        self.observers.errored = Some(Box::new(callback));
        self
    }

    /// Wait for the next lifecycle event and dispatch it.
    ///
    /// Returns the dispatched event, or `None` once the connection is closed.
    pub async fn dispatch_next(&mut self) -> Option<LifecycleEvent> {
        while !self.state.is_terminal() {
            // A transport that vanished without reporting Closed has nothing left to say
            match self.signals.recv().await? {
                Signal::Closing => self.advance(ConnectionState::Closing),
                Signal::Event(event) => {
                    self.dispatch(&event);
                    return Some(event);
                }
            }
        }
        None
    }

    /// Dispatch events until the connection is closed
    pub async fn run(&mut self) {
        while self.dispatch_next().await.is_some() {}
    }

    fn dispatch(&mut self, event: &LifecycleEvent) {
        debug!(kind = event.kind(), state = %self.state, "Dispatching lifecycle event");

        match event {
            LifecycleEvent::Opened => {
                self.advance(ConnectionState::Open);
                info!(uri = %self.uri, "WebSocket connection opened");
                if let Some(callback) = self.observers.opened.as_mut() {
                    callback();
                }
            }
            LifecycleEvent::Message(payload) if payload.is_empty() => {
                warn!("Empty log message received");
            }
            LifecycleEvent::Message(payload) => {
                info!(payload = %payload, "WebSocket message received");
                if let Some(callback) = self.observers.message.as_mut() {
                    callback(payload.as_str());
                }
            }
            LifecycleEvent::Closed(close) => {
                self.advance(ConnectionState::Closed);
                if close.was_clean {
                    info!(code = close.code, reason = %close.reason, "Closed cleanly");
                } else {
                    error!("Connection died");
                }
                if let Some(callback) = self.observers.closed.as_mut() {
                    callback(close);
                }
            }
            LifecycleEvent::Errored(detail) => {
                error!(error = %detail, "WebSocket error");
                if let Some(callback) = self.observers.errored.as_mut() {
                    callback(detail.as_str());
                }
            }
        }
    }

    /// Move forward in the lifecycle; never backwards
    fn advance(&mut self, next: ConnectionState) {
        if next > self.state {
            debug!(from = %self.state, to = %next, "Connection state changed");
            self.state = next;
        }
    }
}

impl Drop for ConnectionHandle {
    fn drop(&mut self) {
        if let Some(transport) = self.transport.take() {
            transport.abort();
        }
    }
}

impl std::fmt::Debug for ConnectionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionHandle")
            .field("uri", &self.uri)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}
