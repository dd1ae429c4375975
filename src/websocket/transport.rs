//! Transport driver for a single outbound WebSocket connection
//!
//! Performs the opening handshake, then turns incoming frames into signals
//! for the owning [`ConnectionHandle`](super::ConnectionHandle). The driver
//! never sends data frames; control frames are answered by tungstenite.

use futures_util::StreamExt;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::{
    connect_async,
    tungstenite::{error::ProtocolError, protocol::Message, Error as WsError},
};
use tracing::{debug, trace};

use crate::error::StreamError;
use crate::event::{CloseInfo, LifecycleEvent};

/// Notification from the transport to its handle
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Signal {
    Event(LifecycleEvent),
    /// The peer started the closing handshake
    Closing,
}

/// Drives one connection and reports what happens on it
pub(crate) struct Transport {
    uri: String,
    connect_timeout: Duration,
    signals: mpsc::UnboundedSender<Signal>,
}

impl Transport {
    pub(crate) fn new(
        uri: String,
        connect_timeout: Duration,
        signals: mpsc::UnboundedSender<Signal>,
    ) -> Self {
        Self {
            uri,
            connect_timeout,
            signals,
        }
    }

    /// Connect, then forward frames until the connection ends.
    ///
    /// Always finishes with a `Closed` event unless the handle went away first.
    pub(crate) async fn run(self) {
        debug!(uri = %self.uri, "Connecting to WebSocket");

        let handshake = timeout(self.connect_timeout, connect_async(self.uri.as_str())).await;
        let mut stream = match handshake {
            Ok(Ok((stream, response))) => {
                debug!(status = ?response.status(), "WebSocket handshake complete");
                stream
            }
            Ok(Err(e)) => return self.fail(e.into()),
            Err(_) => return self.fail(StreamError::ConnectionTimeout),
        };

        if !self.emit(Signal::Event(LifecycleEvent::Opened)) {
            return;
        }

        let mut close = None;
        while let Some(frame) = stream.next().await {
            let signal = match frame {
                Ok(Message::Text(text)) => {
                    trace!(len = text.len(), "Received text frame");
                    Signal::Event(LifecycleEvent::Message(text))
                }
                Ok(Message::Binary(data)) => {
                    trace!(len = data.len(), "Received binary frame");
                    Signal::Event(LifecycleEvent::Message(
                        String::from_utf8_lossy(&data).into_owned(),
                    ))
                }
                Ok(Message::Close(frame)) => {
                    debug!(frame = ?frame, "Received close frame");
                    close = Some(CloseInfo::from_frame(frame.as_ref()));
                    Signal::Closing
                }
                Ok(_) => {
                    trace!("Received control frame");
                    continue;
                }
                Err(WsError::ConnectionClosed) => break,
                Err(WsError::Protocol(ProtocolError::ResetWithoutClosingHandshake)) => {
                    // A plain disconnect is an unclean close, not an error
                    debug!("Peer dropped the connection without a close frame");
                    close = None;
                    break;
                }
                Err(e) => {
                    // Failing mid-stream voids any handshake already under way
                    close = None;
                    let detail = StreamError::WebSocketMessage(e.to_string());
                    if !self.emit(Signal::Event(LifecycleEvent::Errored(detail.to_string()))) {
                        return;
                    }
                    break;
                }
            };

            if !self.emit(signal) {
                return;
            }
        }

        let info = close.unwrap_or_else(CloseInfo::abnormal);
        debug!(clean = info.was_clean, code = info.code, "WebSocket transport finished");
        self.emit(Signal::Event(LifecycleEvent::Closed(info)));
    }

    /// Report a failure to establish the connection
    fn fail(&self, err: StreamError) {
        debug!(uri = %self.uri, error = %err, "WebSocket connection failed");
        if self.emit(Signal::Event(LifecycleEvent::Errored(err.to_string()))) {
            self.emit(Signal::Event(LifecycleEvent::Closed(CloseInfo::abnormal())));
        }
    }

    /// Returns false once the handle has been dropped
    fn emit(&self, signal: Signal) -> bool {
        self.signals.send(signal).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{closed_port, serve_once};
    use futures_util::SinkExt;
    use tokio::net::TcpListener;
    use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
    use tokio_tungstenite::tungstenite::protocol::CloseFrame;

    async fn collect(uri: String, connect_timeout: Duration) -> Vec<Signal> {
        let (tx, mut rx) = mpsc::unbounded_channel();
        tokio::spawn(Transport::new(uri, connect_timeout, tx).run());

        let mut signals = Vec::new();
        while let Some(signal) = rx.recv().await {
            signals.push(signal);
        }
        signals
    }

    fn event(event: LifecycleEvent) -> Signal {
        Signal::Event(event)
    }

    #[tokio::test]
    async fn test_clean_session() {
        let uri = serve_once(|mut ws| async move {
            ws.send(Message::Text("hello".into())).await.unwrap();
            ws.send(Message::Binary(b"raw bytes".to_vec())).await.unwrap();
            ws.send(Message::Text(String::new())).await.unwrap();
            ws.close(Some(CloseFrame {
                code: CloseCode::Normal,
                reason: "bye".into(),
            }))
            .await
            .unwrap();
            while let Some(Ok(_)) = ws.next().await {}
        })
        .await;

        let signals = collect(uri, Duration::from_secs(5)).await;

        assert_eq!(
            signals,
            vec![
                event(LifecycleEvent::Opened),
                event(LifecycleEvent::Message("hello".to_string())),
                event(LifecycleEvent::Message("raw bytes".to_string())),
                event(LifecycleEvent::Message(String::new())),
                Signal::Closing,
                event(LifecycleEvent::Closed(CloseInfo::clean(1000, "bye"))),
            ]
        );
    }

    #[tokio::test]
    async fn test_refused_connection_errors_then_closes() {
        let uri = format!("ws://127.0.0.1:{}/ws", closed_port().await);

        let signals = collect(uri, Duration::from_secs(5)).await;

        assert_eq!(signals.len(), 2);
        assert!(matches!(&signals[0], Signal::Event(LifecycleEvent::Errored(detail))
            if detail.starts_with("WebSocket connection error")));
        assert_eq!(signals[1], event(LifecycleEvent::Closed(CloseInfo::abnormal())));
    }

    #[tokio::test]
    async fn test_invalid_uri_fails_asynchronously() {
        let signals = collect("not a websocket uri".to_string(), Duration::from_secs(5)).await;

        assert!(matches!(&signals[0], Signal::Event(LifecycleEvent::Errored(_))));
        assert_eq!(signals.last(), Some(&event(LifecycleEvent::Closed(CloseInfo::abnormal()))));
    }

    #[tokio::test]
    async fn test_handshake_timeout() {
        // Accepts TCP but never answers the upgrade request
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (_socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(30)).await;
        });

        let signals = collect(format!("ws://{}/ws", addr), Duration::from_millis(100)).await;

        assert_eq!(
            signals,
            vec![
                event(LifecycleEvent::Errored("Connection timeout".to_string())),
                event(LifecycleEvent::Closed(CloseInfo::abnormal())),
            ]
        );
    }

    #[tokio::test]
    async fn test_dropped_socket_is_unclean() {
        let uri = serve_once(|mut ws| async move {
            ws.send(Message::Text("last words".into())).await.unwrap();
            // Dropping the stream ends TCP without a close frame
        })
        .await;

        let signals = collect(uri, Duration::from_secs(5)).await;

        assert_eq!(
            signals,
            vec![
                event(LifecycleEvent::Opened),
                event(LifecycleEvent::Message("last words".to_string())),
                event(LifecycleEvent::Closed(CloseInfo::abnormal())),
            ]
        );
    }
}
