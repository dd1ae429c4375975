//! Per-client WebSocket session
//!
//! Forwards broadcast lines to one client until it disconnects, a write
//! fails, or the server shuts down.

use axum::{
    extract::{
        ws::{close_code, CloseFrame, Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use std::fmt;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tokio::time::timeout;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::AppState;

/// How long a closing client may take to acknowledge the close frame
const CLOSE_GRACE: Duration = Duration::from_secs(2);

/// `GET /ws`. Any origin is accepted.
pub(crate) async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_client(socket, state))
}

async fn handle_client(socket: WebSocket, state: AppState) {
    let (sender, receiver) = socket.split();
    run_session(sender, receiver, state).await;
}

/// Why the forwarding half of a session stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SendOutcome {
    /// A close frame went out; the client may still acknowledge it
    Closing,
    /// A write failed and the client was dropped
    Failed,
}

/// Drive one client over its split socket halves
async fn run_session<Tx, Rx, E>(mut sender: Tx, mut receiver: Rx, state: AppState)
where
    Tx: Sink<Message> + Unpin + Send + 'static,
    Tx::Error: fmt::Display + Send,
    Rx: Stream<Item = Result<Message, E>> + Unpin + Send + 'static,
    E: Send + 'static,
{
    let client_id = Uuid::new_v4();
    let mut lines = state.broadcaster.subscribe();
    let mut shutdown = state.shutdown.clone();

    state.metrics.connected_clients.inc();
    info!(client = %client_id, "Client connected");

    let metrics = state.metrics.clone();
    let mut send_task = tokio::spawn(async move {
        loop {
            let line = tokio::select! {
                received = lines.recv() => match received {
                    Ok(line) => line,
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(client = %client_id, skipped, "Client fell behind the log stream");
                        continue;
                    }
                    Err(RecvError::Closed) => break,
                },
                _ = shutdown.changed() => break,
            };

            if let Err(e) = sender.send(Message::Text(line)).await {
                warn!(client = %client_id, error = %e, "WebSocket write failed, dropping client");
                metrics.clients_dropped.inc();
                return SendOutcome::Failed;
            }
        }

        let goodbye = Message::Close(Some(CloseFrame {
            code: close_code::AWAY,
            reason: "server shutting down".into(),
        }));
        if let Err(e) = sender.send(goodbye).await {
            debug!(client = %client_id, error = %e, "Failed to send close frame");
        }
        SendOutcome::Closing
    });

    let mut recv_task = tokio::spawn(async move {
        // Incoming data is ignored; reading keeps pings answered and spots the close
        while let Some(Ok(message)) = receiver.next().await {
            if let Message::Close(frame) = message {
                debug!(client = %client_id, frame = ?frame, "Client sent close frame");
                break;
            }
        }
    });

    tokio::select! {
        outcome = &mut send_task => {
            // Give the client a chance to answer our close frame
            let closing = matches!(outcome, Ok(SendOutcome::Closing));
            if !closing || timeout(CLOSE_GRACE, &mut recv_task).await.is_err() {
                recv_task.abort();
            }
        }
        _ = &mut recv_task => send_task.abort(),
    }

    state.metrics.connected_clients.dec();
    info!(client = %client_id, "Client disconnected");
}
