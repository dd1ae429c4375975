//! Shared helpers for unit tests: a capturing tracing layer and a one-shot
//! WebSocket peer.

use std::fmt::{self, Write as _};
use std::future::Future;
use std::sync::{Arc, Mutex};

use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::{accept_async, WebSocketStream};
use tracing::field::{Field, Visit};
use tracing::subscriber::DefaultGuard;
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer};
use tracing_subscriber::prelude::*;

/// One formatted log event
#[derive(Debug, Clone)]
pub(crate) struct LogLine {
    pub level: Level,
    pub text: String,
}

/// Log events recorded while a capture guard is alive
#[derive(Debug, Clone, Default)]
pub(crate) struct CapturedLogs(Arc<Mutex<Vec<LogLine>>>);

impl CapturedLogs {
    /// Lines at exactly `level`
    pub fn at(&self, level: Level) -> Vec<String> {
        self.lines()
            .into_iter()
            .filter(|line| line.level == level)
            .map(|line| line.text)
            .collect()
    }

    /// Lines at INFO or more severe, i.e. what the default sink shows
    pub fn visible(&self) -> Vec<LogLine> {
        self.lines()
            .into_iter()
            .filter(|line| line.level <= Level::INFO)
            .collect()
    }

    pub fn clear(&self) {
        self.0.lock().unwrap().clear();
    }

    fn lines(&self) -> Vec<LogLine> {
        self.0.lock().unwrap().clone()
    }
}

struct CaptureLayer(CapturedLogs);

impl<S: Subscriber> Layer<S> for CaptureLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut visitor = LineVisitor(String::new());
        event.record(&mut visitor);
        (self.0).0.lock().unwrap().push(LogLine {
            level: *event.metadata().level(),
            text: visitor.0,
        });
    }
}

/// Renders `message key=value ...`
struct LineVisitor(String);

impl Visit for LineVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.0.insert_str(0, value);
        } else {
            let _ = write!(self.0, " {}={}", field.name(), value);
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.0.insert_str(0, &format!("{:?}", value));
        } else {
            let _ = write!(self.0, " {}={:?}", field.name(), value);
        }
    }
}

/// Capture log events on the current thread until the guard drops
pub(crate) fn capture_logs() -> (CapturedLogs, DefaultGuard) {
    let logs = CapturedLogs::default();
    let subscriber = tracing_subscriber::registry().with(CaptureLayer(logs.clone()));
    let guard = tracing::subscriber::set_default(subscriber);
    (logs, guard)
}

/// Accept a single WebSocket client on an ephemeral port and hand it to
/// `handler`. Returns the `ws://` URI to connect to.
pub(crate) async fn serve_once<F, Fut>(handler: F) -> String
where
    F: FnOnce(WebSocketStream<TcpStream>) -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let ws = accept_async(stream).await.unwrap();
        handler(ws).await;
    });

    format!("ws://{}/ws", addr)
}

/// A local port with nothing listening on it
pub(crate) async fn closed_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap().port()
}
