//! Log streaming server
//!
//! Generates a log line on a fixed interval and broadcasts it to every
//! client connected on `/ws`. Also serves a browser log viewer on `/`,
//! `/health` and `/metrics`.

mod broadcast;
mod metrics;
mod session;

pub use broadcast::{format_log_line, generate_log_messages, Broadcaster, LOG_CHANNEL_SIZE};
pub use metrics::ServerMetrics;

use axum::{extract::State, http::StatusCode, response::Html, routing::get, Json, Router};
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};

use crate::config::Config;
use crate::error::Result;

const INDEX_TEMPLATE: &str = include_str!("index.html");

/// State shared by all request handlers
#[derive(Clone)]
pub struct AppState {
    pub broadcaster: Broadcaster,
    pub metrics: Arc<ServerMetrics>,
    pub index_page: Arc<String>,
    pub shutdown: watch::Receiver<bool>,
}

/// Build the HTTP router
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/ws", get(session::ws_handler))
        .route("/health", get(health_check))
        .route("/metrics", get(render_metrics))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Fill the viewer page's socket URL
pub fn render_index(host: &str, port: u16) -> String {
    INDEX_TEMPLATE
        .replace("{{HOST}}", host)
        .replace("{{PORT}}", &port.to_string())
}

/// The log streaming server
pub struct LogServer {
    config: Arc<Config>,
    state: AppState,
    shutdown: watch::Sender<bool>,
}

impl LogServer {
    pub fn new(config: Config) -> Result<Self> {
        let metrics = Arc::new(ServerMetrics::new()?);
        let (shutdown, shutdown_rx) = watch::channel(false);
        let index_page = render_index(&config.public_host, config.server_addr.port());

        let state = AppState {
            broadcaster: Broadcaster::new(metrics.clone()),
            metrics,
            index_page: Arc::new(index_page),
            shutdown: shutdown_rx,
        };

        Ok(Self {
            config: Arc::new(config),
            state,
            shutdown,
        })
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Bind the configured address and serve until Ctrl-C
    pub async fn run(self) -> Result<()> {
        let listener = TcpListener::bind(self.config.server_addr).await?;
        self.serve(listener, async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "Failed to listen for shutdown signal");
            }
        })
        .await
    }

    /// Serve on `listener` until `signal` resolves
    pub async fn serve<F>(self, listener: TcpListener, signal: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = listener.local_addr()?;
        info!(addr = %addr, "Starting log streaming server");

        let generator = tokio::spawn(generate_log_messages(
            self.state.broadcaster.clone(),
            self.config.log_interval(),
            self.state.shutdown.clone(),
        ));

        let shutdown = self.shutdown;
        axum::serve(listener, router(self.state))
            .with_graceful_shutdown(async move {
                signal.await;
                info!("Shutting down log streaming server");
                // Stops the generator and closes every client session
                let _ = shutdown.send(true);
            })
            .await?;

        if let Err(e) = generator.await {
            warn!(error = %e, "Log generator task failed");
        }

        info!("Server exited properly");
        Ok(())
    }
}

async fn index(State(state): State<AppState>) -> Html<String> {
    Html(state.index_page.to_string())
}

async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "component": "ws-log-server",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

async fn render_metrics(
    State(state): State<AppState>,
) -> std::result::Result<String, (StatusCode, String)> {
    state
        .metrics
        .render()
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
}
