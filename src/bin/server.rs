//! Log streaming server
//!
//! Publishes a generated log line every few seconds to every WebSocket
//! client on `/ws` and serves a browser viewer on `/`.

use tracing::info;

use ws_log_stream::{telemetry, Config, LogServer};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load()?;
    telemetry::init(config.log_format);

    info!(
        addr = %config.server_addr,
        interval_secs = config.log_interval_secs,
        "Configuration loaded"
    );

    LogServer::new(config)?.run().await?;

    Ok(())
}
