//! Log consumer
//!
//! Connects to the log stream, prints every log line it receives and exits
//! once the connection is closed. Connection failures are logged, not fatal.

use tracing::info;

use ws_log_stream::{telemetry, Config, ConnectionHandle};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load()?;
    telemetry::init(config.log_format);

    info!(endpoint = %config.ws_endpoint, "Starting log consumer");

    let mut handle = ConnectionHandle::from_config(&config);
    handle.on_message(|line| println!("{}", line));
    handle.run().await;

    info!(state = %handle.state(), "Log consumer finished");
    Ok(())
}
