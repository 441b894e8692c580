//! `haverd`: the Haver chat server.
//!
//! Configured from the environment:
//!
//! - `HAVER_BIND`: listen address (default `0.0.0.0:7575`)
//! - `HAVER_HOSTNAME`: name announced to clients
//! - `HAVER_PING_SECS`: liveness interval; `0` disables pings
//! - `RUST_LOG`: log filter (default `info`)

use haver::{HaverError, HaverServer, ServerConfig};

#[tokio::main]
async fn main() -> Result<(), HaverError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();

    let config = ServerConfig::from_env()?;
    let server = HaverServer::builder().config(config).build().await?;
    tracing::info!(
        addr = %server.local_addr()?,
        hostname = %server.config().hostname,
        ping_secs = server.config().liveness.interval.as_secs(),
        "haverd starting"
    );
    server
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "cannot listen for ctrl-c");
                std::future::pending::<()>().await;
            }
        })
        .await
}
