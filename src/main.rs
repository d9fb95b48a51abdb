//! wt proxy: routes `<feature>.localhost:3000` to each worktree's dev server.

use std::sync::Arc;

use wt_proxy::config::{validate_config, ProxyConfig};
use wt_proxy::lifecycle::{shutdown_signal, Shutdown};
use wt_proxy::net::Listener;
use wt_proxy::observability::logging;
use wt_proxy::{HttpServer, PortMapper};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = ProxyConfig::default();
    logging::init(&config.observability)?;

    if let Err(errors) = validate_config(&config) {
        for error in &errors {
            tracing::error!(%error, "Invalid configuration");
        }
        return Err(format!("{} configuration error(s)", errors.len()).into());
    }

    tracing::info!(
        bind_address = %config.listener.bind_address,
        upstream_host = %config.upstream.host,
        max_connections = config.listener.max_connections,
        "wt-proxy v{} starting",
        env!("CARGO_PKG_VERSION")
    );

    let listener = Listener::bind(&config.listener).await?;

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    tokio::spawn(shutdown.trigger_on(shutdown_signal()));

    let server = HttpServer::new(config, Arc::new(PortMapper::new()));
    server.run(listener, server_shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
