use std::sync::Arc;

use clap::Parser;
use dns_forwarder::server::{spawn_cache_sweeper, spawn_shutdown_on};
use dns_forwarder::{Config, DirectConnector, DnsServer};
use tokio::sync::broadcast;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .init();

    let resolver = Arc::new(config.build_resolver(Arc::new(DirectConnector::default()))?);
    info!(
        servers = ?config.servers,
        routes = config.forwards.len(),
        records = config.records.len(),
        "resolver ready"
    );

    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

    if let Some(every) = config.sweep_interval() {
        spawn_cache_sweeper(resolver.clone(), every, shutdown_tx.subscribe());
    }

    let server = DnsServer::bind(config.listen, resolver, config.always_tcp, shutdown_rx).await?;

    spawn_shutdown_on(tokio::signal::ctrl_c(), shutdown_tx);

    server.run().await?;
    Ok(())
}
