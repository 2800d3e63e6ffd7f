//! Serve command

use std::net::SocketAddr;

use clap::Args;
use tokio::net::TcpListener;
use tracing::info;

use crate::api::create_router_with_metrics;
use crate::config::AppConfig;
use crate::infrastructure::{logging, observability};
use crate::SecurityRuntime;

#[derive(Debug, Args)]
pub struct ServeArgs {
    /// Override the configured listen port
    #[arg(long)]
    pub port: Option<u16>,
}

/// Run the HTTP server until Ctrl-C
pub async fn run(args: ServeArgs) -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let mut config = AppConfig::load()?;
    if let Some(port) = args.port {
        config.server.port = port;
    }

    logging::init_logging(&config.logging)?;

    let metrics = observability::init_metrics(&config.metrics);

    let mut runtime = SecurityRuntime::from_config(&config).await?;
    runtime.start_sweeper();

    let app = create_router_with_metrics(runtime.app_state(), metrics, &config.metrics.path);

    let addr = build_socket_addr(&config)?;
    info!(
        %addr,
        environment = ?config.security.environment,
        store = runtime.store.backend(),
        "Starting server"
    );

    let listener = TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    runtime.shutdown().await;
    Ok(())
}

fn build_socket_addr(config: &AppConfig) -> anyhow::Result<SocketAddr> {
    Ok(SocketAddr::from((
        config.server.host.parse::<std::net::IpAddr>()?,
        config.server.port,
    )))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_socket_addr() {
        let config = AppConfig::default();
        let addr = build_socket_addr(&config).unwrap();
        assert_eq!(addr.port(), 8080);

        let mut bad = AppConfig::default();
        bad.server.host = "not-an-ip".to_string();
        assert!(build_socket_addr(&bad).is_err());
    }
}
