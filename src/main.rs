//! `wirework` server binary.
//!
//! Starts a server whose only route echoes message id 0 back to the sender,
//! which is enough to exercise the framing and worker pool by hand.

mod cli;

use clap::Parser;
use tracing_subscriber::EnvFilter;
use wirework::{config::ServerConfig, request::Request, router::handler, server::Server};

fn load_config(cli: &cli::Cli) -> Result<ServerConfig, wirework::config::ConfigError> {
    let mut config = match &cli.config {
        Some(path) => ServerConfig::load(path)?,
        None => ServerConfig::default(),
    };
    if let Some(host) = &cli.host {
        config.host.clone_from(host);
    }
    if let Some(port) = cli.port {
        config.port = port;
    }
    if let Some(workers) = cli.workers {
        config.worker_pool_size = workers;
    }
    Ok(config.normalized())
}

#[cfg(feature = "metrics")]
fn install_metrics(addr: std::net::SocketAddr) -> Result<(), Box<dyn std::error::Error>> {
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;
    tracing::info!(%addr, "prometheus exporter listening");
    Ok(())
}

#[cfg(not(feature = "metrics"))]
fn install_metrics(addr: std::net::SocketAddr) -> Result<(), Box<dyn std::error::Error>> {
    tracing::warn!(%addr, "built without the `metrics` feature; exporter not started");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = cli::Cli::parse();
    let config = load_config(&cli)?;

    // Applications embedding the library should install their own subscriber.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    if let Some(addr) = cli.metrics_addr {
        install_metrics(addr)?;
    }

    let server = Server::with_config(config.name.clone(), config)
        .add_router(
            0,
            handler(|req: Request| async move {
                if let Err(e) = req
                    .connection()
                    .send_msg_wait(req.msg_id(), req.data().clone())
                    .await
                {
                    tracing::debug!(error = %e, conn_id = %req.connection().id(), "echo dropped");
                }
            }),
        )?
        .bind_configured()?;
    tracing::info!(addr = ?server.local_addr(), "listening");
    server.serve().await?;
    Ok(())
}
