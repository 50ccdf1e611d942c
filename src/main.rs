//! Document gateway (v1)
//!
//! Serves PDFs compiled by a remote document service, one route per document.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request       ┌──────────────────────────────────────────────────────────┐
//!     ─────────────────────┼─▶ http server ──▶ route table ──▶ WorkerHandle::serve    │
//!                          │                                          │               │
//!                          │                                          ▼               │
//!                          │                       ┌─────────── route worker ───────┐ │
//!                          │                       │ wait queue → refresh → respond │ │
//!                          │                       │        cache entity            │ │
//!                          │                       └──────────────┬─────────────────┘ │
//!     Client Response      │                                      │                   │
//!     ◀────────────────────┼── 200 application/pdf                ▼                   │
//!                          │                          upstream document service ──────┼──▶ Remote
//!                          └──────────────────────────────────────────────────────────┘
//! ```

use std::net::{Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;

use doc_gateway::config::loader::load_config;
use doc_gateway::http::HttpServer;
use doc_gateway::lifecycle::{signals, start_workers, Shutdown};
use doc_gateway::observability::{logging, metrics};
use doc_gateway::upstream::HttpDocumentService;

#[derive(Parser)]
#[command(name = "doc-gateway", version)]
#[command(about = "Serve documents compiled by a remote document service over HTTP", long_about = None)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(default_value = "config.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match load_config(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            logging::init_logging("info");
            tracing::error!(path = %cli.config.display(), error = %e, "Failed to load configuration");
            return ExitCode::FAILURE;
        }
    };

    logging::init_logging(&config.observability.log_level);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "doc-gateway starting");

    match run(config).await {
        Ok(()) => {
            tracing::info!("Shutdown complete");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "Fatal error");
            ExitCode::FAILURE
        }
    }
}

async fn run(config: doc_gateway::GatewayConfig) -> Result<(), Box<dyn std::error::Error>> {
    tracing::info!(
        port = config.port,
        routes = config.routes.len(),
        refresh_interval_secs = config.refresh.interval_secs,
        refresh_jitter_secs = config.refresh.jitter_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        let addr: SocketAddr = config.observability.metrics_address.parse()?;
        metrics::init_metrics(addr)?;
    }

    let service = Arc::new(HttpDocumentService::new(&config.upstream)?);
    let shutdown = Shutdown::new();
    let gateway = start_workers(service, &config, &shutdown).await?;

    let listener = TcpListener::bind((Ipv4Addr::UNSPECIFIED, config.port)).await?;
    let server = HttpServer::new(gateway.routes, &config.http);
    let server_shutdown = shutdown.subscribe();
    let server_task = tokio::spawn(server.run(listener, server_shutdown));

    signals::shutdown_signal().await;
    shutdown.trigger();

    server_task.await??;
    for worker in gateway.workers {
        let _ = worker.await;
    }
    Ok(())
}
