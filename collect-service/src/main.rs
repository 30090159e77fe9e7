//! # Collect Service
//!
//! High-throughput ingestion pipeline for device inventory snapshots and
//! heartbeats submitted by authenticated edge systems. Computes semantic
//! diffs against each tenant's prior snapshot, persists the results, and
//! dispatches change notifications — with backpressure, circuit breaking,
//! and retry.
//!
//! ## Architecture
//!
//! Built on Axum, backed by:
//! - PostgreSQL for snapshot, diff, and heartbeat persistence
//! - Redis for the queue substrate (inventory, processing, notification,
//!   delayed-retry)
//!
//! Intake and the Metrics Pass-Through run on the Axum HTTP server; the
//! Batch Persister, Diff Engine, Notification Dispatcher, Cleanup Worker,
//! and Delayed-Message Worker run as a pool of background tasks owned by
//! the [`collect_service::workers::WorkerManager`].

use std::net::SocketAddr;

use clap::Parser;
use collect_service::app_state::AppState;
use collect_service::config::ServiceConfig;
use collect_service::workers::WorkerManager;
use tracing::{error, info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Command-line overrides layered on top of environment configuration.
#[derive(Parser, Debug)]
#[command(name = "collect-service")]
#[command(about = "Inventory ingestion pipeline: intake, diffing, notification, and metrics pass-through")]
struct Args {
    /// Server bind port (overrides `SERVER_PORT`).
    #[arg(short, long, env = "SERVER_PORT")]
    port: Option<u16>,

    /// Server bind host (overrides `SERVER_HOST`).
    #[arg(long, env = "SERVER_HOST")]
    host: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "collect_service=info,collect_core=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut service_config = ServiceConfig::from_env()?;
    if let Some(port) = args.port {
        service_config.server_port = port;
    }
    if let Some(host) = args.host {
        service_config.server_host = host;
    }

    info!(
        host = %service_config.server_host,
        port = service_config.server_port,
        "collect-service configuration loaded"
    );

    let state = AppState::build(&service_config).await?;
    info!("database migrated and queue substrate connected");

    let manager = WorkerManager::start(state.clone());
    let health = manager.health_handle();

    let app = collect_service::build_app(state.clone(), health);

    let addr: SocketAddr = format!("{}:{}", service_config.server_host, service_config.server_port)
        .parse()
        .map_err(|err| anyhow::anyhow!("invalid bind address: {err}"))?;

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "collect-service listening");

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    warn!(
        timeout_secs = state.config.shutdown_timeout.as_secs(),
        "http server stopped, draining worker manager"
    );
    manager.stop().await;
    info!("shutdown complete");
    Ok(())
}

/// Waits for SIGINT or SIGTERM, whichever arrives first, so the process
/// shuts down cooperatively under both a developer's Ctrl-C and an
/// orchestrator's termination signal.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "failed to install Ctrl-C handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => error!(error = %err, "failed to install SIGTERM handler"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    warn!("shutdown signal received");
}
