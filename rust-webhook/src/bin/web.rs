//! Cloudflare webhook server.
//!
//! Serves the signed app-install webhook and a health check.

use std::net::SocketAddr;

use anyhow::{Context, Result};
use tokio::{net::TcpListener, signal};
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use cfhook::{router, AppState, Config, InMemoryDirectory};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize structured JSON logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().json().flatten_event(true))
        .init();

    info!("web_server_starting");

    // Load configuration
    let config = Config::from_env();
    info!(
        port = config.port,
        cloudflare_secret_configured = config.cloudflare_secret_key.is_some(),
        directory_path = ?config.directory_path,
        dsn_base_url = %config.dsn_base_url,
        "config_loaded"
    );

    let directory = match &config.directory_path {
        Some(path) => InMemoryDirectory::from_path(path)?,
        None => {
            info!("directory_empty");
            InMemoryDirectory::default()
        }
    };

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let app = router(AppState::in_memory(config, directory));

    let listener = TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    info!(address = %addr, "web_server_listening");

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("web_server_shutdown_complete");

    Ok(())
}

/// Create a future that completes when a shutdown signal is received.
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT"),
        _ = terminate => info!("Received SIGTERM"),
    }

    info!("web_server_shutting_down");
}
