//! WebRTC Signaling Relay - Entry Point
//!
//! Loads configuration, creates the room registry and serves the HTTP and
//! WebSocket surface until Ctrl-C.

use std::env;
use std::net::SocketAddr;

use envconfig::Envconfig;
use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use signal_relay::{router, AppError, Config, RoomRegistry};

#[tokio::main]
async fn main() -> Result<(), AppError> {
    // Initialize logging with environment filter
    // Use RUST_LOG env var to control log level
    // e.g., RUST_LOG=debug or RUST_LOG=signal_relay=trace
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("signal_relay=info")),
        )
        .init();

    let config = Config::init_from_env().inspect_err(|e| {
        error!("Invalid configuration: {}", e);
    })?;

    // Bind address from command line overrides the environment
    let addr = match env::args().nth(1) {
        Some(arg) => arg.parse::<SocketAddr>().inspect_err(|e| {
            error!("Invalid bind address '{}': {}", arg, e);
        })?,
        None => config.bind_addr,
    };

    let settings = config.room_settings().inspect_err(|e| {
        error!("{}", e);
    })?;
    let registry = RoomRegistry::new(settings);

    let listener = TcpListener::bind(addr).await?;
    info!("Signaling relay listening on {}", addr);

    axum::serve(listener, router(registry.clone()))
        .with_graceful_shutdown(shutdown_signal(registry))
        .await?;

    info!("Signaling relay stopped");
    Ok(())
}

/// Resolve on Ctrl-C after asking every room to close
async fn shutdown_signal(registry: RoomRegistry) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        // Without a signal handler, serve until killed
        std::future::pending::<()>().await;
    }
    info!("Shutdown requested");
    registry.shutdown();
}
