//! Keyx Server
//!
//! Serves the parameter registry and exchange request ledger over HTTP.
//! Provides:
//! - Diffie-Hellman parameter upload and download
//! - Key exchange request listing, creation and answering
//! - Health check and Prometheus metrics endpoints

use tokio::net::TcpListener;
use tracing::info;

use keyx_server::config::ServerConfig;
use keyx_server::http::create_router;
use keyx_server::{build_state, StartupError};

#[tokio::main]
async fn main() -> Result<(), StartupError> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("keyx_server=info".parse()?),
        )
        .init();

    let config = ServerConfig::from_env();
    info!("Starting Keyx Server v{}", env!("CARGO_PKG_VERSION"));
    info!("Storage backend: {:?}", config.storage_backend);

    let router = create_router(build_state(&config)?);

    let listener = TcpListener::bind(config.listen_addr).await?;
    info!("HTTP server listening on {}", config.listen_addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("Shutdown requested");
    }
}
