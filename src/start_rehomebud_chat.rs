//! Startup helpers for the ReHomeBud chat server.
//!
//! Configuration comes from `REHOMEBUD_*` environment variables, logging
//! from `RUST_LOG`.

use std::future::Future;
use std::process::ExitCode;
use std::sync::Arc;

use crate::chat::{ChatConfig, ChatResult};
use crate::server::{self, AppState};

/// Run the server until Ctrl-C (used by the `rehomebud-chat` binary).
///
/// # Returns
/// `ExitCode::SUCCESS` on graceful shutdown, `1` on failure.
#[must_use]
pub fn run() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    tracing::info!("Starting ReHomeBud chat v{}", env!("CARGO_PKG_VERSION"));

    let config = match ChatConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Invalid configuration: {e}");
            return ExitCode::from(1);
        }
    };

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            tracing::error!("Failed to create runtime: {e}");
            return ExitCode::from(1);
        }
    };

    let state = match rt.block_on(initialize(&config)) {
        Ok(state) => state,
        Err(e) => {
            tracing::error!("Failed to open chat store: {e}");
            return ExitCode::from(1);
        }
    };

    let port = config.server.port;
    if let Err(e) = rt.block_on(run_server_with_shutdown(state, port, shutdown_signal())) {
        tracing::error!("Server error: {e}");
        return ExitCode::from(1);
    }

    tracing::info!("Server stopped");
    ExitCode::SUCCESS
}

/// Initialize application state without starting the server.
///
/// # Errors
/// Returns an error if the store cannot be opened.
pub async fn initialize(config: &ChatConfig) -> ChatResult<Arc<AppState>> {
    tracing::info!(
        backend = ?config.storage.backend,
        path = %config.storage.sqlite_path.display(),
        "Opening chat store"
    );
    AppState::from_config(config).await
}

/// Run server with graceful shutdown.
///
/// # Errors
/// Returns an error if the server fails.
pub async fn run_server_with_shutdown<F>(
    state: Arc<AppState>,
    port: u16,
    shutdown_signal: F,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>>
where
    F: Future<Output = ()> + Send + 'static,
{
    server::run_server_with_shutdown(state, port, shutdown_signal).await
}

/// Resolves on Ctrl-C.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown requested");
}
