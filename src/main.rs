use std::sync::Arc;
use tokio::signal;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use api_rest::{router, AppState};
use depot_core::config::{
    host_from_env_value, max_file_size_from_env_value, port_from_env_value,
    staging_dir_from_env_value, upload_dir_from_env_value,
};
use depot_core::CoreConfig;

/// Main entry point for the Depot file service
///
/// Resolves configuration from the environment once, prepares the storage root and serves the
/// REST API until SIGINT or SIGTERM.
///
/// # Environment Variables
/// - `PORT`: listen port (default: 3000)
/// - `DEPOT_HOST`: listen host (default: "0.0.0.0")
/// - `UPLOAD_DIR`: storage root, created if absent (default: "uploads")
/// - `MAX_FILE_SIZE`: per-file byte limit (default: 104857600)
/// - `DEPOT_STAGING_DIR`: where uploads are spooled before being stored (default: system temp)
///
/// # Errors
/// Returns an error if:
/// - the logging/tracing configuration cannot be initialised,
/// - an environment variable holds an invalid value,
/// - the storage root or staging directory cannot be prepared,
/// - the server address cannot be bound, or
/// - the HTTP server fails while running.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("depot_run=info".parse()?)
                .add_directive("depot_files=info".parse()?)
                .add_directive("api_rest=info".parse()?)
                .add_directive("tower_http=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cfg = Arc::new(CoreConfig::new(
        upload_dir_from_env_value(std::env::var("UPLOAD_DIR").ok()),
        staging_dir_from_env_value(std::env::var("DEPOT_STAGING_DIR").ok()),
        host_from_env_value(std::env::var("DEPOT_HOST").ok()),
        port_from_env_value(std::env::var("PORT").ok())?,
        max_file_size_from_env_value(std::env::var("MAX_FILE_SIZE").ok())?,
    )?);

    std::fs::create_dir_all(cfg.staging_dir())?;
    let state = AppState::from_config(cfg.clone())?;

    let addr = cfg.listen_addr();
    tracing::info!("++ Starting Depot on {}", addr);
    tracing::info!(
        "++ Storage root: {}",
        state.files().root_directory().display()
    );
    tracing::info!(
        "++ Max file size: {} bytes, {} files per upload",
        cfg.max_file_size(),
        cfg.upload_limits().max_files()
    );

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("-- Depot stopped");

    Ok(())
}

/// Resolves on Ctrl+C or, on Unix, SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Received termination signal, shutting down");
}
