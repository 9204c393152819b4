//! Application startup and initialization logic.

use anyhow::Result;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::app_state::AppState;
use crate::config::{Config, LogFormat};
use crate::database;

/// Install the global tracing subscriber.
///
/// `RUST_LOG` wins over the configured level when set.
pub fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.as_str()));

    let result = match config.log_format {
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .try_init(),
        LogFormat::Pretty => tracing_subscriber::fmt().with_env_filter(filter).try_init(),
    };

    if let Err(e) = result {
        eprintln!("Tracing subscriber already installed: {}", e);
    }
}

/// Connect to the database, migrate it, and create the AppState.
pub async fn initialize_app(config: &Config) -> Result<AppState> {
    info!("🚀 Starting todo-api ({})", config.environment);

    let db_pool = database::setup_database(config).await?;
    info!("✅ PostgreSQL connection established");

    database::run_migrations(&db_pool).await?;
    info!("✅ Database migrations completed");

    Ok(AppState::new(db_pool, config.clone()))
}

/// Resolve once the process is asked to stop: Ctrl+C, or SIGTERM on unix.
pub async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    result = tokio::signal::ctrl_c() => ctrl_c_received(result),
                    _ = sigterm.recv() => info!("SIGTERM received, draining connections"),
                }
                return;
            }
            Err(e) => warn!(error = %e, "SIGTERM handler unavailable, listening for Ctrl+C only"),
        }
    }

    ctrl_c_received(tokio::signal::ctrl_c().await);
}

fn ctrl_c_received(result: std::io::Result<()>) {
    match result {
        Ok(()) => info!("Ctrl+C received, draining connections"),
        Err(e) => error!(error = %e, "Ctrl+C handler failed, shutting down"),
    }
}
