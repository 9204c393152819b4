use anyhow::Result;
use sqlx::{Pool, Postgres, postgres::PgPoolOptions};
use std::time::Duration;
use tracing::{info, warn};

use crate::config::Config;

pub mod todo_repository;

pub use todo_repository::TodoRepository;

pub type DatabasePool = Pool<Postgres>;

fn pool_options(config: &Config) -> PgPoolOptions {
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(Duration::from_secs(config.db_acquire_timeout_secs))
        .idle_timeout(Duration::from_secs(180))
        .max_lifetime(Duration::from_secs(900))
        .after_connect(|conn, _meta| {
            Box::pin(async move {
                sqlx::query("SET timezone = 'UTC'").execute(&mut *conn).await?;
                Ok(())
            })
        })
}

/// Connect eagerly and verify the database answers before returning.
pub async fn setup_database(config: &Config) -> Result<DatabasePool> {
    info!("Connecting to database");

    if !config.database_url.contains("sslmode=") {
        warn!("Database connection does not specify sslmode; using driver default");
    }

    let pool = pool_options(config).connect(&config.database_url).await?;

    let start_time = std::time::Instant::now();
    sqlx::query("SELECT 1").execute(&pool).await?;
    info!(
        "✅ Database connection established in {:?} (max connections: {})",
        start_time.elapsed(),
        config.max_connections
    );

    Ok(pool)
}

/// Build a pool that opens connections on first use.
///
/// Fails only when the connection string cannot be parsed.
pub fn connect_lazy(config: &Config) -> Result<DatabasePool> {
    Ok(pool_options(config).connect_lazy(&config.database_url)?)
}

pub async fn run_migrations(pool: &DatabasePool) -> Result<()> {
    info!("Running database migrations");

    sqlx::migrate!("./migrations").run(pool).await?;

    info!("Database migrations completed successfully");
    Ok(())
}
