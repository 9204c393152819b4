//! Booting the API in-process against a provisioned database.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use axum::http::StatusCode;
use http_body_util::BodyExt;
use serde::de::DeserializeOwned;
use tower::ServiceExt;
use tracing::{debug, info, warn};

use super::database::ConnectionDescriptor;
use super::error::{HarnessError, Result};
use super::scenario::{ApiRequest, ApiResponse, Scenario, run_scenario};
use crate::app_state::AppState;
use crate::config::Config;
use crate::database::{self, DatabasePool};
use crate::router::build_router;

/// Schema setup run against the live database before any request.
#[async_trait]
pub trait MigrationHook: Send + Sync {
    async fn migrate(&self, pool: &DatabasePool) -> anyhow::Result<()>;
}

/// The crate's embedded migrations.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqlxMigrations;

#[async_trait]
impl MigrationHook for SqlxMigrations {
    async fn migrate(&self, pool: &DatabasePool) -> anyhow::Result<()> {
        database::run_migrations(pool).await
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SkipMigrations;

#[async_trait]
impl MigrationHook for SkipMigrations {
    async fn migrate(&self, _pool: &DatabasePool) -> anyhow::Result<()> {
        Ok(())
    }
}

/// A booted application instance.
///
/// Clones share the same router and pool; disposing any of them disposes all.
#[derive(Clone)]
pub struct AppHandle {
    router: Router,
    state: AppState,
    disposed: Arc<AtomicBool>,
}

impl AppHandle {
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn pool(&self) -> &DatabasePool {
        &self.state.db
    }

    pub fn config(&self) -> &Config {
        &self.state.config
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    /// Send one request through the router.
    pub async fn execute(&self, request: &ApiRequest) -> Result<ApiResponse> {
        if self.is_disposed() {
            return Err(HarnessError::Request(format!(
                "{} {} sent to a disposed application",
                request.method, request.path
            )));
        }

        debug!(method = %request.method, path = %request.path, "Executing request");

        let response = self
            .router
            .clone()
            .oneshot(request.to_http()?)
            .await
            .map_err(|e| HarnessError::Request(e.to_string()))?;

        let (parts, body) = response.into_parts();
        let bytes = body
            .collect()
            .await
            .map_err(|e| {
                HarnessError::Request(format!(
                    "cannot read body of {} {}: {}",
                    request.method, request.path, e
                ))
            })?
            .to_bytes();

        Ok(ApiResponse::from_parts(parts.status, parts.headers, bytes))
    }

    /// GET `path`, require `200 OK` and deserialize the body.
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        run_scenario(self, &Scenario::get(path).expect(StatusCode::OK))
            .await?
            .json()
    }

    /// Close the connection pool. Later calls do nothing.
    pub async fn dispose(&self) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.state.db.close().await;
        info!("Application disposed");
    }

    /// Mark the app disposed now and close the pool on a background task.
    ///
    /// For callers that cannot await, such as a lifecycle dropped mid-run.
    pub(crate) fn dispose_detached(&self) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }

        let pool = self.state.db.clone();
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn(async move { pool.close().await });
                info!("Application disposed in background");
            }
            Err(_) => warn!("Application dropped outside a runtime; pool left to close on drop"),
        }
    }
}

/// Build the app against `descriptor` and run `migrations` before returning.
pub async fn boot_application(
    descriptor: &ConnectionDescriptor,
    migrations: &dyn MigrationHook,
) -> Result<AppHandle> {
    let (config, pool) = configure(descriptor)?;
    finish_boot(descriptor, config, pool, migrations).await
}

/// [`boot_application`] bounded by `limit`. The pool is closed when the
/// limit is hit.
pub(crate) async fn boot_within(
    descriptor: &ConnectionDescriptor,
    migrations: &dyn MigrationHook,
    limit: Duration,
) -> Result<AppHandle> {
    let (config, pool) = configure(descriptor)?;
    let booting = finish_boot(descriptor, config, pool.clone(), migrations);

    match tokio::time::timeout(limit, booting).await {
        Ok(booted) => booted,
        Err(_) => {
            pool.close().await;
            Err(HarnessError::Boot(format!("application not ready after {:?}", limit)))
        }
    }
}

fn configure(descriptor: &ConnectionDescriptor) -> Result<(Config, DatabasePool)> {
    let config = Config::for_database(descriptor.connection_string()?);
    let pool = database::connect_lazy(&config)
        .map_err(|e| HarnessError::Boot(format!("cannot configure database pool: {}", e)))?;
    Ok((config, pool))
}

async fn finish_boot(
    descriptor: &ConnectionDescriptor,
    config: Config,
    pool: DatabasePool,
    migrations: &dyn MigrationHook,
) -> Result<AppHandle> {
    if let Err(e) = migrations.migrate(&pool).await {
        pool.close().await;
        return Err(HarnessError::Migration(e));
    }

    let state = AppState::new(pool, config);
    info!(
        host = %descriptor.host,
        port = descriptor.port,
        database = %descriptor.database,
        "Application booted"
    );

    Ok(AppHandle {
        router: build_router(state.clone()),
        state,
        disposed: Arc::new(AtomicBool::new(false)),
    })
}
