//! Ephemeral environment harness for integration tests.
//!
//! Each lifecycle provisions its own PostgreSQL container, boots the API
//! in-process against it, migrates the schema, runs HTTP scenarios and tears
//! everything down again, whatever the outcome.
//!
//! ```no_run
//! use axum::http::StatusCode;
//! use serde_json::json;
//! use todo_api::harness::{Harness, HarnessConfig, Scenario};
//!
//! # async fn example() -> Result<(), todo_api::harness::LifecycleError> {
//! let mut harness = Harness::new(HarnessConfig::default());
//! harness
//!     .run(|env| async move {
//!         env.run_scenario(&Scenario::post(
//!             "/api/TodoItems",
//!             json!({"id": 1, "name": "TestName", "isComplete": false}),
//!         ).expect(StatusCode::CREATED))
//!         .await?;
//!         Ok(())
//!     })
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod app;
pub mod config;
pub mod database;
pub mod error;
pub mod lifecycle;
pub mod scenario;

#[cfg(test)]
pub(crate) mod test_support;

pub use app::{AppHandle, MigrationHook, SkipMigrations, SqlxMigrations, boot_application};
pub use config::HarnessConfig;
pub use database::{
    ConnectionDescriptor, DatabaseHandle, DatabaseInstance, DatabaseProvisioner,
    PostgresProvisioner, acquire, acquire_with,
};
pub use error::{HarnessError, LifecycleError, Result};
pub use lifecycle::{Harness, LifecycleState, TestEnvironment};
pub use scenario::{ApiRequest, ApiResponse, Scenario, run_scenario};
