//! One test lifecycle as a scoped acquisition.

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use serde::de::DeserializeOwned;
use tracing::{Instrument, error, info, info_span, warn};
use uuid::Uuid;

use super::app::{AppHandle, MigrationHook, SqlxMigrations, boot_within};
use super::config::HarnessConfig;
use super::database::{
    ConnectionDescriptor, DatabaseHandle, DatabaseProvisioner, PostgresProvisioner, acquire_with,
};
use super::error::{HarnessError, LifecycleError, Result};
use super::scenario::{self, ApiRequest, ApiResponse, Scenario};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Idle,
    Provisioning,
    Ready,
    AppBooting,
    AppReady,
    Executing,
    TearingDown,
    Disposed,
}

/// What a scenario closure gets to work with.
#[derive(Clone)]
pub struct TestEnvironment {
    app: AppHandle,
    descriptor: ConnectionDescriptor,
}

impl TestEnvironment {
    pub fn app(&self) -> &AppHandle {
        &self.app
    }

    pub fn descriptor(&self) -> &ConnectionDescriptor {
        &self.descriptor
    }

    pub async fn execute(&self, request: &ApiRequest) -> Result<ApiResponse> {
        self.app.execute(request).await
    }

    pub async fn run_scenario(&self, scenario: &Scenario) -> Result<ApiResponse> {
        scenario::run_scenario(&self.app, scenario).await
    }

    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.app.get_json(path).await
    }
}

/// Provisions a database, boots the app on it, runs one scenario closure and
/// tears everything down again.
///
/// A harness runs exactly one lifecycle. Create one per test.
pub struct Harness {
    config: HarnessConfig,
    provisioner: Arc<dyn DatabaseProvisioner>,
    migrations: Arc<dyn MigrationHook>,
    state: LifecycleState,
    history: Vec<LifecycleState>,
    teardown_count: usize,
}

impl Harness {
    pub fn new(config: HarnessConfig) -> Self {
        Self {
            config,
            provisioner: Arc::new(PostgresProvisioner),
            migrations: Arc::new(SqlxMigrations),
            state: LifecycleState::Idle,
            history: vec![LifecycleState::Idle],
            teardown_count: 0,
        }
    }

    pub fn with_provisioner(mut self, provisioner: Arc<dyn DatabaseProvisioner>) -> Self {
        self.provisioner = provisioner;
        self
    }

    pub fn with_migrations(mut self, migrations: Arc<dyn MigrationHook>) -> Self {
        self.migrations = migrations;
        self
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    /// Every state entered so far, starting with `Idle`.
    pub fn history(&self) -> &[LifecycleState] {
        &self.history
    }

    pub fn teardown_count(&self) -> usize {
        self.teardown_count
    }

    /// Run the lifecycle around `scenario`.
    ///
    /// Teardown runs once whatever happens before it: provisioning or
    /// migration failures, scenario errors and panics. A teardown failure
    /// after an earlier error is attached to it as a secondary diagnostic.
    ///
    /// Dropping the returned future before it completes still tears down:
    /// the state moves to `Disposed` at once and the database is removed on
    /// a background task.
    pub async fn run<F, Fut, T>(&mut self, scenario: F) -> std::result::Result<T, LifecycleError>
    where
        F: FnOnce(TestEnvironment) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        if self.state != LifecycleState::Idle {
            warn!(state = ?self.state, "Harness reused after its lifecycle");
            return Err(HarnessError::InvalidState(self.state).into());
        }

        let span = info_span!("lifecycle", id = %Uuid::new_v4());
        let mut lifecycle = Lifecycle {
            harness: self,
            database: None,
            app: None,
            torn_down: false,
        };

        async move {
            let outcome = lifecycle.drive(scenario).await;
            if let Err(e) = &outcome {
                warn!(error = %e, state = ?lifecycle.harness.state, "Lifecycle failed");
            }

            let teardown = lifecycle.tear_down().await;
            LifecycleError::combine(outcome, teardown)
        }
        .instrument(span)
        .await
    }

    fn transition(&mut self, next: LifecycleState) {
        info!(from = ?self.state, to = ?next, "Lifecycle transition");
        self.state = next;
        self.history.push(next);
    }
}

/// Resources of one in-flight lifecycle. Tears down on drop if `tear_down`
/// never finished.
struct Lifecycle<'h> {
    harness: &'h mut Harness,
    database: Option<DatabaseHandle>,
    app: Option<AppHandle>,
    torn_down: bool,
}

impl Lifecycle<'_> {
    async fn drive<F, Fut, T>(&mut self, scenario: F) -> Result<T>
    where
        F: FnOnce(TestEnvironment) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.harness.transition(LifecycleState::Provisioning);
        let database = acquire_with(self.harness.provisioner.as_ref(), &self.harness.config).await?;
        let descriptor = database.descriptor().clone();
        self.database = Some(database);
        self.harness.transition(LifecycleState::Ready);

        self.harness.transition(LifecycleState::AppBooting);
        let app = boot_within(
            &descriptor,
            self.harness.migrations.as_ref(),
            self.harness.config.boot_timeout,
        )
        .await?;
        self.app = Some(app.clone());
        self.harness.transition(LifecycleState::AppReady);

        self.harness.transition(LifecycleState::Executing);
        let env = TestEnvironment { app, descriptor };
        match AssertUnwindSafe(async move { scenario(env).await })
            .catch_unwind()
            .await
        {
            Ok(result) => result,
            Err(payload) => Err(HarnessError::Panicked(panic_message(&*payload))),
        }
    }

    async fn tear_down(&mut self) -> Option<HarnessError> {
        self.harness.transition(LifecycleState::TearingDown);

        if let Some(app) = self.app.take() {
            app.dispose().await;
        }

        let failure = match self.database.as_mut() {
            Some(database) => database.release().await.err(),
            None => None,
        };
        if let Some(e) = &failure {
            error!(error = %e, "Teardown failed");
        }

        self.finish();
        failure
    }

    fn finish(&mut self) {
        self.torn_down = true;
        self.harness.teardown_count += 1;
        self.harness.transition(LifecycleState::Disposed);
    }
}

impl Drop for Lifecycle<'_> {
    fn drop(&mut self) {
        if self.torn_down {
            return;
        }

        warn!(state = ?self.harness.state, "Lifecycle cancelled; tearing down in background");
        if self.harness.state != LifecycleState::TearingDown {
            self.harness.transition(LifecycleState::TearingDown);
        }
        if let Some(app) = self.app.take() {
            app.dispose_detached();
        }
        // An unreleased handle removes its instance when dropped.
        drop(self.database.take());
        self.finish();
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
