//! In-memory provisioner and migration hooks for lifecycle tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use super::app::MigrationHook;
use super::config::HarnessConfig;
use super::database::{ConnectionDescriptor, DatabaseInstance, DatabaseProvisioner};
use super::error::{HarnessError, Result};
use crate::database::DatabasePool;

/// Hands out instances that point at a closed local port.
///
/// The app boots against them because its pool connects lazily; anything
/// that touches the database fails.
#[derive(Debug, Default)]
pub struct FakeProvisioner {
    provisions: AtomicUsize,
    removals: Arc<AtomicUsize>,
    fail_provision: bool,
    fail_remove: bool,
}

impl FakeProvisioner {
    pub fn failing_provision() -> Self {
        Self {
            fail_provision: true,
            ..Self::default()
        }
    }

    pub fn failing_remove() -> Self {
        Self {
            fail_remove: true,
            ..Self::default()
        }
    }

    pub fn provisions(&self) -> usize {
        self.provisions.load(Ordering::SeqCst)
    }

    pub fn removals(&self) -> usize {
        self.removals.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DatabaseProvisioner for FakeProvisioner {
    async fn provision(&self, config: &HarnessConfig) -> Result<Box<dyn DatabaseInstance>> {
        if self.fail_provision {
            return Err(HarnessError::Provisioning("no container runtime".to_string()));
        }

        let n = self.provisions.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(Box::new(FakeInstance {
            id: format!("fake-{}", n),
            descriptor: ConnectionDescriptor {
                host: "127.0.0.1".to_string(),
                port: 1,
                database: config.database.clone(),
                username: config.username.clone(),
                password: config.password.clone(),
            },
            removals: Arc::clone(&self.removals),
            fail_remove: self.fail_remove,
        }))
    }
}

struct FakeInstance {
    id: String,
    descriptor: ConnectionDescriptor,
    removals: Arc<AtomicUsize>,
    fail_remove: bool,
}

#[async_trait]
impl DatabaseInstance for FakeInstance {
    fn id(&self) -> &str {
        &self.id
    }

    fn descriptor(&self) -> &ConnectionDescriptor {
        &self.descriptor
    }

    async fn remove(&mut self) -> Result<()> {
        self.removals.fetch_add(1, Ordering::SeqCst);
        if self.fail_remove {
            return Err(HarnessError::Teardown(format!("{} refused to go away", self.id)));
        }
        Ok(())
    }
}

/// Counts invocations and optionally fails.
#[derive(Debug, Default)]
pub struct RecordingMigrations {
    calls: AtomicUsize,
    fail: bool,
}

impl RecordingMigrations {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MigrationHook for RecordingMigrations {
    async fn migrate(&self, _pool: &DatabasePool) -> anyhow::Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            anyhow::bail!("relation \"todo_items\" already exists");
        }
        Ok(())
    }
}

/// Hangs for `delay`, keeping the pool it was handed.
#[derive(Debug)]
pub struct SlowMigrations {
    delay: Duration,
    pool: Mutex<Option<DatabasePool>>,
}

impl SlowMigrations {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pool: Mutex::new(None),
        }
    }

    pub fn pool(&self) -> Option<DatabasePool> {
        self.pool.lock().unwrap().clone()
    }
}

#[async_trait]
impl MigrationHook for SlowMigrations {
    async fn migrate(&self, pool: &DatabasePool) -> anyhow::Result<()> {
        *self.pool.lock().unwrap() = Some(pool.clone());
        tokio::time::sleep(self.delay).await;
        Ok(())
    }
}

/// Yield to other tasks until `done` holds. False if it still does not after a second.
pub async fn eventually(mut done: impl FnMut() -> bool) -> bool {
    let wait = async {
        while !done() {
            tokio::task::yield_now().await;
        }
    };
    tokio::time::timeout(Duration::from_secs(1), wait).await.is_ok()
}
