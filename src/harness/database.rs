//! Ephemeral database instances.
//!
//! [`acquire`] starts a fresh PostgreSQL container and only returns once it
//! accepts TCP connections. The returned [`DatabaseHandle`] owns the instance
//! exclusively; [`DatabaseHandle::release`] removes it and may be called any
//! number of times.

use std::fmt;

use async_trait::async_trait;
use sqlx::{Connection, PgConnection, postgres::PgConnectOptions};
use testcontainers::{
    ContainerAsync, GenericImage, ImageExt,
    core::{IntoContainerPort, WaitFor},
    runners::AsyncRunner,
};
use tokio::time::{Instant, sleep, timeout};
use tracing::{debug, error, info, warn};
use url::Url;

use super::config::HarnessConfig;
use super::error::{HarnessError, Result};

pub const POSTGRES_PORT: u16 = 5432;

const READY_MESSAGE: &str = "database system is ready to accept connections";

/// Where and how to reach a provisioned database.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionDescriptor {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub username: String,
    pub password: String,
}

impl ConnectionDescriptor {
    /// `postgres://` URL for configuration overrides.
    ///
    /// Credentials are percent-encoded, so any username or password survives
    /// a round trip through the driver's URL parser.
    pub fn connection_string(&self) -> Result<String> {
        let invalid = |what: &str| {
            HarnessError::Configuration(format!("cannot encode {} into a connection string", what))
        };

        let mut url = Url::parse("postgres://localhost").map_err(|_| invalid("base url"))?;
        url.set_host(Some(&self.host)).map_err(|e| {
            HarnessError::Configuration(format!("invalid host {:?}: {}", self.host, e))
        })?;
        url.set_port(Some(self.port)).map_err(|_| invalid("port"))?;
        // The URL encoder leaves '%' alone; escape it first so the driver's
        // percent-decoding yields the original text.
        url.set_username(&self.username.replace('%', "%25"))
            .map_err(|_| invalid("username"))?;
        url.set_password(Some(&self.password.replace('%', "%25")))
            .map_err(|_| invalid("password"))?;
        url.set_path(&format!("/{}", self.database));

        Ok(url.into())
    }

    pub fn connect_options(&self) -> PgConnectOptions {
        PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .username(&self.username)
            .password(&self.password)
            .database(&self.database)
    }
}

impl fmt::Debug for ConnectionDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionDescriptor")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// A running database owned by one lifecycle.
#[async_trait]
pub trait DatabaseInstance: Send + Sync {
    fn id(&self) -> &str;

    fn descriptor(&self) -> &ConnectionDescriptor;

    /// Stop and remove the instance with everything attached to it.
    async fn remove(&mut self) -> Result<()>;
}

/// Starts database instances that are ready to accept connections.
#[async_trait]
pub trait DatabaseProvisioner: Send + Sync {
    async fn provision(&self, config: &HarnessConfig) -> Result<Box<dyn DatabaseInstance>>;
}

/// Provisions PostgreSQL containers through the local Docker daemon.
#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresProvisioner;

#[async_trait]
impl DatabaseProvisioner for PostgresProvisioner {
    async fn provision(&self, config: &HarnessConfig) -> Result<Box<dyn DatabaseInstance>> {
        info!(
            image = %config.image,
            tag = %config.tag,
            database = %config.database,
            "Starting ephemeral database container"
        );

        let container = GenericImage::new(config.image.as_str(), config.tag.as_str())
            .with_exposed_port(POSTGRES_PORT.tcp())
            .with_wait_for(WaitFor::message_on_stderr(READY_MESSAGE))
            .with_env_var("POSTGRES_DB", config.database.as_str())
            .with_env_var("POSTGRES_USER", config.username.as_str())
            .with_env_var("POSTGRES_PASSWORD", config.password.as_str())
            .with_startup_timeout(config.startup_timeout)
            .start()
            .await
            .map_err(|e| {
                HarnessError::Provisioning(format!(
                    "failed to start {}:{}: {}",
                    config.image, config.tag, e
                ))
            })?;

        let descriptor = match container_descriptor(&container, config).await {
            Ok(descriptor) => descriptor,
            Err(e) => {
                discard(container).await;
                return Err(e);
            }
        };

        if let Err(e) = wait_until_ready(&descriptor, config).await {
            discard(container).await;
            return Err(e);
        }

        Ok(Box::new(PostgresInstance {
            id: container.id().to_string(),
            container: Some(container),
            descriptor,
        }))
    }
}

async fn container_descriptor(
    container: &ContainerAsync<GenericImage>,
    config: &HarnessConfig,
) -> Result<ConnectionDescriptor> {
    let host = container
        .get_host()
        .await
        .map_err(|e| HarnessError::Provisioning(format!("cannot resolve container host: {}", e)))?;
    let port = container
        .get_host_port_ipv4(POSTGRES_PORT.tcp())
        .await
        .map_err(|e| {
            HarnessError::Provisioning(format!("port {} is not mapped: {}", POSTGRES_PORT, e))
        })?;

    Ok(ConnectionDescriptor {
        host: host.to_string(),
        port,
        database: config.database.clone(),
        username: config.username.clone(),
        password: config.password.clone(),
    })
}

/// Poll real connections until one succeeds.
///
/// The log line alone is not enough: the image's init step runs a temporary
/// server that prints it too but does not listen on TCP.
async fn wait_until_ready(descriptor: &ConnectionDescriptor, config: &HarnessConfig) -> Result<()> {
    let options = descriptor.connect_options();
    let started = Instant::now();
    let mut attempts = 0u32;
    let mut last_error = None;

    let poll = async {
        loop {
            attempts += 1;
            match PgConnection::connect_with(&options).await {
                Ok(conn) => {
                    let _ = conn.close().await;
                    return;
                }
                Err(e) => {
                    debug!(attempt = attempts, error = %e, "Database not accepting connections");
                    last_error = Some(e.to_string());
                    sleep(config.readiness_interval).await;
                }
            }
        }
    };

    if timeout(config.readiness_timeout, poll).await.is_err() {
        return Err(HarnessError::Provisioning(format!(
            "database at {}:{} not ready after {:?} ({} attempts, last error: {})",
            descriptor.host,
            descriptor.port,
            config.readiness_timeout,
            attempts,
            last_error.as_deref().unwrap_or("none")
        )));
    }

    info!(
        attempts,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Database accepting connections"
    );
    Ok(())
}

async fn discard(container: ContainerAsync<GenericImage>) {
    let id = container.id().to_string();
    if let Err(e) = container.rm().await {
        warn!(container_id = %id, error = %e, "Failed to remove container after startup error");
    }
}

struct PostgresInstance {
    id: String,
    container: Option<ContainerAsync<GenericImage>>,
    descriptor: ConnectionDescriptor,
}

#[async_trait]
impl DatabaseInstance for PostgresInstance {
    fn id(&self) -> &str {
        &self.id
    }

    fn descriptor(&self) -> &ConnectionDescriptor {
        &self.descriptor
    }

    async fn remove(&mut self) -> Result<()> {
        let Some(container) = self.container.take() else {
            return Ok(());
        };

        if let Err(e) = container.stop().await {
            warn!(container_id = %self.id, error = %e, "Container did not stop cleanly");
        }
        container.rm().await.map_err(|e| {
            HarnessError::Teardown(format!("failed to remove container {}: {}", self.id, e))
        })?;

        info!(container_id = %self.id, "Database container removed");
        Ok(())
    }
}

/// Exclusive handle to a provisioned database.
///
/// Dropping a handle that was never released hands the instance to a
/// background task on the current runtime, which removes it.
pub struct DatabaseHandle {
    id: String,
    instance: Option<Box<dyn DatabaseInstance>>,
    descriptor: ConnectionDescriptor,
}

impl DatabaseHandle {
    pub fn descriptor(&self) -> &ConnectionDescriptor {
        &self.descriptor
    }

    pub fn instance_id(&self) -> &str {
        &self.id
    }

    pub fn is_released(&self) -> bool {
        self.instance.is_none()
    }

    /// Stop and remove the instance. Calls after the first are no-ops.
    pub async fn release(&mut self) -> Result<()> {
        let Some(mut instance) = self.instance.take() else {
            debug!(instance_id = %self.id, "Database already released");
            return Ok(());
        };

        info!(instance_id = %self.id, "Releasing ephemeral database");
        instance.remove().await
    }
}

impl fmt::Debug for DatabaseHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseHandle")
            .field("instance_id", &self.id)
            .field("descriptor", &self.descriptor)
            .field("released", &self.is_released())
            .finish()
    }
}

impl Drop for DatabaseHandle {
    fn drop(&mut self) {
        let Some(mut instance) = self.instance.take() else {
            return;
        };

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            error!(instance_id = %self.id, "DatabaseHandle dropped outside a runtime");
            return;
        };

        warn!(instance_id = %self.id, "DatabaseHandle dropped without release");
        let id = self.id.clone();
        runtime.spawn(async move {
            if let Err(e) = instance.remove().await {
                error!(instance_id = %id, error = %e, "Background removal failed");
            }
        });
    }
}

/// Start a PostgreSQL container and wait until it accepts connections.
pub async fn acquire(config: &HarnessConfig) -> Result<DatabaseHandle> {
    acquire_with(&PostgresProvisioner, config).await
}

/// [`acquire`] through any provisioner.
pub async fn acquire_with(
    provisioner: &dyn DatabaseProvisioner,
    config: &HarnessConfig,
) -> Result<DatabaseHandle> {
    let instance = provisioner.provision(config).await?;
    let descriptor = instance.descriptor().clone();

    info!(
        instance_id = instance.id(),
        host = %descriptor.host,
        port = descriptor.port,
        "Ephemeral database ready"
    );

    Ok(DatabaseHandle {
        id: instance.id().to_string(),
        instance: Some(instance),
        descriptor,
    })
}
