use std::env;
use std::time::Duration;

use super::error::{HarnessError, Result};

/// Settings for one ephemeral database instance and the app booted on it.
#[derive(Debug, Clone)]
pub struct HarnessConfig {
    pub image: String,
    pub tag: String,
    pub database: String,
    pub username: String,
    pub password: String,
    /// Upper bound for the container to start and log readiness.
    pub startup_timeout: Duration,
    /// Upper bound for the first successful connection after startup.
    pub readiness_timeout: Duration,
    pub readiness_interval: Duration,
    /// Upper bound for booting the app and running migrations.
    pub boot_timeout: Duration,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            image: "postgres".to_string(),
            tag: "16-alpine".to_string(),
            database: "postgres".to_string(),
            username: "postgres".to_string(),
            password: "Password12!".to_string(),
            startup_timeout: Duration::from_secs(60),
            readiness_timeout: Duration::from_secs(30),
            readiness_interval: Duration::from_millis(250),
            boot_timeout: Duration::from_secs(60),
        }
    }
}

impl HarnessConfig {
    /// Defaults overridden by `HARNESS_*` environment variables.
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        Ok(Self {
            image: env::var("HARNESS_POSTGRES_IMAGE").unwrap_or(defaults.image),
            tag: env::var("HARNESS_POSTGRES_TAG").unwrap_or(defaults.tag),
            database: env::var("HARNESS_POSTGRES_DB").unwrap_or(defaults.database),
            username: env::var("HARNESS_POSTGRES_USER").unwrap_or(defaults.username),
            password: env::var("HARNESS_POSTGRES_PASSWORD").unwrap_or(defaults.password),
            startup_timeout: secs_from_env("HARNESS_STARTUP_TIMEOUT_SECS")?
                .unwrap_or(defaults.startup_timeout),
            readiness_timeout: secs_from_env("HARNESS_READINESS_TIMEOUT_SECS")?
                .unwrap_or(defaults.readiness_timeout),
            readiness_interval: defaults.readiness_interval,
            boot_timeout: secs_from_env("HARNESS_BOOT_TIMEOUT_SECS")?
                .unwrap_or(defaults.boot_timeout),
        })
    }

    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = database.into();
        self
    }

    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.username = username.into();
        self.password = password.into();
        self
    }

    pub fn with_image(mut self, image: impl Into<String>, tag: impl Into<String>) -> Self {
        self.image = image.into();
        self.tag = tag.into();
        self
    }

    pub fn with_boot_timeout(mut self, timeout: Duration) -> Self {
        self.boot_timeout = timeout;
        self
    }
}

fn secs_from_env(key: &str) -> Result<Option<Duration>> {
    match env::var(key) {
        Ok(value) => parse_secs(key, &value).map(Some),
        Err(_) => Ok(None),
    }
}

fn parse_secs(key: &str, value: &str) -> Result<Duration> {
    value
        .trim()
        .parse::<u64>()
        .map(Duration::from_secs)
        .map_err(|e| HarnessError::Configuration(format!("{} must be whole seconds: {}", key, e)))
}
