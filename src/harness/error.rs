use std::fmt;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, HarnessError>;

#[derive(Debug, Error)]
pub enum HarnessError {
    #[error("Harness configuration error: {0}")]
    Configuration(String),

    #[error("Database provisioning failed: {0}")]
    Provisioning(String),

    #[error("Application boot failed: {0}")]
    Boot(String),

    #[error("Migration failed: {0}")]
    Migration(#[source] anyhow::Error),

    #[error("Request failed: {0}")]
    Request(String),

    #[error(
        "Scenario {method} {path} expected status {expected} but got {actual}; body: {body}"
    )]
    ScenarioAssertion {
        method: String,
        path: String,
        expected: u16,
        actual: u16,
        body: String,
    },

    #[error("Scenario panicked: {0}")]
    Panicked(String),

    #[error("Teardown failed: {0}")]
    Teardown(String),

    #[error("Harness is {0:?}; a harness runs exactly one lifecycle")]
    InvalidState(super::LifecycleState),
}

impl HarnessError {
    /// Whether the failure is a test assertion rather than an infrastructure fault.
    pub fn is_test_failure(&self) -> bool {
        matches!(
            self,
            HarnessError::ScenarioAssertion { .. } | HarnessError::Panicked(_)
        )
    }
}

/// Outcome of a failed lifecycle.
///
/// `primary` is the first thing that went wrong. A teardown failure that
/// happened after it is kept in `teardown` instead of replacing it.
#[derive(Debug)]
pub struct LifecycleError {
    pub primary: HarnessError,
    pub teardown: Option<HarnessError>,
}

impl LifecycleError {
    pub fn new(primary: HarnessError) -> Self {
        Self {
            primary,
            teardown: None,
        }
    }

    /// Merge the scenario outcome with the teardown outcome.
    pub(crate) fn combine<T>(
        outcome: Result<T>,
        teardown: Option<HarnessError>,
    ) -> std::result::Result<T, LifecycleError> {
        match (outcome, teardown) {
            (Ok(value), None) => Ok(value),
            (Ok(_), Some(teardown)) => Err(LifecycleError::new(teardown)),
            (Err(primary), teardown) => Err(LifecycleError { primary, teardown }),
        }
    }
}

impl fmt::Display for LifecycleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.primary)?;
        if let Some(teardown) = &self.teardown {
            write!(f, " (additionally: {})", teardown)?;
        }
        Ok(())
    }
}

impl std::error::Error for LifecycleError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.primary)
    }
}

impl From<HarnessError> for LifecycleError {
    fn from(primary: HarnessError) -> Self {
        LifecycleError::new(primary)
    }
}
