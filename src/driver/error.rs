//! Driver error types.

use crate::errors::RetryableError;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Errors reported by a browser/UI driver.
#[derive(Debug, Error)]
pub enum DriverError {
    #[error("element not found: {locator}")]
    ElementNotFound { locator: String },

    #[error("{action} on {locator} failed: {message}")]
    Interaction {
        locator: String,
        action: &'static str,
        message: String,
    },

    #[error("navigation to {url} failed: {message}")]
    Navigation { url: String, message: String },

    #[error("timed out after {:.1}s waiting for {condition}", timeout.as_secs_f64())]
    Timeout { condition: String, timeout: Duration },

    #[error("screenshot to {} failed: {message}", path.display())]
    Screenshot { path: PathBuf, message: String },

    /// The browser or emulator went away.
    #[error("session lost: {0}")]
    SessionLost(String),
}

impl RetryableError for DriverError {
    fn is_retryable(&self) -> bool {
        false
    }

    fn should_retry_operation(&self) -> bool {
        matches!(self, DriverError::SessionLost(_) | DriverError::Timeout { .. })
    }
}
