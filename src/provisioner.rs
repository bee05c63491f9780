//! Profile and proxy provisioning.

use crate::driver::BrowserDriver;
use crate::errors::RetryableError;
use serde::{Deserialize, Serialize};
use std::error::Error as StdError;
use std::fmt::{self, Display, Formatter};
use std::future::Future;
use thiserror::Error;

/// Identity of one provisioned browser profile.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionHandle {
    /// Profile id at the provisioner.
    pub profile_id: String,
    /// Egress the profile is bound to, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxy: Option<String>,
}

impl SessionHandle {
    pub fn new(profile_id: impl Into<String>) -> Self {
        Self {
            profile_id: profile_id.into(),
            proxy: None,
        }
    }

    pub fn with_proxy(mut self, proxy: impl Into<String>) -> Self {
        self.proxy = Some(proxy.into());
        self
    }
}

impl Display for SessionHandle {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match &self.proxy {
            Some(proxy) => write!(f, "{}@{}", self.profile_id, proxy),
            None => write!(f, "{}", self.profile_id),
        }
    }
}

/// Ready-made error type for provisioner implementations.
#[derive(Debug, Error)]
pub enum ProvisionError {
    /// No profile or egress address is free right now.
    #[error("no profile available: {0}")]
    Unavailable(String),

    /// The provisioner rejected our credentials or configuration.
    #[error("provisioner rejected credentials: {0}")]
    Unauthorized(String),

    #[error("provisioning failed: {0}")]
    Failed(String),
}

impl RetryableError for ProvisionError {
    fn is_retryable(&self) -> bool {
        false
    }

    fn should_retry_operation(&self) -> bool {
        matches!(self, ProvisionError::Unavailable(_))
    }

    fn is_fatal(&self) -> bool {
        matches!(self, ProvisionError::Unauthorized(_))
    }
}

/// Source of isolated browser sessions.
///
/// Each session is used for exactly one account attempt and handed back
/// through [`release_profile`](Self::release_profile) whatever the outcome.
pub trait ProfileProvisioner: Send + Sync {
    /// Driver bound to a provisioned profile.
    type Session: BrowserDriver + 'static;

    /// Error type returned by provisioner operations.
    ///
    /// `should_retry_operation()` marks "nothing free right now";
    /// `is_fatal()` marks credential or configuration problems.
    type Error: StdError + RetryableError + Send + Sync + 'static;

    /// Obtain a fresh profile with its own egress.
    fn acquire_profile(&self) -> impl Future<Output = Result<Self::Session, Self::Error>> + Send;

    /// Tear the session down and free the profile.
    fn release_profile(
        &self,
        session: Self::Session,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Move the session to a new egress address.
    ///
    /// Default implementation does nothing.
    fn rotate_ip(
        &self,
        session: &Self::Session,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send {
        let _ = session;
        async { Ok(()) }
    }
}
