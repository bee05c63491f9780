//! Registration failure taxonomy.

use super::state::RegistrationState;
use crate::account::StoreError;
use crate::driver::DriverError;
use crate::errors::{ConfigError, RetryableError};
use crate::sms::SmsError;
use crate::types::INTERRUPTED_REASON;
use std::error::Error as StdError;
use std::fmt::{self, Display, Formatter};
use thiserror::Error;

/// Class of an account-local failure.
///
/// The marker is the first token of the stored `failure_reason`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// No number, profile or proxy could be obtained.
    ProvisioningFailure,
    /// A bounded UI wait expired.
    Timeout,
    /// No usable code arrived in time, or the provider closed the activation.
    VerificationTimeout,
    /// The form kept rejecting the number or the code.
    VerificationRejected,
    /// The driver could not complete a UI action.
    FormInteractionFailure,
    /// The record was left `in_progress` by a crashed run.
    CrashRecovered,
    /// The run was cancelled from outside.
    Cancelled,
    /// The run hit an error that also stopped the batch.
    Fatal,
}

impl FailureKind {
    const ALL: [FailureKind; 8] = [
        FailureKind::ProvisioningFailure,
        FailureKind::Timeout,
        FailureKind::VerificationTimeout,
        FailureKind::VerificationRejected,
        FailureKind::FormInteractionFailure,
        FailureKind::CrashRecovered,
        FailureKind::Cancelled,
        FailureKind::Fatal,
    ];

    pub fn marker(self) -> &'static str {
        match self {
            FailureKind::ProvisioningFailure => "provisioning_failure",
            FailureKind::Timeout => "timeout",
            FailureKind::VerificationTimeout => "verification_timeout",
            FailureKind::VerificationRejected => "verification_rejected",
            FailureKind::FormInteractionFailure => "form_interaction_failure",
            FailureKind::CrashRecovered => INTERRUPTED_REASON,
            FailureKind::Cancelled => "cancelled",
            FailureKind::Fatal => "fatal_error",
        }
    }

    /// Classify a stored `failure_reason` by its leading marker.
    pub fn from_reason(reason: &str) -> Option<Self> {
        let marker = reason.split(':').next().unwrap_or(reason).trim();
        Self::ALL.into_iter().find(|kind| kind.marker() == marker)
    }
}

impl Display for FailureKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.marker())
    }
}

/// Why one account attempt failed.
///
/// Displays as `<marker>: <message> (at <STATE>)`, which is what ends up in
/// the record's `failure_reason`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}: {message} (at {state})", kind.marker())]
pub struct RegistrationFailure {
    pub kind: FailureKind,
    /// Last state reached before the failure.
    pub state: RegistrationState,
    pub message: String,
}

impl RegistrationFailure {
    pub fn new(kind: FailureKind, state: RegistrationState, message: impl Into<String>) -> Self {
        Self {
            kind,
            state,
            message: message.into(),
        }
    }
}

/// Errors that stop the whole batch.
#[derive(Debug, Error)]
pub enum FatalError {
    /// The SMS provider rejected credentials or configuration.
    #[error("SMS provider error: {0}")]
    Provider(#[source] SmsError),

    #[error("profile provisioner error: {source}")]
    Provisioner {
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },

    #[error("account store error: {0}")]
    Store(#[from] StoreError),

    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("provider balance {balance:.2} is below the required {required:.2}")]
    InsufficientBalance { balance: f64, required: f64 },

    /// A batch worker task panicked or was aborted.
    #[error("batch worker failed: {0}")]
    Worker(String),
}

/// Error raised inside a run, before it is tied to a state.
#[derive(Debug)]
pub(crate) enum StepError {
    Failed { kind: FailureKind, message: String },
    Fatal(FatalError),
}

impl StepError {
    pub(crate) fn failed(kind: FailureKind, message: impl Into<String>) -> Self {
        StepError::Failed {
            kind,
            message: message.into(),
        }
    }

    /// Classify an SMS error. Non-fatal provider errors fall back to `kind`.
    pub(crate) fn sms(err: SmsError, kind: FailureKind) -> Self {
        if err.is_fatal() {
            return StepError::Fatal(FatalError::Provider(err));
        }
        let kind = match &err {
            SmsError::NoNumbersAvailable { .. } => FailureKind::ProvisioningFailure,
            SmsError::SmsTimeout { .. } | SmsError::ActivationExpired { .. } => {
                FailureKind::VerificationTimeout
            }
            SmsError::Cancelled { .. } => FailureKind::Cancelled,
            SmsError::Provider { .. } => kind,
        };
        StepError::failed(kind, err.to_string())
    }

    pub(crate) fn provisioner<E>(err: E) -> Self
    where
        E: StdError + RetryableError + Send + Sync + 'static,
    {
        if err.is_fatal() {
            StepError::Fatal(FatalError::Provisioner {
                source: Box::new(err),
            })
        } else {
            StepError::failed(FailureKind::ProvisioningFailure, err.to_string())
        }
    }
}

impl From<DriverError> for StepError {
    fn from(err: DriverError) -> Self {
        let kind = match err {
            DriverError::Timeout { .. } => FailureKind::Timeout,
            _ => FailureKind::FormInteractionFailure,
        };
        StepError::failed(kind, err.to_string())
    }
}

impl From<StoreError> for StepError {
    fn from(err: StoreError) -> Self {
        StepError::Fatal(FatalError::Store(err))
    }
}
