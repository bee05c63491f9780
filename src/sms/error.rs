//! Phone verification error types.

use crate::errors::RetryableError;
use crate::types::ActivationId;
use std::error::Error as StdError;
use std::time::Duration;
use thiserror::Error;

/// Errors of the phone verification sub-protocol.
#[derive(Debug, Error)]
pub enum SmsError {
    /// Error from the underlying provider.
    #[error("SMS provider error: {source}")]
    Provider {
        #[source]
        source: Box<dyn StdError + Send + Sync>,
        /// Whether the same call can be retried.
        is_retryable: bool,
        /// Whether a fresh rental might succeed.
        should_retry_operation: bool,
        /// Whether the error invalidates the whole batch.
        is_fatal: bool,
    },

    /// The provider stayed out of stock for every rent attempt.
    #[error("No phone numbers available for service '{service}' after {attempts} attempts")]
    NoNumbersAvailable { service: String, attempts: usize },

    /// No code arrived within the configured timeout.
    #[error(
        "Timeout waiting for SMS code after {:.1}s (polled {} times); Activation id: {activation_id}",
        elapsed.as_secs_f64(),
        poll_count
    )]
    SmsTimeout {
        /// Configured timeout duration.
        timeout: Duration,
        /// Actual elapsed time.
        elapsed: Duration,
        /// Number of poll attempts made.
        poll_count: u32,
        /// The activation that timed out.
        activation_id: ActivationId,
    },

    /// The provider closed the activation before a code arrived.
    #[error("Activation {activation_id} was cancelled by the provider")]
    ActivationExpired { activation_id: ActivationId },

    /// Cancellation was requested while waiting for a code.
    #[error("Operation cancelled after {:.1}s (polled {} times); Activation id: {activation_id}", elapsed.as_secs_f64(), poll_count)]
    Cancelled {
        elapsed: Duration,
        poll_count: u32,
        activation_id: ActivationId,
    },
}

impl SmsError {
    /// Wrap a provider error, keeping its classification.
    pub(crate) fn provider<E>(err: E) -> Self
    where
        E: StdError + RetryableError + Send + Sync + 'static,
    {
        SmsError::Provider {
            is_retryable: err.is_retryable(),
            should_retry_operation: err.should_retry_operation(),
            is_fatal: err.is_fatal(),
            source: Box::new(err),
        }
    }
}

impl RetryableError for SmsError {
    fn is_retryable(&self) -> bool {
        match self {
            SmsError::Provider { is_retryable, .. } => *is_retryable,
            SmsError::NoNumbersAvailable { .. }
            | SmsError::SmsTimeout { .. }
            | SmsError::ActivationExpired { .. }
            | SmsError::Cancelled { .. } => false,
        }
    }

    fn should_retry_operation(&self) -> bool {
        match self {
            SmsError::Provider {
                should_retry_operation,
                ..
            } => *should_retry_operation,
            SmsError::NoNumbersAvailable { .. }
            | SmsError::SmsTimeout { .. }
            | SmsError::ActivationExpired { .. } => true,
            SmsError::Cancelled { .. } => false,
        }
    }

    fn is_fatal(&self) -> bool {
        match self {
            SmsError::Provider { is_fatal, .. } => *is_fatal,
            _ => false,
        }
    }
}
