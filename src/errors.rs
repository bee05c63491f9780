//! Error classification shared by every collaborator.

/// Trait for errors that can be classified as retryable, permanent or fatal.
///
/// Three levels of classification:
///
/// 1. **Call-level** (`is_retryable`): the same call on the same activation
///    may succeed if repeated (network timeouts, rate limits).
///
/// 2. **Operation-level** (`should_retry_operation`): the call failed for
///    this activation/profile, but a fresh one might work (number banned,
///    activation gone).
///
/// 3. **Batch-level** (`is_fatal`): nothing will work until an operator
///    intervenes (invalid API key, account banned by the provider). Fatal
///    errors stop the whole batch instead of failing a single account.
///
/// # Examples
///
/// ```rust
/// use signup_orchestrator::RetryableError;
///
/// enum MyError {
///     NetworkTimeout,
///     NumberBanned,
///     InvalidApiKey,
/// }
///
/// impl RetryableError for MyError {
///     fn is_retryable(&self) -> bool {
///         matches!(self, MyError::NetworkTimeout)
///     }
///
///     fn should_retry_operation(&self) -> bool {
///         !matches!(self, MyError::InvalidApiKey)
///     }
///
///     fn is_fatal(&self) -> bool {
///         matches!(self, MyError::InvalidApiKey)
///     }
/// }
/// ```
pub trait RetryableError {
    /// Returns true if this error represents a transient failure
    /// that might succeed on retry of the same call.
    fn is_retryable(&self) -> bool;

    /// Returns true if a fresh operation (a new number, a new profile)
    /// might succeed.
    ///
    /// Default implementation returns the same as `is_retryable()`.
    fn should_retry_operation(&self) -> bool {
        self.is_retryable()
    }

    /// Returns true if the error invalidates the whole batch, e.g. rejected
    /// credentials or a misconfigured service code.
    fn is_fatal(&self) -> bool {
        false
    }
}

/// Invalid configuration value.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// A required value is empty.
    #[error("{field} must not be empty")]
    Empty { field: &'static str },

    /// A duration or count that must be positive is zero.
    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },

    /// Two values contradict each other.
    #[error("{field} is invalid: {message}")]
    Invalid {
        field: &'static str,
        message: String,
    },
}
