//! Retrying provider wrapper.

use super::traits::{PollResponse, RentResponse, SmsProvider};
use crate::errors::RetryableError;
use crate::types::ActivationId;
use crate::utils::retry::RetryConfig;
use backon::Retryable;
use keshvar::Country;
use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;

#[cfg(feature = "tracing")]
use tracing::debug;

/// Callback type for retry notifications.
///
/// Receives the error that caused the retry and the delay until the next
/// attempt.
pub type OnRetryCallback<E> = Arc<dyn Fn(&E, Duration) + Send + Sync>;

/// Wrapper that retries transient provider errors.
///
/// Only errors with `is_retryable() == true` are retried. `Busy` from
/// `rent` is a regular response, not an error, and passes straight
/// through: stock exhaustion is handled by the verifier's own backoff.
///
/// `finish`, `cancel` and `request_resend` are not retried; they change
/// provider-side state and a blind repeat could double-apply.
///
/// # Example
///
/// ```rust,ignore
/// use signup_orchestrator::{RetryingSmsProvider, RetryConfig};
/// use std::time::Duration;
///
/// let provider = RetryingSmsProvider::with_config(
///     base_provider,
///     RetryConfig::default().with_max_retries(5),
/// )
/// .with_on_retry(|error, delay| eprintln!("retry in {delay:?}: {error}"));
/// ```
pub struct RetryingSmsProvider<P: SmsProvider> {
    inner: Arc<P>,
    retry_config: RetryConfig,
    on_retry: Option<OnRetryCallback<P::Error>>,
}

impl<P: SmsProvider> Clone for RetryingSmsProvider<P> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            retry_config: self.retry_config.clone(),
            on_retry: self.on_retry.clone(),
        }
    }
}

impl<P: SmsProvider + Debug> Debug for RetryingSmsProvider<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryingSmsProvider")
            .field("inner", &self.inner)
            .field("retry_config", &self.retry_config)
            .field("on_retry", &self.on_retry.as_ref().map(|_| "..."))
            .finish()
    }
}

impl<P: SmsProvider> RetryingSmsProvider<P> {
    /// Wrap a provider with default retry logic.
    pub fn new(inner: P) -> Self {
        Self::with_config(inner, RetryConfig::default())
    }

    /// Wrap a provider with custom retry configuration.
    pub fn with_config(inner: P, retry_config: RetryConfig) -> Self {
        Self {
            inner: Arc::new(inner),
            retry_config,
            on_retry: None,
        }
    }

    /// Set a callback to be invoked on each retry attempt.
    pub fn with_on_retry<F>(mut self, callback: F) -> Self
    where
        F: Fn(&P::Error, Duration) + Send + Sync + 'static,
    {
        self.on_retry = Some(Arc::new(callback));
        self
    }

    /// Get reference to the inner provider.
    pub fn inner(&self) -> &P {
        &self.inner
    }

    /// Get reference to the retry configuration.
    pub fn retry_config(&self) -> &RetryConfig {
        &self.retry_config
    }
}

impl<P: SmsProvider> SmsProvider for RetryingSmsProvider<P>
where
    P::Error: Debug,
{
    type Error = P::Error;

    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(
            name = "RetryingSmsProvider::rent",
            skip_all,
            fields(service = %service, country = %country.iso_short_name())
        )
    )]
    async fn rent(&self, service: &str, country: &Country) -> Result<RentResponse, Self::Error> {
        let inner = Arc::clone(&self.inner);
        let on_retry = self.on_retry.clone();
        (|| {
            let inner = Arc::clone(&inner);
            let service = service.to_string();
            let country = country.clone();
            async move { inner.rent(&service, &country).await }
        })
        .retry(self.retry_config.build_strategy())
        .when(|err: &Self::Error| err.is_retryable())
        .notify(move |err, duration| {
            if let Some(ref callback) = on_retry {
                callback(err, duration);
            }

            #[cfg(feature = "tracing")]
            debug!(
                error = ?err,
                retry_after_secs = %duration.as_secs_f64(),
                "Retrying rent"
            );
        })
        .await
    }

    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(
            name = "RetryingSmsProvider::poll",
            skip_all,
            fields(activation_id = %activation_id)
        )
    )]
    async fn poll(&self, activation_id: &ActivationId) -> Result<PollResponse, Self::Error> {
        let inner = Arc::clone(&self.inner);
        let activation_id = activation_id.clone();
        let on_retry = self.on_retry.clone();
        (|| {
            let inner = Arc::clone(&inner);
            let activation_id = activation_id.clone();
            async move { inner.poll(&activation_id).await }
        })
        .retry(self.retry_config.build_strategy())
        .when(|err: &Self::Error| err.is_retryable())
        .notify(move |err, duration| {
            if let Some(ref callback) = on_retry {
                callback(err, duration);
            }

            #[cfg(feature = "tracing")]
            debug!(
                error = ?err,
                retry_after_secs = %duration.as_secs_f64(),
                "Retrying poll"
            );
        })
        .await
    }

    async fn finish(&self, activation_id: &ActivationId) -> Result<(), Self::Error> {
        self.inner.finish(activation_id).await
    }

    async fn cancel(&self, activation_id: &ActivationId) -> Result<(), Self::Error> {
        self.inner.cancel(activation_id).await
    }

    async fn request_resend(&self, activation_id: &ActivationId) -> Result<(), Self::Error> {
        self.inner.request_resend(activation_id).await
    }

    async fn balance(&self) -> Result<f64, Self::Error> {
        let inner = Arc::clone(&self.inner);
        (|| {
            let inner = Arc::clone(&inner);
            async move { inner.balance().await }
        })
        .retry(self.retry_config.build_strategy())
        .when(|err: &Self::Error| err.is_retryable())
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use thiserror::Error;

    #[derive(Debug, Error)]
    enum FlakyError {
        #[error("connection reset")]
        Reset,
        #[error("bad key")]
        BadKey,
    }

    impl RetryableError for FlakyError {
        fn is_retryable(&self) -> bool {
            matches!(self, FlakyError::Reset)
        }

        fn is_fatal(&self) -> bool {
            matches!(self, FlakyError::BadKey)
        }
    }

    /// Fails `failures` times with `Reset` (or always with `BadKey`), then rents.
    #[derive(Clone)]
    struct FlakyProvider {
        failures: usize,
        bad_key: bool,
        calls: Arc<AtomicUsize>,
    }

    impl SmsProvider for FlakyProvider {
        type Error = FlakyError;

        async fn rent(&self, _service: &str, _country: &Country) -> Result<RentResponse, FlakyError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if self.bad_key {
                return Err(FlakyError::BadKey);
            }
            if n < self.failures {
                return Err(FlakyError::Reset);
            }
            Ok(RentResponse::Rented {
                activation_id: ActivationId::from("1"),
                number: "15550000000".into(),
            })
        }

        async fn poll(&self, _activation_id: &ActivationId) -> Result<PollResponse, FlakyError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(PollResponse::Pending)
        }

        async fn finish(&self, _activation_id: &ActivationId) -> Result<(), FlakyError> {
            Ok(())
        }

        async fn cancel(&self, _activation_id: &ActivationId) -> Result<(), FlakyError> {
            Ok(())
        }

        async fn balance(&self) -> Result<f64, FlakyError> {
            Ok(1.0)
        }
    }

    fn fast_retry() -> RetryConfig {
        RetryConfig::default()
            .with_min_delay(Duration::from_millis(10))
            .with_max_delay(Duration::from_millis(50))
            .with_max_retries(3)
    }

    fn country() -> Country {
        keshvar::Alpha2::US.to_country()
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_errors_are_retried() {
        let calls = Arc::new(AtomicUsize::new(0));
        let retries = Arc::new(AtomicUsize::new(0));
        let retries_seen = Arc::clone(&retries);
        let provider = RetryingSmsProvider::with_config(
            FlakyProvider {
                failures: 2,
                bad_key: false,
                calls: Arc::clone(&calls),
            },
            fast_retry(),
        )
        .with_on_retry(move |_, _| {
            retries_seen.fetch_add(1, Ordering::SeqCst);
        });

        let response = provider.rent("svc", &country()).await.unwrap();
        assert!(matches!(response, RentResponse::Rented { .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(retries.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_permanent_errors_are_not_retried() {
        let calls = Arc::new(AtomicUsize::new(0));
        let provider = RetryingSmsProvider::with_config(
            FlakyProvider {
                failures: 0,
                bad_key: true,
                calls: Arc::clone(&calls),
            },
            fast_retry(),
        );

        let err = provider.rent("svc", &country()).await.unwrap_err();
        assert!(err.is_fatal());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_are_bounded() {
        let calls = Arc::new(AtomicUsize::new(0));
        let provider = RetryingSmsProvider::with_config(
            FlakyProvider {
                failures: usize::MAX,
                bad_key: false,
                calls: Arc::clone(&calls),
            },
            fast_retry(),
        );

        assert!(provider.rent("svc", &country()).await.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }
}
