//! Phone verification service.

use super::config::SmsConfig;
use super::error::SmsError;
use super::rental::{PhoneRental, RentalState};
use crate::errors::RetryableError;
use crate::providers::{PollResponse, RentResponse, SmsProvider};
use crate::types::{ActivationId, FullNumber, SmsCode};
use backon::Retryable;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

#[cfg(feature = "tracing")]
use tracing::{debug, error, info, warn};

/// Result of a single poll on a rental.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodeStatus {
    /// Nothing new yet.
    Pending,
    /// A code that has not been handed out before.
    Code(SmsCode),
    /// The provider closed the activation.
    Expired,
    /// The rental is already finished or cancelled; the provider was not contacted.
    Closed,
}

enum RentFailure {
    Busy,
    Provider(SmsError),
}

/// Drives the rent / poll / finish / cancel lifecycle of phone rentals.
///
/// # Example
///
/// ```rust,ignore
/// use signup_orchestrator::{SmsVerifier, SmsConfig};
/// use tokio_util::sync::CancellationToken;
///
/// let verifier = SmsVerifier::new(provider, SmsConfig::default().with_service("svc"));
/// let mut rental = verifier.rent_number().await?;
/// match verifier.wait_for_code(&mut rental, &CancellationToken::new()).await {
///     Ok(code) => {
///         // submit the code, then
///         verifier.finish(&mut rental).await?;
///     }
///     Err(_) => verifier.release(&mut rental).await?,
/// }
/// ```
#[derive(Debug, Clone)]
pub struct SmsVerifier<P: SmsProvider> {
    provider: P,
    config: SmsConfig,
}

impl<P: SmsProvider> SmsVerifier<P> {
    pub fn new(provider: P, config: SmsConfig) -> Self {
        Self { provider, config }
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn config(&self) -> &SmsConfig {
        &self.config
    }

    /// Rent a number, backing off while the provider is out of stock.
    ///
    /// Makes at most `rent_retry.max_attempts()` calls. Provider errors are
    /// returned immediately; transient ones are expected to be retried by a
    /// [`RetryingSmsProvider`](crate::RetryingSmsProvider) underneath.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(
            name = "sms.rent_number",
            skip_all,
            fields(service = %self.config.service, country = %self.config.country.iso_short_name())
        )
    )]
    pub async fn rent_number(&self) -> Result<PhoneRental, SmsError> {
        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&attempts);
        let provider = &self.provider;
        let service = self.config.service.as_str();
        let country = &self.config.country;

        let result = (|| {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                match provider.rent(service, country).await {
                    Ok(RentResponse::Rented {
                        activation_id,
                        number,
                    }) => Ok((activation_id, number)),
                    Ok(RentResponse::Busy) => Err(RentFailure::Busy),
                    Err(e) => Err(RentFailure::Provider(SmsError::provider(e))),
                }
            }
        })
        .retry(self.config.rent_retry.build_strategy())
        .when(|failure: &RentFailure| matches!(failure, RentFailure::Busy))
        .notify(|_failure, _delay| {
            #[cfg(feature = "tracing")]
            warn!(
                retry_after_secs = %_delay.as_secs_f64(),
                "No numbers available, backing off"
            );
        })
        .await;

        match result {
            Ok((activation_id, number)) => {
                #[cfg(feature = "tracing")]
                info!(activation_id = %activation_id, "Phone number acquired");
                Ok(self.rental(activation_id, number))
            }
            Err(RentFailure::Busy) => Err(SmsError::NoNumbersAvailable {
                service: self.config.service.clone(),
                attempts: attempts.load(Ordering::SeqCst),
            }),
            Err(RentFailure::Provider(e)) => {
                #[cfg(feature = "tracing")]
                error!(error = %e, "Provider error while renting a number");
                Err(e)
            }
        }
    }

    fn rental(&self, activation_id: ActivationId, number: FullNumber) -> PhoneRental {
        PhoneRental::new(activation_id, number, self.config.service.clone())
    }

    /// Poll the provider once.
    ///
    /// Idempotent once a rental is settled: finished or cancelled rentals
    /// answer [`CodeStatus::Closed`] without a provider call, and a code that
    /// was already handed out is reported as [`CodeStatus::Pending`].
    pub async fn poll(&self, rental: &mut PhoneRental) -> Result<CodeStatus, SmsError> {
        if !rental.is_active() {
            return Ok(CodeStatus::Closed);
        }

        match self
            .provider
            .poll(rental.activation_id())
            .await
            .map_err(SmsError::provider)?
        {
            PollResponse::Pending => Ok(CodeStatus::Pending),
            PollResponse::Cancelled => Ok(CodeStatus::Expired),
            PollResponse::Code(code) => {
                if rental.record_code(&code) {
                    Ok(CodeStatus::Code(code))
                } else {
                    Ok(CodeStatus::Pending)
                }
            }
        }
    }

    /// Poll at `poll_interval` until a new code arrives.
    ///
    /// Bounded by `code_timeout`. The rental is left active on every error;
    /// releasing it is the caller's job so it is cancelled exactly once.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(
            name = "sms.wait_for_code",
            skip_all,
            fields(activation_id = %rental.activation_id())
        )
    )]
    pub async fn wait_for_code(
        &self,
        rental: &mut PhoneRental,
        cancel: &CancellationToken,
    ) -> Result<SmsCode, SmsError> {
        let timeout = self.config.code_timeout;
        let poll_interval = self.config.poll_interval;
        let start = Instant::now();
        let mut poll_count = 0u32;

        #[cfg(feature = "tracing")]
        debug!(timeout_secs = %timeout.as_secs_f64(), "Starting SMS code polling");

        loop {
            if cancel.is_cancelled() {
                return Err(SmsError::Cancelled {
                    elapsed: start.elapsed(),
                    poll_count,
                    activation_id: rental.activation_id().clone(),
                });
            }

            if start.elapsed() >= timeout {
                #[cfg(feature = "tracing")]
                warn!(
                    timeout_secs = %timeout.as_secs_f64(),
                    poll_count,
                    "Timeout reached waiting for SMS code"
                );
                return Err(SmsError::SmsTimeout {
                    timeout,
                    elapsed: start.elapsed(),
                    poll_count,
                    activation_id: rental.activation_id().clone(),
                });
            }

            poll_count += 1;
            match self.poll(rental).await {
                Ok(CodeStatus::Code(code)) => {
                    #[cfg(feature = "tracing")]
                    {
                        info!(
                            elapsed_secs = %start.elapsed().as_secs_f64(),
                            poll_count,
                            "SMS code received"
                        );
                        debug!(code = %code, "SMS code value");
                    }
                    return Ok(code);
                }
                Ok(CodeStatus::Pending) => {}
                Ok(CodeStatus::Expired) | Ok(CodeStatus::Closed) => {
                    return Err(SmsError::ActivationExpired {
                        activation_id: rental.activation_id().clone(),
                    });
                }
                Err(e) if !e.is_retryable() => {
                    #[cfg(feature = "tracing")]
                    error!(error = %e, "Permanent error during polling");
                    return Err(e);
                }
                Err(_e) => {
                    #[cfg(feature = "tracing")]
                    warn!(error = %_e, "Transient error during polling, continuing");
                }
            }

            // never sleep past the deadline
            let pause = poll_interval.min(timeout.saturating_sub(start.elapsed()));
            tokio::select! {
                _ = cancel.cancelled() => {}
                _ = tokio::time::sleep(pause) => {}
            }
        }
    }

    /// Ask the provider for another SMS on the same number.
    ///
    /// Only fatal provider errors are returned; anything else is logged and
    /// the caller keeps polling.
    pub async fn request_resend(&self, rental: &PhoneRental) -> Result<(), SmsError> {
        if !rental.is_active() {
            return Ok(());
        }
        match self.provider.request_resend(rental.activation_id()).await {
            Ok(()) => Ok(()),
            Err(e) if e.is_fatal() => Err(SmsError::provider(e)),
            Err(_e) => {
                #[cfg(feature = "tracing")]
                warn!(error = %_e, "Resend request failed");
                Ok(())
            }
        }
    }

    /// Confirm a used code with the provider.
    ///
    /// The rental counts as consumed even if the confirmation fails: the
    /// code has been submitted, so cancelling for a refund is no longer
    /// appropriate.
    pub async fn finish(&self, rental: &mut PhoneRental) -> Result<(), SmsError> {
        if !rental.is_active() {
            return Ok(());
        }
        rental.settle(RentalState::Finished);
        self.provider
            .finish(rental.activation_id())
            .await
            .map_err(SmsError::provider)?;

        #[cfg(feature = "tracing")]
        debug!(activation_id = %rental.activation_id(), "Activation finished");
        Ok(())
    }

    /// Cancel an active rental. Settled rentals are left untouched.
    ///
    /// The rental is marked cancelled before the provider call, so a failed
    /// cancel is never repeated.
    pub async fn release(&self, rental: &mut PhoneRental) -> Result<(), SmsError> {
        if !rental.is_active() {
            return Ok(());
        }
        rental.settle(RentalState::Cancelled);
        self.provider
            .cancel(rental.activation_id())
            .await
            .map_err(SmsError::provider)?;

        #[cfg(feature = "tracing")]
        debug!(activation_id = %rental.activation_id(), "Activation cancelled");
        Ok(())
    }

    /// Current provider balance.
    pub async fn balance(&self) -> Result<f64, SmsError> {
        self.provider.balance().await.map_err(SmsError::provider)
    }
}
