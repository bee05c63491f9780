//! SMS provider trait definition.

use crate::errors::RetryableError;
use crate::types::{ActivationId, FullNumber, SmsCode};
use keshvar::Country;
use std::error::Error as StdError;
use std::future::Future;

/// Result of asking the provider for a number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RentResponse {
    /// A number was leased.
    Rented {
        activation_id: ActivationId,
        number: FullNumber,
    },
    /// No numbers in stock for the service/country right now.
    Busy,
}

/// Result of polling an activation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollResponse {
    /// No SMS yet.
    Pending,
    /// A code arrived.
    Code(SmsCode),
    /// The provider closed the activation (expired or cancelled on its side).
    Cancelled,
}

/// Pay-per-number SMS relay.
///
/// The operations mirror the rental lifecycle: `rent` leases a number,
/// `poll` reads incoming codes, `finish` marks a received code as used and
/// `cancel` returns an unused number (the refund path).
///
/// # Example
///
/// ```rust,ignore
/// use signup_orchestrator::{SmsProvider, RentResponse, PollResponse, ActivationId};
/// use keshvar::Country;
///
/// #[derive(Clone)]
/// struct MyProvider { /* ... */ }
///
/// impl SmsProvider for MyProvider {
///     type Error = MyError;
///
///     async fn rent(&self, service: &str, country: &Country) -> Result<RentResponse, Self::Error> {
///         // Lease a number for the target service
///     }
///
///     async fn poll(&self, activation_id: &ActivationId) -> Result<PollResponse, Self::Error> {
///         // Read the activation status
///     }
///
///     async fn finish(&self, activation_id: &ActivationId) -> Result<(), Self::Error> { /* ... */ }
///     async fn cancel(&self, activation_id: &ActivationId) -> Result<(), Self::Error> { /* ... */ }
///     async fn balance(&self) -> Result<f64, Self::Error> { /* ... */ }
/// }
/// ```
pub trait SmsProvider: Send + Sync + Clone {
    /// Error type returned by provider operations.
    type Error: StdError + RetryableError + Send + Sync + 'static;

    /// Lease a number for `service` in `country`.
    fn rent(
        &self,
        service: &str,
        country: &Country,
    ) -> impl Future<Output = Result<RentResponse, Self::Error>> + Send;

    /// Check the activation for an incoming code.
    fn poll(
        &self,
        activation_id: &ActivationId,
    ) -> impl Future<Output = Result<PollResponse, Self::Error>> + Send;

    /// Mark the activation as successfully used.
    fn finish(
        &self,
        activation_id: &ActivationId,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Cancel the activation and release the number.
    ///
    /// Call this when:
    /// - no code arrived in time
    /// - the form rejected the number
    /// - the registration failed for any other reason while the number was held
    fn cancel(
        &self,
        activation_id: &ActivationId,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Ask the provider to deliver another SMS on the same activation.
    ///
    /// Default implementation does nothing; providers without resend
    /// support simply keep delivering whatever arrives.
    fn request_resend(
        &self,
        activation_id: &ActivationId,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send {
        let _ = activation_id;
        async { Ok(()) }
    }

    /// Account balance in the provider's currency.
    fn balance(&self) -> impl Future<Output = Result<f64, Self::Error>> + Send;
}
