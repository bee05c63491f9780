//! SMS provider abstraction.

pub(crate) mod retryable;
pub(crate) mod traits;

pub use retryable::{OnRetryCallback, RetryingSmsProvider};
pub use traits::{PollResponse, RentResponse, SmsProvider};
