//! Leased phone numbers.

use crate::types::{ActivationId, FullNumber, SmsCode};

#[cfg(feature = "tracing")]
use tracing::warn;

/// Where a rental is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RentalState {
    /// Leased and not yet settled with the provider.
    Active,
    /// A code was used and the activation confirmed.
    Finished,
    /// The number was returned to the provider.
    Cancelled,
}

/// A phone number leased from the SMS provider for one account.
///
/// Owned by the orchestrator run that rented it. Every rental must end in
/// [`RentalState::Finished`] or [`RentalState::Cancelled`]; dropping an
/// active one is a leak of paid balance and is logged.
#[derive(Debug)]
pub struct PhoneRental {
    activation_id: ActivationId,
    number: FullNumber,
    service: String,
    state: RentalState,
    delivered: Vec<SmsCode>,
}

impl PhoneRental {
    pub(crate) fn new(activation_id: ActivationId, number: FullNumber, service: String) -> Self {
        Self {
            activation_id,
            number,
            service,
            state: RentalState::Active,
            delivered: Vec::new(),
        }
    }

    pub fn activation_id(&self) -> &ActivationId {
        &self.activation_id
    }

    pub fn number(&self) -> &FullNumber {
        &self.number
    }

    /// Provider service code the number was rented for.
    pub fn service(&self) -> &str {
        &self.service
    }

    pub fn state(&self) -> RentalState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.state == RentalState::Active
    }

    /// Codes already handed out for this activation, oldest first.
    pub fn delivered_codes(&self) -> &[SmsCode] {
        &self.delivered
    }

    /// Record a code as delivered. Returns false if it was seen before.
    pub(crate) fn record_code(&mut self, code: &SmsCode) -> bool {
        if self.delivered.contains(code) {
            return false;
        }
        self.delivered.push(code.clone());
        true
    }

    pub(crate) fn settle(&mut self, state: RentalState) {
        self.state = state;
    }
}

impl Drop for PhoneRental {
    fn drop(&mut self) {
        #[cfg(feature = "tracing")]
        if self.state == RentalState::Active {
            warn!(
                activation_id = %self.activation_id,
                "Phone rental dropped while still active"
            );
        }
    }
}
