//! Phone verification: renting numbers, waiting for codes, releasing rentals.

pub(crate) mod config;
pub(crate) mod error;
pub(crate) mod rental;
pub(crate) mod structure;

pub use config::{SmsConfig, SmsConfigBuilder};
pub use error::SmsError;
pub use rental::{PhoneRental, RentalState};
pub use structure::{CodeStatus, SmsVerifier};
