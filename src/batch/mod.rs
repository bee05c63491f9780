//! Batch processing of the account store.

pub(crate) mod config;
pub(crate) mod runner;

pub use config::BatchConfig;
pub use runner::{BatchRunner, BatchStats};
