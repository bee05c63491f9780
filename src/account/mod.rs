//! Account records and their durable stores.

pub(crate) mod error;
pub(crate) mod json;
pub(crate) mod ledger;
pub(crate) mod memory;
pub(crate) mod stats;
pub(crate) mod traits;

pub use error::StoreError;
pub use json::JsonAccountStore;
pub use ledger::Ledger;
pub use memory::MemoryAccountStore;
pub use stats::AccountStats;
pub use traits::AccountStore;
