//! Account store error types.

use crate::types::{AccountId, AccountStatus};
use thiserror::Error;

/// Errors raised by account stores.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("unknown account {id}")]
    UnknownAccount { id: AccountId },

    #[error("duplicate account id {id}")]
    DuplicateId { id: AccountId },

    /// The record is not in the expected status; another worker holds or
    /// already settled it.
    #[error("account {id} is {actual}, expected {expected}")]
    StatusConflict {
        id: AccountId,
        expected: AccountStatus,
        actual: AccountStatus,
    },

    #[error("account {id}: transition {from} -> {to} is not allowed")]
    InvalidTransition {
        id: AccountId,
        from: AccountStatus,
        to: AccountStatus,
    },

    #[error("account file I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("account file is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}
