//! Aggregate counts over an account list.

use crate::types::{AccountRecord, AccountStatus};
use serde::Serialize;

/// Number of records per status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AccountStats {
    pub total: usize,
    pub pending: usize,
    pub in_progress: usize,
    pub success: usize,
    pub failed: usize,
}

impl AccountStats {
    pub fn from_records(records: &[AccountRecord]) -> Self {
        let mut stats = Self {
            total: records.len(),
            ..Self::default()
        };
        for record in records {
            match record.status {
                AccountStatus::Pending => stats.pending += 1,
                AccountStatus::InProgress => stats.in_progress += 1,
                AccountStatus::Success => stats.success += 1,
                AccountStatus::Failed => stats.failed += 1,
            }
        }
        stats
    }

    /// Records in `success` or `failed`.
    pub fn terminal(&self) -> usize {
        self.success + self.failed
    }
}
