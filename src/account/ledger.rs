//! In-memory record list with the status transition rules.

use super::error::StoreError;
use super::stats::AccountStats;
use crate::types::{AccountId, AccountRecord, AccountStatus, INTERRUPTED_REASON, RecordPatch};
use std::collections::HashSet;

/// Ordered account records.
///
/// Every status change in every store goes through [`Ledger::transition`],
/// which is the only place the transition table is enforced.
#[derive(Debug, Clone, Default)]
pub struct Ledger {
    records: Vec<AccountRecord>,
}

impl Ledger {
    /// Build a ledger, keeping insertion order. Ids must be unique.
    pub fn new(records: Vec<AccountRecord>) -> Result<Self, StoreError> {
        let mut seen = HashSet::with_capacity(records.len());
        for record in &records {
            if !seen.insert(&record.id) {
                return Err(StoreError::DuplicateId {
                    id: record.id.clone(),
                });
            }
        }
        Ok(Self { records })
    }

    pub fn records(&self) -> &[AccountRecord] {
        &self.records
    }

    pub fn get(&self, id: &AccountId) -> Result<&AccountRecord, StoreError> {
        self.records
            .iter()
            .find(|r| &r.id == id)
            .ok_or_else(|| StoreError::UnknownAccount { id: id.clone() })
    }

    fn get_mut(&mut self, id: &AccountId) -> Result<&mut AccountRecord, StoreError> {
        self.records
            .iter_mut()
            .find(|r| &r.id == id)
            .ok_or_else(|| StoreError::UnknownAccount { id: id.clone() })
    }

    /// First pending record in insertion order.
    pub fn next_eligible(&self) -> Option<&AccountRecord> {
        self.records
            .iter()
            .find(|r| r.status == AccountStatus::Pending)
    }

    /// Ids of pending records in insertion order, at most `limit`.
    pub fn eligible(&self, limit: Option<usize>) -> Vec<AccountId> {
        self.records
            .iter()
            .filter(|r| r.status == AccountStatus::Pending)
            .take(limit.unwrap_or(usize::MAX))
            .map(|r| r.id.clone())
            .collect()
    }

    /// Compare-and-set status change.
    ///
    /// Fails with [`StoreError::StatusConflict`] when the record is not in
    /// `from`, and with [`StoreError::InvalidTransition`] when the table
    /// forbids `from -> to`. Moving to `in_progress` bumps `attempts` and
    /// clears the previous failure reason.
    pub fn transition(
        &mut self,
        id: &AccountId,
        from: AccountStatus,
        to: AccountStatus,
        patch: RecordPatch,
    ) -> Result<AccountRecord, StoreError> {
        if !from.can_transition_to(to) {
            return Err(StoreError::InvalidTransition {
                id: id.clone(),
                from,
                to,
            });
        }

        let record = self.get_mut(id)?;
        if record.status != from {
            return Err(StoreError::StatusConflict {
                id: id.clone(),
                expected: from,
                actual: record.status,
            });
        }

        record.status = to;
        if to == AccountStatus::InProgress {
            record.attempts += 1;
            record.failure_reason = None;
        }
        patch.apply(record);
        Ok(record.clone())
    }

    /// Update fields of a record without changing its status.
    ///
    /// Only allowed while the record is `in_progress`, i.e. by the lease holder.
    pub fn update(&mut self, id: &AccountId, patch: RecordPatch) -> Result<(), StoreError> {
        let record = self.get_mut(id)?;
        if record.status != AccountStatus::InProgress {
            return Err(StoreError::StatusConflict {
                id: id.clone(),
                expected: AccountStatus::InProgress,
                actual: record.status,
            });
        }
        patch.apply(record);
        Ok(())
    }

    /// Move every `failed` record back to `pending`. Returns how many moved.
    pub fn reset_failed(&mut self) -> usize {
        let failed: Vec<AccountId> = self
            .records
            .iter()
            .filter(|r| r.status == AccountStatus::Failed)
            .map(|r| r.id.clone())
            .collect();
        for id in &failed {
            let patch = RecordPatch::default().clear_failure_reason();
            let _ = self.transition(id, AccountStatus::Failed, AccountStatus::Pending, patch);
        }
        failed.len()
    }

    /// Reset records left `in_progress` by a crashed run to `pending` with
    /// reason `interrupted`. Returns the ids that were reset.
    pub fn recover_interrupted(&mut self) -> Vec<AccountId> {
        let stuck: Vec<AccountId> = self
            .records
            .iter()
            .filter(|r| r.status == AccountStatus::InProgress)
            .map(|r| r.id.clone())
            .collect();
        for id in &stuck {
            let patch = RecordPatch::default()
                .failure_reason(INTERRUPTED_REASON)
                .clear_transient();
            let _ = self.transition(id, AccountStatus::InProgress, AccountStatus::Pending, patch);
        }
        stuck
    }

    pub fn statistics(&self) -> AccountStats {
        AccountStats::from_records(&self.records)
    }
}
