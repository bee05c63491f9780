//! Process-local account store.

use super::error::StoreError;
use super::ledger::Ledger;
use super::stats::AccountStats;
use super::traits::AccountStore;
use crate::types::{AccountId, AccountRecord, AccountStatus, RecordPatch};
use std::sync::{Mutex, MutexGuard};

/// Account store kept in memory.
///
/// Useful for tests and for callers that persist the records themselves
/// via [`snapshot`](Self::snapshot).
#[derive(Debug, Default)]
pub struct MemoryAccountStore {
    ledger: Mutex<Ledger>,
}

impl MemoryAccountStore {
    pub fn new(records: Vec<AccountRecord>) -> Result<Self, StoreError> {
        Ok(Self {
            ledger: Mutex::new(Ledger::new(records)?),
        })
    }

    /// Copy of all records in insertion order.
    pub fn snapshot(&self) -> Vec<AccountRecord> {
        self.lock().records().to_vec()
    }

    fn lock(&self) -> MutexGuard<'_, Ledger> {
        self.ledger.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl AccountStore for MemoryAccountStore {
    async fn load_all(&self) -> Result<Vec<AccountRecord>, StoreError> {
        Ok(self.snapshot())
    }

    async fn get(&self, id: &AccountId) -> Result<AccountRecord, StoreError> {
        self.lock().get(id).cloned()
    }

    async fn next_eligible(&self) -> Result<Option<AccountRecord>, StoreError> {
        Ok(self.lock().next_eligible().cloned())
    }

    async fn eligible(&self, limit: Option<usize>) -> Result<Vec<AccountId>, StoreError> {
        Ok(self.lock().eligible(limit))
    }

    async fn transition(
        &self,
        id: &AccountId,
        from: AccountStatus,
        to: AccountStatus,
        patch: RecordPatch,
    ) -> Result<AccountRecord, StoreError> {
        self.lock().transition(id, from, to, patch)
    }

    async fn update(&self, id: &AccountId, patch: RecordPatch) -> Result<(), StoreError> {
        self.lock().update(id, patch)
    }

    async fn statistics(&self) -> Result<AccountStats, StoreError> {
        Ok(self.lock().statistics())
    }

    async fn reset_failed(&self) -> Result<usize, StoreError> {
        Ok(self.lock().reset_failed())
    }

    async fn recover_interrupted(&self) -> Result<Vec<AccountId>, StoreError> {
        Ok(self.lock().recover_interrupted())
    }
}
