//! Account store trait definition.

use super::error::StoreError;
use super::stats::AccountStats;
use crate::types::{AccountId, AccountRecord, AccountStatus, RecordPatch};
use std::future::Future;

/// Durable list of accounts and their registration status.
///
/// Status changes are compare-and-set: a store must apply
/// [`transition`](Self::transition) atomically with respect to every other
/// call, which is what makes `in_progress` a lease.
pub trait AccountStore: Send + Sync {
    /// All records in insertion order.
    fn load_all(&self) -> impl Future<Output = Result<Vec<AccountRecord>, StoreError>> + Send;

    fn get(
        &self,
        id: &AccountId,
    ) -> impl Future<Output = Result<AccountRecord, StoreError>> + Send;

    /// First pending record in insertion order.
    fn next_eligible(
        &self,
    ) -> impl Future<Output = Result<Option<AccountRecord>, StoreError>> + Send;

    /// Ids of up to `limit` pending records, in insertion order.
    fn eligible(
        &self,
        limit: Option<usize>,
    ) -> impl Future<Output = Result<Vec<AccountId>, StoreError>> + Send;

    /// Atomically move `id` from `from` to `to` and apply `patch`.
    fn transition(
        &self,
        id: &AccountId,
        from: AccountStatus,
        to: AccountStatus,
        patch: RecordPatch,
    ) -> impl Future<Output = Result<AccountRecord, StoreError>> + Send;

    /// Change fields of an `in_progress` record.
    fn update(
        &self,
        id: &AccountId,
        patch: RecordPatch,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    fn statistics(&self) -> impl Future<Output = Result<AccountStats, StoreError>> + Send;

    /// Move every `failed` record back to `pending`.
    fn reset_failed(&self) -> impl Future<Output = Result<usize, StoreError>> + Send;

    /// Reset records stuck `in_progress` to `pending` with reason `interrupted`.
    fn recover_interrupted(
        &self,
    ) -> impl Future<Output = Result<Vec<AccountId>, StoreError>> + Send;

    /// Take the lease on a pending record.
    fn claim(
        &self,
        id: &AccountId,
    ) -> impl Future<Output = Result<AccountRecord, StoreError>> + Send {
        self.transition(
            id,
            AccountStatus::Pending,
            AccountStatus::InProgress,
            RecordPatch::default(),
        )
    }
}
