//! Account store backed by a JSON file.

use super::error::StoreError;
use super::ledger::Ledger;
use super::stats::AccountStats;
use super::traits::AccountStore;
use crate::types::{AccountId, AccountRecord, AccountStatus, RecordPatch};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

#[cfg(feature = "tracing")]
use tracing::debug;

/// Account store that rewrites a JSON array file after every change.
///
/// The file is written to a sibling temporary file first and renamed over
/// the original, so a crash leaves either the old or the new contents.
/// Records stay in file order; unknown record fields survive a rewrite.
#[derive(Debug)]
pub struct JsonAccountStore {
    path: PathBuf,
    ledger: Mutex<Ledger>,
}

impl JsonAccountStore {
    /// Load an existing account file.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let bytes = tokio::fs::read(&path).await?;
        let records: Vec<AccountRecord> = serde_json::from_slice(&bytes)?;

        #[cfg(feature = "tracing")]
        debug!(path = %path.display(), records = records.len(), "Loaded account file");

        Ok(Self {
            path,
            ledger: Mutex::new(Ledger::new(records)?),
        })
    }

    /// Create (or overwrite) an account file with the given records.
    pub async fn create(
        path: impl Into<PathBuf>,
        records: Vec<AccountRecord>,
    ) -> Result<Self, StoreError> {
        let path = path.into();
        let ledger = Ledger::new(records)?;
        write_atomic(&path, ledger.records()).await?;
        Ok(Self {
            path,
            ledger: Mutex::new(ledger),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Apply `f` to the ledger and persist the result while the lock is held.
    ///
    /// If writing fails the in-memory change is rolled back.
    async fn mutate<T>(
        &self,
        f: impl FnOnce(&mut Ledger) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let mut ledger = self.ledger.lock().await;
        let before = ledger.clone();
        let value = f(&mut ledger)?;
        if let Err(e) = write_atomic(&self.path, ledger.records()).await {
            *ledger = before;
            return Err(e);
        }
        Ok(value)
    }
}

async fn write_atomic(path: &Path, records: &[AccountRecord]) -> Result<(), StoreError> {
    let body = serde_json::to_vec_pretty(records)?;
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    tokio::fs::write(&tmp, body).await?;
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}

impl AccountStore for JsonAccountStore {
    async fn load_all(&self) -> Result<Vec<AccountRecord>, StoreError> {
        Ok(self.ledger.lock().await.records().to_vec())
    }

    async fn get(&self, id: &AccountId) -> Result<AccountRecord, StoreError> {
        self.ledger.lock().await.get(id).cloned()
    }

    async fn next_eligible(&self) -> Result<Option<AccountRecord>, StoreError> {
        Ok(self.ledger.lock().await.next_eligible().cloned())
    }

    async fn eligible(&self, limit: Option<usize>) -> Result<Vec<AccountId>, StoreError> {
        Ok(self.ledger.lock().await.eligible(limit))
    }

    async fn transition(
        &self,
        id: &AccountId,
        from: AccountStatus,
        to: AccountStatus,
        patch: RecordPatch,
    ) -> Result<AccountRecord, StoreError> {
        self.mutate(|ledger| ledger.transition(id, from, to, patch))
            .await
    }

    async fn update(&self, id: &AccountId, patch: RecordPatch) -> Result<(), StoreError> {
        self.mutate(|ledger| ledger.update(id, patch)).await
    }

    async fn statistics(&self) -> Result<AccountStats, StoreError> {
        Ok(self.ledger.lock().await.statistics())
    }

    async fn reset_failed(&self) -> Result<usize, StoreError> {
        self.mutate(|ledger| Ok(ledger.reset_failed())).await
    }

    async fn recover_interrupted(&self) -> Result<Vec<AccountId>, StoreError> {
        self.mutate(|ledger| Ok(ledger.recover_interrupted())).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_changes_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("accounts.json");

        let store = JsonAccountStore::create(
            &path,
            vec![
                AccountRecord::new("a").with_field("email", json!("a@example.com")),
                AccountRecord::new("b"),
            ],
        )
        .await
        .unwrap();

        let id = AccountId::from("a");
        store.claim(&id).await.unwrap();
        store
            .update(&id, RecordPatch::default().phone("+15550001"))
            .await
            .unwrap();
        drop(store);

        let reopened = JsonAccountStore::open(&path).await.unwrap();
        let record = reopened.get(&id).await.unwrap();
        assert_eq!(record.status, AccountStatus::InProgress);
        assert_eq!(record.phone.as_deref(), Some("+15550001"));
        assert_eq!(record.profile_text("email").as_deref(), Some("a@example.com"));

        let recovered = reopened.recover_interrupted().await.unwrap();
        assert_eq!(recovered, vec![id.clone()]);

        let again = JsonAccountStore::open(&path).await.unwrap();
        let record = again.get(&id).await.unwrap();
        assert_eq!(record.status, AccountStatus::Pending);
        assert_eq!(record.failure_reason.as_deref(), Some("interrupted"));
        assert!(record.phone.is_none());
    }

    #[tokio::test]
    async fn test_open_keeps_file_order_and_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("accounts.json");
        tokio::fs::write(
            &path,
            r#"[{"id":"z"},{"id":"y","status":"success"},{"id":"x","status":"pending"}]"#,
        )
        .await
        .unwrap();

        let store = JsonAccountStore::open(&path).await.unwrap();
        let ids: Vec<String> = store
            .eligible(None)
            .await
            .unwrap()
            .into_iter()
            .map(|id| id.to_string())
            .collect();
        assert_eq!(ids, vec!["z", "x"]);
    }

    #[tokio::test]
    async fn test_rejected_transition_is_not_written() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("accounts.json");
        let store = JsonAccountStore::create(&path, vec![AccountRecord::new("a")])
            .await
            .unwrap();

        let err = store
            .transition(
                &AccountId::from("a"),
                AccountStatus::InProgress,
                AccountStatus::Success,
                RecordPatch::default(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::StatusConflict { .. }));

        let reopened = JsonAccountStore::open(&path).await.unwrap();
        let stats = reopened.statistics().await.unwrap();
        assert_eq!(stats.pending, 1);
    }

    #[tokio::test]
    async fn test_open_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = JsonAccountStore::open(dir.path().join("nope.json"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Io(_)));
    }
}
