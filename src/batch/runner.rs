//! Batch runner: crash recovery, pre-flight and the worker pool.

use super::config::BatchConfig;
use crate::account::AccountStore;
use crate::errors::{ConfigError, RetryableError};
use crate::orchestrator::{FailureKind, FatalError, Orchestrator, Outcome};
use crate::provisioner::ProfileProvisioner;
use crate::providers::SmsProvider;
use crate::types::{AccountId, AccountStatus, INTERRUPTED_REASON, RecordPatch};
use serde::Serialize;
use std::collections::VecDeque;
use std::fmt::{self, Display, Formatter};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

#[cfg(feature = "tracing")]
use tracing::{error, info, warn};

/// Counts reported by one batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchStats {
    /// Accounts registered in this batch.
    pub success: usize,
    /// Accounts that failed in this batch.
    pub failed: usize,
    /// Accounts already terminal at batch start, plus claims lost to
    /// another worker.
    pub skipped: usize,
    /// `in_progress` leftovers reset to `pending` before dispatch.
    pub recovered: usize,
}

impl BatchStats {
    /// Accounts that reached a terminal status in this batch.
    pub fn processed(&self) -> usize {
        self.success + self.failed
    }

    fn merge(&mut self, other: BatchStats) {
        self.success += other.success;
        self.failed += other.failed;
        self.skipped += other.skipped;
        self.recovered += other.recovered;
    }
}

impl Display for BatchStats {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "success={} failed={} skipped={} recovered={}",
            self.success, self.failed, self.skipped, self.recovered
        )
    }
}

type Queue = Arc<Mutex<VecDeque<AccountId>>>;

/// Runs the orchestrator over every eligible account of a store.
///
/// Each batch starts with a recovery pass that resets records left
/// `in_progress` by a crashed run, then checks the provider balance, then
/// dispatches pending records in store order to a bounded pool of workers.
pub struct BatchRunner<S, P, V>
where
    S: AccountStore,
    P: SmsProvider,
    V: ProfileProvisioner,
{
    orchestrator: Arc<Orchestrator<S, P, V>>,
    config: BatchConfig,
    cancel: CancellationToken,
}

impl<S, P, V> BatchRunner<S, P, V>
where
    S: AccountStore + 'static,
    P: SmsProvider + 'static,
    V: ProfileProvisioner + 'static,
{
    pub fn new(orchestrator: Orchestrator<S, P, V>, config: BatchConfig) -> Self {
        Self::from_shared(Arc::new(orchestrator), config)
    }

    pub fn from_shared(orchestrator: Arc<Orchestrator<S, P, V>>, config: BatchConfig) -> Self {
        Self {
            orchestrator,
            config,
            cancel: CancellationToken::new(),
        }
    }

    /// Use an external token for batch shutdown.
    ///
    /// Cancelling it stops dispatch; runs already in flight stop at their
    /// next step and are recorded as `failed` with marker `cancelled`, to be
    /// re-queued with `reset_failed`. Runs stopped because another worker
    /// hit a fatal error are put back to `pending` instead.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn orchestrator(&self) -> &Arc<Orchestrator<S, P, V>> {
        &self.orchestrator
    }

    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    /// Run a batch with the configured limits.
    pub async fn run(&self) -> Result<BatchStats, FatalError> {
        self.config.validate()?;
        self.run_batch(
            self.config.max_accounts,
            self.config.concurrency,
            self.config.delay_between_accounts,
        )
        .await
    }

    /// Process up to `max_accounts` pending accounts with at most
    /// `concurrency` runs active at once.
    ///
    /// Account-local failures are counted and never stop the batch. A fatal
    /// error stops dispatch and is returned once every worker has wound
    /// down.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "batch.run", skip_all, fields(concurrency = concurrency, max_accounts = ?max_accounts))
    )]
    pub async fn run_batch(
        &self,
        max_accounts: Option<usize>,
        concurrency: usize,
        delay_between_accounts: Duration,
    ) -> Result<BatchStats, FatalError> {
        if concurrency == 0 {
            return Err(ConfigError::Zero {
                field: "concurrency",
            }
            .into());
        }
        let store = self.orchestrator.store();

        let recovered = store.recover_interrupted().await?;
        for _id in &recovered {
            #[cfg(feature = "tracing")]
            warn!(account_id = %_id, "Recovered interrupted account");
        }

        self.preflight().await?;

        let skipped = store
            .load_all()
            .await?
            .iter()
            .filter(|record| record.status.is_terminal())
            .count();
        let selected = store.eligible(max_accounts).await?;

        #[cfg(feature = "tracing")]
        info!(
            selected = selected.len(),
            recovered = recovered.len(),
            skipped,
            "Starting batch"
        );

        let mut stats = BatchStats {
            skipped,
            recovered: recovered.len(),
            ..BatchStats::default()
        };
        if selected.is_empty() {
            return Ok(stats);
        }

        let workers = concurrency.min(selected.len());
        let queue: Queue = Arc::new(Mutex::new(selected.into()));
        let cancel = self.cancel.child_token();

        let mut pool = JoinSet::new();
        for _ in 0..workers {
            pool.spawn(work(
                Arc::clone(&self.orchestrator),
                Arc::clone(&queue),
                delay_between_accounts,
                self.cancel.clone(),
                cancel.clone(),
            ));
        }

        let mut fatal = None;
        while let Some(joined) = pool.join_next().await {
            match joined {
                Ok(Ok(tally)) => stats.merge(tally),
                Ok(Err(e)) => {
                    cancel.cancel();
                    fatal.get_or_insert(e);
                }
                Err(e) => {
                    cancel.cancel();
                    fatal.get_or_insert(FatalError::Worker(e.to_string()));
                }
            }
        }

        if let Some(e) = fatal {
            #[cfg(feature = "tracing")]
            error!(error = %e, stats = %stats, "Batch stopped by fatal error");
            return Err(e);
        }

        #[cfg(feature = "tracing")]
        info!(
            success = stats.success,
            failed = stats.failed,
            skipped = stats.skipped,
            recovered = stats.recovered,
            "Batch finished"
        );
        Ok(stats)
    }

    async fn preflight(&self) -> Result<(), FatalError> {
        match self.orchestrator.verifier().balance().await {
            Ok(balance) => {
                #[cfg(feature = "tracing")]
                info!(balance, "Provider balance");
                if let Some(required) = self.config.min_balance
                    && balance < required
                {
                    return Err(FatalError::InsufficientBalance { balance, required });
                }
                Ok(())
            }
            Err(e) if e.is_fatal() => Err(FatalError::Provider(e)),
            Err(_e) => {
                #[cfg(feature = "tracing")]
                warn!(error = %_e, "Balance check failed, continuing");
                Ok(())
            }
        }
    }
}

/// One worker: take the next id, run it, pause, repeat.
///
/// `cancel` is the batch token. A run it stopped while `caller` is still
/// live was cut short by another worker's fatal error, so its record goes
/// back to `pending` with reason `interrupted`.
async fn work<S, P, V>(
    orchestrator: Arc<Orchestrator<S, P, V>>,
    queue: Queue,
    delay: Duration,
    caller: CancellationToken,
    cancel: CancellationToken,
) -> Result<BatchStats, FatalError>
where
    S: AccountStore,
    P: SmsProvider,
    V: ProfileProvisioner,
{
    let mut tally = BatchStats::default();
    let mut first = true;

    loop {
        if cancel.is_cancelled() {
            break;
        }
        let next = queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front();
        let Some(id) = next else {
            break;
        };

        if !first {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(delay) => {}
            }
        }
        first = false;

        match orchestrator.run(&id, &cancel).await {
            Ok(Outcome::Success) => tally.success += 1,
            Ok(Outcome::Failed(failure))
                if failure.kind == FailureKind::Cancelled && !caller.is_cancelled() =>
            {
                orchestrator
                    .store()
                    .transition(
                        &id,
                        AccountStatus::Failed,
                        AccountStatus::Pending,
                        RecordPatch::default()
                            .failure_reason(INTERRUPTED_REASON)
                            .clear_transient(),
                    )
                    .await?;

                #[cfg(feature = "tracing")]
                warn!(account_id = %id, "Run stopped by a fatal error elsewhere, requeued");
            }
            Ok(Outcome::Failed(_)) => tally.failed += 1,
            Ok(Outcome::Skipped(_)) => tally.skipped += 1,
            Err(e) => {
                cancel.cancel();
                return Err(e);
            }
        }
    }
    Ok(tally)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_merge_and_display() {
        let mut stats = BatchStats {
            skipped: 2,
            recovered: 1,
            ..BatchStats::default()
        };
        stats.merge(BatchStats {
            success: 3,
            failed: 1,
            skipped: 1,
            recovered: 0,
        });
        assert_eq!(stats.processed(), 4);
        assert_eq!(stats.to_string(), "success=3 failed=1 skipped=3 recovered=1");
    }
}
