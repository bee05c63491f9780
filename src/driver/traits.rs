//! Browser/UI driver trait definition.

use super::error::DriverError;
use super::locator::{Action, Condition, Locator};
use crate::provisioner::SessionHandle;
use std::future::Future;
use std::path::Path;
use std::time::Duration;
use tokio::time::Instant;

/// Outcome of waiting for one of two conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Accepted,
    Rejected,
}

/// A browser (or emulator UI) bound to one provisioned profile.
///
/// Implementations own element lookup and the action vocabulary. Every
/// call either succeeds or reports a [`DriverError`]; the orchestrator never
/// inspects anything else.
pub trait BrowserDriver: Send + Sync {
    /// The profile/proxy identity this driver runs under.
    fn handle(&self) -> &SessionHandle;

    /// Load `url` in the current tab.
    fn navigate(&self, url: &str) -> impl Future<Output = Result<(), DriverError>> + Send;

    /// Locate an element and perform `action` on it.
    fn find_and_act(
        &self,
        locator: &Locator,
        action: &Action,
    ) -> impl Future<Output = Result<(), DriverError>> + Send;

    /// Check a condition once, without waiting.
    fn probe(&self, condition: &Condition)
    -> impl Future<Output = Result<bool, DriverError>> + Send;

    /// Save a screenshot of the current page.
    fn screenshot(&self, path: &Path) -> impl Future<Output = Result<(), DriverError>> + Send;

    /// Bounded wait: probe `condition` every `interval` until it holds or
    /// `timeout` elapses.
    ///
    /// Drivers with native waiting may override this.
    fn wait_until(
        &self,
        condition: &Condition,
        timeout: Duration,
        interval: Duration,
    ) -> impl Future<Output = Result<(), DriverError>> + Send {
        async move {
            let start = Instant::now();
            loop {
                if self.probe(condition).await? {
                    return Ok(());
                }
                if start.elapsed() >= timeout {
                    return Err(DriverError::Timeout {
                        condition: condition.to_string(),
                        timeout,
                    });
                }
                tokio::time::sleep(interval.min(timeout.saturating_sub(start.elapsed()))).await;
            }
        }
    }

    /// Bounded wait for whichever of `accepted` / `rejected` holds first.
    ///
    /// `accepted` is checked first on every tick. Without a `rejected`
    /// condition this is [`wait_until`](Self::wait_until) on `accepted`.
    fn wait_for_verdict(
        &self,
        accepted: &Condition,
        rejected: Option<&Condition>,
        timeout: Duration,
        interval: Duration,
    ) -> impl Future<Output = Result<Verdict, DriverError>> + Send {
        async move {
            let start = Instant::now();
            loop {
                if self.probe(accepted).await? {
                    return Ok(Verdict::Accepted);
                }
                if let Some(rejected) = rejected
                    && self.probe(rejected).await?
                {
                    return Ok(Verdict::Rejected);
                }
                if start.elapsed() >= timeout {
                    return Err(DriverError::Timeout {
                        condition: accepted.to_string(),
                        timeout,
                    });
                }
                tokio::time::sleep(interval.min(timeout.saturating_sub(start.elapsed()))).await;
            }
        }
    }
}
