//! Batch runner configuration.

use crate::errors::ConfigError;
use std::time::Duration;

/// How a batch selects and paces accounts.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchConfig {
    /// Upper bound on accounts dispatched; none processes every pending one.
    pub max_accounts: Option<usize>,
    /// Orchestrator runs active at once.
    pub concurrency: usize,
    /// Pause between two dispatches on the same worker.
    pub delay_between_accounts: Duration,
    /// Abort before dispatch if the provider balance is lower.
    pub min_balance: Option<f64>,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_accounts: None,
            concurrency: 1,
            delay_between_accounts: Duration::from_secs(5),
            min_balance: None,
        }
    }
}

impl BatchConfig {
    pub fn with_max_accounts(mut self, max_accounts: usize) -> Self {
        self.max_accounts = Some(max_accounts);
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn with_delay_between_accounts(mut self, delay: Duration) -> Self {
        self.delay_between_accounts = delay;
        self
    }

    pub fn with_min_balance(mut self, min_balance: f64) -> Self {
        self.min_balance = Some(min_balance);
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.concurrency == 0 {
            return Err(ConfigError::Zero {
                field: "concurrency",
            });
        }
        if let Some(min) = self.min_balance
            && !(min.is_finite() && min >= 0.0)
        {
            return Err(ConfigError::Invalid {
                field: "min_balance",
                message: "must be a non-negative number".to_string(),
            });
        }
        Ok(())
    }
}
