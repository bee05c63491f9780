//! Retry configuration for provider calls.

use backon::{BackoffBuilder, ExponentialBuilder};
use std::time::Duration;

/// Configuration for exponential backoff.
///
/// Used both for renting a number while the provider reports no stock and
/// for transient provider errors.
///
/// ```rust
/// use signup_orchestrator::RetryConfig;
/// use std::time::Duration;
///
/// let config = RetryConfig::default()
///     .with_min_delay(Duration::from_millis(500))
///     .with_max_delay(Duration::from_secs(60))
///     .with_factor(1.5)
///     .with_max_retries(5);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Delay before the first retry (default: 1 second).
    pub min_delay: Duration,
    /// Cap on any single delay (default: 30 seconds).
    pub max_delay: Duration,
    /// Exponential backoff factor (default: 2.0).
    pub factor: f32,
    /// Maximum number of retries after the first attempt (default: 3).
    pub max_retries: usize,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            min_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            factor: 2.0,
            max_retries: 3,
        }
    }
}

impl RetryConfig {
    /// Set the delay before the first retry.
    pub fn with_min_delay(mut self, delay: Duration) -> Self {
        self.min_delay = delay;
        self
    }

    /// Set the cap on a single delay.
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Set the exponential backoff factor.
    pub fn with_factor(mut self, factor: f32) -> Self {
        self.factor = factor;
        self
    }

    /// Set the maximum number of retries.
    pub fn with_max_retries(mut self, max_retries: usize) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Total number of attempts, the first one included.
    pub fn max_attempts(&self) -> usize {
        self.max_retries + 1
    }

    /// Build a backoff strategy from this configuration.
    ///
    /// No jitter: delays grow by `factor` until they reach `max_delay`.
    pub fn build_strategy(&self) -> ExponentialBuilder {
        ExponentialBuilder::default()
            .with_min_delay(self.min_delay)
            .with_max_delay(self.max_delay)
            .with_factor(self.factor)
            .with_max_times(self.max_retries)
    }

    /// The sequence of delays the strategy will produce.
    pub fn delays(&self) -> Vec<Duration> {
        self.build_strategy().build().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delays_grow_until_cap() {
        let config = RetryConfig::default()
            .with_min_delay(Duration::from_secs(1))
            .with_max_delay(Duration::from_secs(5))
            .with_max_retries(5);

        let delays = config.delays();
        assert_eq!(delays.len(), 5);
        assert_eq!(delays[0], Duration::from_secs(1));
        assert_eq!(delays[1], Duration::from_secs(2));
        assert_eq!(delays[2], Duration::from_secs(4));
        assert!(delays.iter().all(|d| *d <= Duration::from_secs(5)));
        assert_eq!(delays[4], Duration::from_secs(5));
    }

    #[test]
    fn test_zero_retries_means_single_attempt() {
        let config = RetryConfig::default().with_max_retries(0);
        assert!(config.delays().is_empty());
        assert_eq!(config.max_attempts(), 1);
    }
}
