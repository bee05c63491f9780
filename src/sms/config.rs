//! Phone verification configuration.

use crate::errors::ConfigError;
use crate::utils::retry::RetryConfig;
use keshvar::{Alpha2, Country};
use secrecy::{ExposeSecret, SecretString};
use std::time::Duration;

/// Configuration for the phone verification sub-protocol.
///
/// Controls which numbers are rented, how long to wait for a code and how
/// often to retry when numbers are out of stock or rejected.
#[derive(Clone)]
pub struct SmsConfig {
    /// Provider API key, handed to the concrete provider client.
    pub api_key: SecretString,
    /// Provider service code of the target site.
    pub service: String,
    /// Country of the rented numbers.
    pub country: Country,
    /// Maximum time to wait for one code before the rental is cancelled.
    pub code_timeout: Duration,
    /// Interval between polls while waiting for a code.
    pub poll_interval: Duration,
    /// Backoff used while the provider reports no numbers in stock.
    pub rent_retry: RetryConfig,
    /// Numbers tried per account when the form rejects a number.
    pub max_phone_attempts: usize,
    /// Codes tried per number when the form rejects a code.
    pub max_code_attempts: usize,
}

impl std::fmt::Debug for SmsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmsConfig")
            .field("api_key", &"[REDACTED]")
            .field("service", &self.service)
            .field("country", &self.country.iso_short_name())
            .field("code_timeout", &self.code_timeout)
            .field("poll_interval", &self.poll_interval)
            .field("rent_retry", &self.rent_retry)
            .field("max_phone_attempts", &self.max_phone_attempts)
            .field("max_code_attempts", &self.max_code_attempts)
            .finish()
    }
}

impl Default for SmsConfig {
    fn default() -> Self {
        Self::balanced()
    }
}

impl SmsConfig {
    /// Create a new builder for SmsConfig.
    ///
    /// # Example
    ///
    /// ```rust
    /// use signup_orchestrator::SmsConfig;
    /// use std::time::Duration;
    ///
    /// let config = SmsConfig::builder()
    ///     .api_key("key")
    ///     .service("svc")
    ///     .code_timeout(Duration::from_secs(180))
    ///     .poll_interval(Duration::from_secs(5))
    ///     .try_build()
    ///     .unwrap();
    ///
    /// assert_eq!(config.code_timeout, Duration::from_secs(180));
    /// ```
    pub fn builder() -> SmsConfigBuilder {
        SmsConfigBuilder::default()
    }

    /// Short waits, for development against a sandbox provider.
    pub fn fast() -> Self {
        Self {
            code_timeout: Duration::from_secs(60),
            poll_interval: Duration::from_secs(2),
            ..Self::balanced()
        }
    }

    /// Defaults suitable for most providers.
    pub fn balanced() -> Self {
        Self {
            api_key: SecretString::from(String::new()),
            service: String::new(),
            country: Alpha2::US.to_country(),
            code_timeout: Duration::from_secs(120),
            poll_interval: Duration::from_secs(3),
            rent_retry: RetryConfig::default(),
            max_phone_attempts: 2,
            max_code_attempts: 2,
        }
    }

    /// Long waits, for slow providers.
    pub fn patient() -> Self {
        Self {
            code_timeout: Duration::from_secs(300),
            poll_interval: Duration::from_secs(5),
            rent_retry: RetryConfig::default()
                .with_min_delay(Duration::from_secs(5))
                .with_max_delay(Duration::from_secs(60))
                .with_max_retries(5),
            ..Self::balanced()
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = SecretString::from(api_key.into());
        self
    }

    pub fn with_service(mut self, service: impl Into<String>) -> Self {
        self.service = service.into();
        self
    }

    pub fn with_country(mut self, country: Country) -> Self {
        self.country = country;
        self
    }

    pub fn with_code_timeout(mut self, timeout: Duration) -> Self {
        self.code_timeout = timeout;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_rent_retry(mut self, retry: RetryConfig) -> Self {
        self.rent_retry = retry;
        self
    }

    /// Maximum number of polls one code wait can make.
    pub fn max_polls(&self) -> u32 {
        let interval = self.poll_interval.as_millis().max(1);
        let polls = self.code_timeout.as_millis().div_ceil(interval).max(1);
        u32::try_from(polls).unwrap_or(u32::MAX)
    }

    /// Check that the configuration is usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api_key.expose_secret().trim().is_empty() {
            return Err(ConfigError::Empty { field: "api_key" });
        }
        if self.service.trim().is_empty() {
            return Err(ConfigError::Empty { field: "service" });
        }
        if self.code_timeout.is_zero() {
            return Err(ConfigError::Zero {
                field: "code_timeout",
            });
        }
        if self.poll_interval.is_zero() {
            return Err(ConfigError::Zero {
                field: "poll_interval",
            });
        }
        if self.poll_interval > self.code_timeout {
            return Err(ConfigError::Invalid {
                field: "poll_interval",
                message: "must not exceed code_timeout".to_string(),
            });
        }
        if self.rent_retry.min_delay > self.rent_retry.max_delay {
            return Err(ConfigError::Invalid {
                field: "rent_retry",
                message: "min_delay must not exceed max_delay".to_string(),
            });
        }
        if self.max_phone_attempts == 0 {
            return Err(ConfigError::Zero {
                field: "max_phone_attempts",
            });
        }
        if self.max_code_attempts == 0 {
            return Err(ConfigError::Zero {
                field: "max_code_attempts",
            });
        }
        Ok(())
    }
}

/// Builder for SmsConfig.
#[derive(Debug, Clone, Default)]
pub struct SmsConfigBuilder {
    config: SmsConfig,
}

impl SmsConfigBuilder {
    /// Create a new builder with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing configuration, e.g. a preset.
    pub fn from_config(config: SmsConfig) -> Self {
        Self { config }
    }

    pub fn api_key(mut self, api_key: impl Into<String>) -> Self {
        self.config = self.config.with_api_key(api_key);
        self
    }

    pub fn service(mut self, service: impl Into<String>) -> Self {
        self.config.service = service.into();
        self
    }

    pub fn country(mut self, country: Country) -> Self {
        self.config.country = country;
        self
    }

    /// Default: 120 seconds
    pub fn code_timeout(mut self, timeout: Duration) -> Self {
        self.config.code_timeout = timeout;
        self
    }

    /// Default: 3 seconds
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.config.poll_interval = interval;
        self
    }

    pub fn rent_retry(mut self, retry: RetryConfig) -> Self {
        self.config.rent_retry = retry;
        self
    }

    /// Default: 2 (one retry with a fresh number)
    pub fn max_phone_attempts(mut self, attempts: usize) -> Self {
        self.config.max_phone_attempts = attempts;
        self
    }

    /// Default: 2 (one re-poll after a rejected code)
    pub fn max_code_attempts(mut self, attempts: usize) -> Self {
        self.config.max_code_attempts = attempts;
        self
    }

    /// Build without validation.
    pub fn build(self) -> SmsConfig {
        self.config
    }

    /// Build and validate.
    pub fn try_build(self) -> Result<SmsConfig, ConfigError> {
        self.config.validate()?;
        Ok(self.config)
    }
}
