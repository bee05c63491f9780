//! Orchestrator configuration.

use crate::errors::ConfigError;
use crate::sms::SmsConfig;
use std::path::PathBuf;
use std::time::Duration;

/// Configuration of one registration run.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Phone verification settings.
    pub sms: SmsConfig,
    /// Bounded wait applied to each UI stage unless the plan overrides it.
    pub step_timeout: Duration,
    /// How often UI conditions are probed during a bounded wait.
    pub ui_poll_interval: Duration,
    /// Where failure screenshots go; none disables them.
    pub screenshot_dir: Option<PathBuf>,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self::balanced()
    }
}

impl OrchestratorConfig {
    pub fn builder() -> OrchestratorConfigBuilder {
        OrchestratorConfigBuilder::default()
    }

    /// Short waits, for fast sandboxes.
    pub fn fast() -> Self {
        Self {
            sms: SmsConfig::fast(),
            step_timeout: Duration::from_secs(10),
            ui_poll_interval: Duration::from_millis(250),
            screenshot_dir: None,
        }
    }

    pub fn balanced() -> Self {
        Self {
            sms: SmsConfig::balanced(),
            step_timeout: Duration::from_secs(20),
            ui_poll_interval: Duration::from_millis(500),
            screenshot_dir: None,
        }
    }

    /// Long waits, for slow sites and providers.
    pub fn patient() -> Self {
        Self {
            sms: SmsConfig::patient(),
            step_timeout: Duration::from_secs(60),
            ui_poll_interval: Duration::from_secs(1),
            screenshot_dir: None,
        }
    }

    pub fn with_sms(mut self, sms: SmsConfig) -> Self {
        self.sms = sms;
        self
    }

    pub fn with_step_timeout(mut self, timeout: Duration) -> Self {
        self.step_timeout = timeout;
        self
    }

    pub fn with_ui_poll_interval(mut self, interval: Duration) -> Self {
        self.ui_poll_interval = interval;
        self
    }

    pub fn with_screenshot_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.screenshot_dir = Some(dir.into());
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.sms.validate()?;
        if self.step_timeout.is_zero() {
            return Err(ConfigError::Zero {
                field: "step_timeout",
            });
        }
        if self.ui_poll_interval.is_zero() {
            return Err(ConfigError::Zero {
                field: "ui_poll_interval",
            });
        }
        if self.ui_poll_interval > self.step_timeout {
            return Err(ConfigError::Invalid {
                field: "ui_poll_interval",
                message: "must not exceed step_timeout".to_string(),
            });
        }
        Ok(())
    }
}

/// Builder for OrchestratorConfig.
#[derive(Debug, Clone, Default)]
pub struct OrchestratorConfigBuilder {
    config: OrchestratorConfig,
}

impl OrchestratorConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing configuration, e.g. a preset.
    pub fn from_config(config: OrchestratorConfig) -> Self {
        Self { config }
    }

    pub fn sms(mut self, sms: SmsConfig) -> Self {
        self.config.sms = sms;
        self
    }

    /// Default: 20 seconds
    pub fn step_timeout(mut self, timeout: Duration) -> Self {
        self.config.step_timeout = timeout;
        self
    }

    /// Default: 500 milliseconds
    pub fn ui_poll_interval(mut self, interval: Duration) -> Self {
        self.config.ui_poll_interval = interval;
        self
    }

    pub fn screenshot_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.screenshot_dir = Some(dir.into());
        self
    }

    /// Build without validation.
    pub fn build(self) -> OrchestratorConfig {
        self.config
    }

    /// Build and validate.
    pub fn try_build(self) -> Result<OrchestratorConfig, ConfigError> {
        self.config.validate()?;
        Ok(self.config)
    }
}
