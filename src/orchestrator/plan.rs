//! Per-site form mapping.
//!
//! A [`FormPlan`] tells the orchestrator which elements to touch at each
//! stage of the signup flow and which conditions mark a stage as done. It is
//! plain data, usually deserialized from a file supplied per target site.

use super::error::{FailureKind, StepError};
use crate::driver::{Action, Condition, Locator};
use crate::errors::ConfigError;
use crate::types::{AccountRecord, FullNumber, SmsCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Where the value typed into a field comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldValue {
    /// A fixed string.
    Literal(String),
    /// A profile field of the account record.
    Profile(String),
    /// The rented number as the provider returned it.
    Phone,
    /// The rented number with a leading `+`.
    PhoneInternational,
    /// The verification code.
    Code,
}

/// What to do with a located element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "do", rename_all = "snake_case")]
pub enum Input {
    Click,
    Type { value: FieldValue },
    Select { value: FieldValue },
    Check { checked: bool },
}

/// One UI action of a stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldStep {
    pub locator: Locator,
    #[serde(flatten)]
    pub input: Input,
}

impl FieldStep {
    pub fn click(locator: Locator) -> Self {
        Self {
            locator,
            input: Input::Click,
        }
    }

    pub fn type_in(locator: Locator, value: FieldValue) -> Self {
        Self {
            locator,
            input: Input::Type { value },
        }
    }

    pub fn select(locator: Locator, value: FieldValue) -> Self {
        Self {
            locator,
            input: Input::Select { value },
        }
    }

    pub fn check(locator: Locator, checked: bool) -> Self {
        Self {
            locator,
            input: Input::Check { checked },
        }
    }

    fn uses(&self, wanted: &FieldValue) -> bool {
        match &self.input {
            Input::Type { value } | Input::Select { value } => value == wanted,
            Input::Click | Input::Check { .. } => false,
        }
    }

    /// Turn the step into a driver action with concrete values.
    pub(crate) fn resolve(&self, inputs: &Inputs<'_>) -> Result<Action, StepError> {
        Ok(match &self.input {
            Input::Click => Action::Click,
            Input::Type { value } => Action::Type(inputs.value(value)?),
            Input::Select { value } => Action::Select(inputs.value(value)?),
            Input::Check { checked } => Action::SetChecked(*checked),
        })
    }
}

/// A plain form page: wait until ready, fill, wait until done.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormStage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ready: Option<Condition>,
    #[serde(default)]
    pub steps: Vec<FieldStep>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub done: Option<Condition>,
    /// Overrides the orchestrator's step timeout for this stage.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

/// A page where the site accepts or rejects what was submitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationStage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ready: Option<Condition>,
    #[serde(default)]
    pub steps: Vec<FieldStep>,
    pub accepted: Condition,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rejected: Option<Condition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

/// The full signup flow of one target site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormPlan {
    pub signup_url: String,
    #[serde(default)]
    pub start: FormStage,
    pub phone: VerificationStage,
    pub code: VerificationStage,
    #[serde(default)]
    pub profile_details: FormStage,
    #[serde(default)]
    pub identity: FormStage,
    /// Condition that proves the account exists.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completion: Option<Condition>,
}

impl FormPlan {
    /// Check that the plan can drive a registration at all.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.signup_url.trim().is_empty() {
            return Err(ConfigError::Empty {
                field: "signup_url",
            });
        }
        let enters_phone = self.phone.steps.iter().any(|step| {
            step.uses(&FieldValue::Phone) || step.uses(&FieldValue::PhoneInternational)
        });
        if !enters_phone {
            return Err(ConfigError::Invalid {
                field: "phone",
                message: "no step enters the phone number".into(),
            });
        }
        if !self.code.steps.iter().any(|step| step.uses(&FieldValue::Code)) {
            return Err(ConfigError::Invalid {
                field: "code",
                message: "no step enters the verification code".into(),
            });
        }
        Ok(())
    }
}

pub(crate) fn stage_timeout(timeout_ms: Option<u64>, default: Duration) -> Duration {
    timeout_ms.map(Duration::from_millis).unwrap_or(default)
}

/// Values available to field steps at a given point of the run.
pub(crate) struct Inputs<'a> {
    pub(crate) record: &'a AccountRecord,
    pub(crate) phone: Option<&'a FullNumber>,
    pub(crate) code: Option<&'a SmsCode>,
}

impl<'a> Inputs<'a> {
    pub(crate) fn profile(record: &'a AccountRecord) -> Self {
        Self {
            record,
            phone: None,
            code: None,
        }
    }

    fn value(&self, value: &FieldValue) -> Result<String, StepError> {
        let missing = |what: &str| {
            StepError::failed(
                FailureKind::FormInteractionFailure,
                format!("{what} is not available at this step"),
            )
        };
        match value {
            FieldValue::Literal(text) => Ok(text.clone()),
            FieldValue::Profile(key) => self
                .record
                .profile_text(key)
                .ok_or_else(|| missing(&format!("profile field '{key}'"))),
            FieldValue::Phone => self
                .phone
                .map(|n| n.as_str().to_owned())
                .ok_or_else(|| missing("phone number")),
            FieldValue::PhoneInternational => self
                .phone
                .map(FullNumber::with_plus_prefix)
                .ok_or_else(|| missing("phone number")),
            FieldValue::Code => self
                .code
                .map(|c| c.as_str().to_owned())
                .ok_or_else(|| missing("verification code")),
        }
    }
}
