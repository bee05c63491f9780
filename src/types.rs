//! Core types shared by the account store, SMS layer and orchestrator.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;
use thiserror::Error;

// =============================================================================
// AccountId
// =============================================================================

/// Stable identifier of an account record inside the store.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(String);

impl AccountId {
    /// Create a new AccountId from a string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for AccountId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for AccountId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for AccountId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

// =============================================================================
// ActivationId
// =============================================================================

/// Identifier of a phone rental issued by the SMS provider.
///
/// Returned by `rent` and used for every later `poll`, `finish` and
/// `cancel` call on the same number.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActivationId(String);

impl ActivationId {
    /// Create a new ActivationId from a string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl Display for ActivationId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for ActivationId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<String> for ActivationId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for ActivationId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

// =============================================================================
// SmsCode
// =============================================================================

/// Verification code received via SMS.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SmsCode(pub String);

impl SmsCode {
    /// Create a new SmsCode.
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    /// Get the code as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for SmsCode {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for SmsCode {
    fn from(code: &str) -> Self {
        Self(code.to_string())
    }
}

// =============================================================================
// FullNumber
// =============================================================================

/// Full phone number with country dial code, as returned by the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FullNumber(String);

impl FullNumber {
    /// Create a new FullNumber.
    pub fn new(number: impl Into<String>) -> Self {
        Self(number.into())
    }

    /// Get the number as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Number with a leading `+`, whatever form the provider returned.
    pub fn with_plus_prefix(&self) -> String {
        format!("+{}", self.0.trim_start_matches('+'))
    }
}

impl Display for FullNumber {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for FullNumber {
    fn from(number: &str) -> Self {
        Self(number.to_string())
    }
}

impl From<String> for FullNumber {
    fn from(number: String) -> Self {
        Self(number)
    }
}

// =============================================================================
// AccountStatus
// =============================================================================

/// Error when parsing an account status.
#[derive(Debug, Clone, Error)]
#[error("unknown account status '{0}'")]
pub struct StatusParseError(String);

/// Lifecycle status of an account record.
///
/// `InProgress` doubles as a lease: only the worker that moved a record
/// out of `Pending` may move it further.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountStatus {
    #[default]
    Pending,
    InProgress,
    Success,
    Failed,
}

impl AccountStatus {
    /// Returns true for `Success` and `Failed`.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Success | Self::Failed)
    }

    /// The transition table for account records.
    ///
    /// | from          | to                              |
    /// |---------------|---------------------------------|
    /// | `pending`     | `in_progress`                   |
    /// | `in_progress` | `success`, `failed`, `pending`  |
    /// | `failed`      | `pending`                       |
    ///
    /// `in_progress -> pending` exists only for crash recovery and
    /// `failed -> pending` only for an explicit reset.
    pub fn can_transition_to(self, next: AccountStatus) -> bool {
        use AccountStatus::*;
        matches!(
            (self, next),
            (Pending, InProgress)
                | (InProgress, Success)
                | (InProgress, Failed)
                | (InProgress, Pending)
                | (Failed, Pending)
        )
    }

    /// Wire name of the status.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Success => "success",
            Self::Failed => "failed",
        }
    }
}

impl Display for AccountStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccountStatus {
    type Err = StatusParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "pending" => Ok(Self::Pending),
            "in_progress" => Ok(Self::InProgress),
            "success" => Ok(Self::Success),
            "failed" => Ok(Self::Failed),
            other => Err(StatusParseError(other.to_string())),
        }
    }
}

// =============================================================================
// AccountRecord
// =============================================================================

/// `failure_reason` of records reset by crash recovery.
pub const INTERRUPTED_REASON: &str = "interrupted";

/// One account to register.
///
/// Everything the target site needs (names, birth date, address...) lives
/// in `profile` and is passed through to the form untouched. Unknown keys
/// of a JSON record land there as well, so a round trip through the store
/// keeps them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountRecord {
    pub id: AccountId,
    #[serde(default)]
    pub status: AccountStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verification_code: Option<String>,
    #[serde(default)]
    pub attempts: u32,
    #[serde(flatten)]
    pub profile: BTreeMap<String, Value>,
}

impl AccountRecord {
    /// Create a pending record with an empty profile.
    pub fn new(id: impl Into<AccountId>) -> Self {
        Self {
            id: id.into(),
            status: AccountStatus::Pending,
            failure_reason: None,
            phone: None,
            verification_code: None,
            attempts: 0,
            profile: BTreeMap::new(),
        }
    }

    /// Add a profile field.
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.profile.insert(key.into(), value.into());
        self
    }

    /// Profile value rendered as form input text.
    ///
    /// Strings are returned as-is, numbers and booleans in their JSON form.
    /// Missing keys, nulls, arrays and objects yield `None`.
    pub fn profile_text(&self, key: &str) -> Option<String> {
        match self.profile.get(key)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }
}

/// Field changes applied together with a status transition.
///
/// `None` leaves a field untouched, `Some(None)` clears it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordPatch {
    pub failure_reason: Option<Option<String>>,
    pub phone: Option<Option<String>>,
    pub verification_code: Option<Option<String>>,
}

impl RecordPatch {
    pub fn failure_reason(mut self, reason: impl Into<String>) -> Self {
        self.failure_reason = Some(Some(reason.into()));
        self
    }

    pub fn phone(mut self, phone: impl Into<String>) -> Self {
        self.phone = Some(Some(phone.into()));
        self
    }

    pub fn verification_code(mut self, code: impl Into<String>) -> Self {
        self.verification_code = Some(Some(code.into()));
        self
    }

    /// Clear the transient phone/code fields.
    pub fn clear_transient(mut self) -> Self {
        self.phone = Some(None);
        self.verification_code = Some(None);
        self
    }

    pub fn clear_failure_reason(mut self) -> Self {
        self.failure_reason = Some(None);
        self
    }

    pub(crate) fn apply(self, record: &mut AccountRecord) {
        if let Some(reason) = self.failure_reason {
            record.failure_reason = reason;
        }
        if let Some(phone) = self.phone {
            record.phone = phone;
        }
        if let Some(code) = self.verification_code {
            record.verification_code = code;
        }
    }
}
