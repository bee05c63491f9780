//! Registration state machine.

use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};

#[cfg(feature = "tracing")]
use tracing::debug;

/// Progress of one account through the signup flow.
///
/// ```text
/// INIT -> PROFILE_READY -> FORM_STARTED -> PHONE_SUBMITTED -> CODE_VERIFIED
///      -> PROFILE_DETAILS_SUBMITTED -> IDENTITY_SUBMITTED -> DONE
/// ```
///
/// `FAILED` is reachable from every non-terminal state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RegistrationState {
    #[default]
    Init,
    ProfileReady,
    FormStarted,
    PhoneSubmitted,
    CodeVerified,
    ProfileDetailsSubmitted,
    IdentitySubmitted,
    Done,
    Failed,
}

impl RegistrationState {
    /// The state that follows on success, if any.
    pub fn next(self) -> Option<Self> {
        use RegistrationState::*;
        match self {
            Init => Some(ProfileReady),
            ProfileReady => Some(FormStarted),
            FormStarted => Some(PhoneSubmitted),
            PhoneSubmitted => Some(CodeVerified),
            CodeVerified => Some(ProfileDetailsSubmitted),
            ProfileDetailsSubmitted => Some(IdentitySubmitted),
            IdentitySubmitted => Some(Done),
            Done | Failed => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, RegistrationState::Done | RegistrationState::Failed)
    }

    pub fn can_transition_to(self, to: Self) -> bool {
        if to == RegistrationState::Failed {
            return !self.is_terminal();
        }
        self.next() == Some(to)
    }

    /// Move to `to`. Steps only ever ask for the next state, so an illegal
    /// move is a bug in the step sequence.
    pub(crate) fn advance(&mut self, to: Self) {
        debug_assert!(
            self.can_transition_to(to),
            "illegal registration transition {self} -> {to}"
        );
        #[cfg(feature = "tracing")]
        debug!(from = %self, to = %to, "Registration state advanced");
        *self = to;
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RegistrationState::Init => "INIT",
            RegistrationState::ProfileReady => "PROFILE_READY",
            RegistrationState::FormStarted => "FORM_STARTED",
            RegistrationState::PhoneSubmitted => "PHONE_SUBMITTED",
            RegistrationState::CodeVerified => "CODE_VERIFIED",
            RegistrationState::ProfileDetailsSubmitted => "PROFILE_DETAILS_SUBMITTED",
            RegistrationState::IdentitySubmitted => "IDENTITY_SUBMITTED",
            RegistrationState::Done => "DONE",
            RegistrationState::Failed => "FAILED",
        }
    }
}

impl Display for RegistrationState {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
