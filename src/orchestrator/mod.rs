//! Registration orchestrator: the per-account signup state machine.

pub(crate) mod config;
pub(crate) mod error;
pub(crate) mod plan;
pub(crate) mod state;
pub(crate) mod structure;

pub use config::{OrchestratorConfig, OrchestratorConfigBuilder};
pub use error::{FailureKind, FatalError, RegistrationFailure};
pub use plan::{FieldStep, FieldValue, FormPlan, FormStage, Input, VerificationStage};
pub use state::RegistrationState;
pub use structure::{Orchestrator, Outcome};
