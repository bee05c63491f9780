//! # Signup Orchestrator
//!
//! Drives bulk account registration through a multi-step signup form with
//! phone verification over a pay-per-number SMS relay.
//!
//! The crate owns the control flow: the per-account state machine, the
//! rent / poll / cancel protocol of phone rentals, failure classification,
//! and the account status lifecycle that lets a batch resume safely after a
//! crash. The browser, the SMS provider client and the profile provisioner
//! are traits implemented by the caller.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use signup_orchestrator::{
//!     BatchConfig, BatchRunner, FormPlan, JsonAccountStore, Orchestrator,
//!     OrchestratorConfig, RetryingSmsProvider, SmsConfig,
//! };
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = Arc::new(JsonAccountStore::open("accounts.json").await?);
//!     let plan: FormPlan = serde_json::from_str(&std::fs::read_to_string("plan.json")?)?;
//!
//!     let config = OrchestratorConfig::builder()
//!         .sms(SmsConfig::default().with_api_key("key").with_service("svc"))
//!         .try_build()?;
//!
//!     // `MyProvider` and `MyProvisioner` implement the collaborator traits.
//!     let provider = RetryingSmsProvider::new(MyProvider::new());
//!     let orchestrator = Orchestrator::new(store, provider, Arc::new(MyProvisioner), plan, config)?;
//!
//!     let runner = BatchRunner::new(orchestrator, BatchConfig::default().with_max_accounts(10));
//!     let stats = runner.run().await?;
//!     println!("{stats}");
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! BatchRunner  (recovery pass, balance pre-flight, worker pool)
//!      │
//!      ▼
//! Orchestrator<S, P, V>  (state machine, guaranteed teardown)
//!      │            │                 │
//!      ▼            ▼                 ▼
//! AccountStore  SmsVerifier<P>   ProfileProvisioner ──► BrowserDriver
//!                   │
//!                   ▼
//!           RetryingSmsProvider<P>  (optional retry wrapper)
//!                   │
//!                   ▼
//!              SmsProvider
//! ```
//!
//! ## Features
//!
//! - `tracing` - structured logging through `tracing` (enabled by default)

pub mod account;
pub mod batch;
pub mod driver;
pub mod errors;
pub mod orchestrator;
pub mod providers;
pub mod provisioner;
pub mod sms;
pub mod types;
pub mod utils;

// Re-export commonly used types at the crate root
pub use account::{
    AccountStats, AccountStore, JsonAccountStore, Ledger, MemoryAccountStore, StoreError,
};
pub use batch::{BatchConfig, BatchRunner, BatchStats};
pub use driver::{Action, BrowserDriver, Condition, DriverError, Locator, Verdict};
pub use errors::{ConfigError, RetryableError};
pub use orchestrator::{
    FailureKind, FatalError, FieldStep, FieldValue, FormPlan, FormStage, Orchestrator,
    OrchestratorConfig, OrchestratorConfigBuilder, Outcome, RegistrationFailure,
    RegistrationState, VerificationStage,
};
pub use providers::{PollResponse, RentResponse, RetryingSmsProvider, SmsProvider};
pub use provisioner::{ProfileProvisioner, ProvisionError, SessionHandle};
pub use sms::{
    CodeStatus, PhoneRental, RentalState, SmsConfig, SmsConfigBuilder, SmsError, SmsVerifier,
};
pub use types::{
    AccountId, AccountRecord, AccountStatus, ActivationId, FullNumber, RecordPatch, SmsCode,
};
pub use utils::retry::RetryConfig;
