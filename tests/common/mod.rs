//! Scripted collaborators shared by the integration tests.
//!
//! Every fake counts its calls so tests can check resource accounting
//! (rent vs cancel vs finish) as well as final record statuses.

#![allow(dead_code)]

use keshvar::Country;
use signup_orchestrator::{
    AccountRecord, Action, ActivationId, BatchRunner, BrowserDriver, Condition, DriverError,
    FieldStep, FieldValue, FormPlan, FormStage, FullNumber, Locator, MemoryAccountStore,
    Orchestrator, OrchestratorConfig, PollResponse, ProfileProvisioner, ProvisionError,
    RentResponse, RetryConfig, RetryableError, SessionHandle, SmsCode, SmsConfig, SmsProvider,
    VerificationStage,
};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;

// ---------------------------------------------------------------------------
// SMS provider
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Error)]
#[error("fake provider error (retryable: {retryable}, fatal: {fatal})")]
pub struct FakeProviderError {
    pub retryable: bool,
    pub fatal: bool,
}

impl FakeProviderError {
    pub fn transient() -> Self {
        Self {
            retryable: true,
            fatal: false,
        }
    }

    pub fn bad_key() -> Self {
        Self {
            retryable: false,
            fatal: true,
        }
    }
}

impl RetryableError for FakeProviderError {
    fn is_retryable(&self) -> bool {
        self.retryable
    }

    fn is_fatal(&self) -> bool {
        self.fatal
    }
}

/// How polls answer once the scripted responses are used up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// A fresh code on every poll.
    Immediate,
    /// Never any code.
    Never,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProviderCalls {
    pub rent: usize,
    pub poll: usize,
    pub cancel: usize,
    pub finish: usize,
    pub resend: usize,
}

#[derive(Debug)]
struct ProviderState {
    rent_script: VecDeque<Result<RentResponse, FakeProviderError>>,
    poll_script: VecDeque<Result<PollResponse, FakeProviderError>>,
    delivery: Delivery,
    balance: Result<f64, FakeProviderError>,
    calls: ProviderCalls,
    rent_times: Vec<Instant>,
    rented: usize,
    codes_sent: usize,
}

#[derive(Debug, Clone)]
pub struct FakeProvider {
    state: Arc<Mutex<ProviderState>>,
}

impl Default for FakeProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeProvider {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(ProviderState {
                rent_script: VecDeque::new(),
                poll_script: VecDeque::new(),
                delivery: Delivery::Immediate,
                balance: Ok(100.0),
                calls: ProviderCalls::default(),
                rent_times: Vec::new(),
                rented: 0,
                codes_sent: 0,
            })),
        }
    }

    pub fn with_rents(self, script: Vec<Result<RentResponse, FakeProviderError>>) -> Self {
        self.state.lock().unwrap().rent_script = script.into();
        self
    }

    pub fn with_polls(self, script: Vec<Result<PollResponse, FakeProviderError>>) -> Self {
        self.state.lock().unwrap().poll_script = script.into();
        self
    }

    pub fn with_delivery(self, delivery: Delivery) -> Self {
        self.state.lock().unwrap().delivery = delivery;
        self
    }

    pub fn with_balance(self, balance: Result<f64, FakeProviderError>) -> Self {
        self.state.lock().unwrap().balance = balance;
        self
    }

    pub fn calls(&self) -> ProviderCalls {
        self.state.lock().unwrap().calls
    }

    /// Virtual-clock instants of every `rent` call.
    pub fn rent_times(&self) -> Vec<Instant> {
        self.state.lock().unwrap().rent_times.clone()
    }
}

impl SmsProvider for FakeProvider {
    type Error = FakeProviderError;

    async fn rent(&self, _service: &str, _country: &Country) -> Result<RentResponse, Self::Error> {
        let mut state = self.state.lock().unwrap();
        state.calls.rent += 1;
        state.rent_times.push(Instant::now());
        if let Some(scripted) = state.rent_script.pop_front() {
            return scripted;
        }
        state.rented += 1;
        let n = state.rented;
        Ok(RentResponse::Rented {
            activation_id: ActivationId::new(format!("act-{n}")),
            number: FullNumber::new(format!("1555000{n:04}")),
        })
    }

    async fn poll(&self, _activation_id: &ActivationId) -> Result<PollResponse, Self::Error> {
        let mut state = self.state.lock().unwrap();
        state.calls.poll += 1;
        if let Some(scripted) = state.poll_script.pop_front() {
            return scripted;
        }
        match state.delivery {
            Delivery::Immediate => {
                state.codes_sent += 1;
                Ok(PollResponse::Code(SmsCode::new(format!(
                    "{:06}",
                    100_000 + state.codes_sent
                ))))
            }
            Delivery::Never => Ok(PollResponse::Pending),
        }
    }

    async fn finish(&self, _activation_id: &ActivationId) -> Result<(), Self::Error> {
        self.state.lock().unwrap().calls.finish += 1;
        Ok(())
    }

    async fn cancel(&self, _activation_id: &ActivationId) -> Result<(), Self::Error> {
        self.state.lock().unwrap().calls.cancel += 1;
        Ok(())
    }

    async fn request_resend(&self, _activation_id: &ActivationId) -> Result<(), Self::Error> {
        self.state.lock().unwrap().calls.resend += 1;
        Ok(())
    }

    async fn balance(&self) -> Result<f64, Self::Error> {
        self.state.lock().unwrap().balance.clone()
    }
}

pub fn rented(id: &str, number: &str) -> Result<RentResponse, FakeProviderError> {
    Ok(RentResponse::Rented {
        activation_id: ActivationId::from(id),
        number: FullNumber::from(number),
    })
}

// ---------------------------------------------------------------------------
// Browser driver
// ---------------------------------------------------------------------------

/// Behaviour of the fake site, shared by every session.
#[derive(Debug, Default)]
pub struct SiteScript {
    /// Phone numbers to reject before accepting one.
    pub reject_phones: usize,
    /// Codes to reject before accepting one.
    pub reject_codes: usize,
    /// A condition that never holds.
    pub stall: Option<Condition>,
    /// An element that cannot be found.
    pub missing: Option<Locator>,
    /// Cancel this token when the code is typed.
    pub cancel_on_code: Option<tokio_util::sync::CancellationToken>,
}

#[derive(Debug, Default)]
struct SiteState {
    script: SiteScript,
    phone_verdict: Option<bool>,
    code_verdict: Option<bool>,
    actions: Vec<(String, Locator, Action)>,
    navigations: usize,
    screenshots: Vec<PathBuf>,
}

#[derive(Debug, Clone, Default)]
pub struct FakeSite {
    state: Arc<Mutex<SiteState>>,
}

impl FakeSite {
    pub fn new(script: SiteScript) -> Self {
        Self {
            state: Arc::new(Mutex::new(SiteState {
                script,
                ..SiteState::default()
            })),
        }
    }

    /// Values typed into a field, in order, across all sessions.
    pub fn typed_into(&self, locator: &Locator) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .actions
            .iter()
            .filter(|(_, l, _)| l == locator)
            .filter_map(|(_, _, action)| match action {
                Action::Type(value) => Some(value.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn action_count(&self) -> usize {
        self.state.lock().unwrap().actions.len()
    }

    pub fn navigations(&self) -> usize {
        self.state.lock().unwrap().navigations
    }

    pub fn screenshots(&self) -> Vec<PathBuf> {
        self.state.lock().unwrap().screenshots.clone()
    }
}

#[derive(Debug)]
pub struct FakeDriver {
    handle: SessionHandle,
    site: FakeSite,
}

impl BrowserDriver for FakeDriver {
    fn handle(&self) -> &SessionHandle {
        &self.handle
    }

    async fn navigate(&self, _url: &str) -> Result<(), DriverError> {
        self.site.state.lock().unwrap().navigations += 1;
        Ok(())
    }

    async fn find_and_act(&self, locator: &Locator, action: &Action) -> Result<(), DriverError> {
        let mut site = self.site.state.lock().unwrap();
        if site.script.missing.as_ref() == Some(locator) {
            return Err(DriverError::ElementNotFound {
                locator: locator.to_string(),
            });
        }
        if let Action::Type(_) = action {
            if *locator == phone_field() {
                let accept = site.script.reject_phones == 0;
                if !accept {
                    site.script.reject_phones -= 1;
                }
                site.phone_verdict = Some(accept);
            } else if *locator == code_field() {
                let accept = site.script.reject_codes == 0;
                if !accept {
                    site.script.reject_codes -= 1;
                }
                site.code_verdict = Some(accept);
                if let Some(token) = &site.script.cancel_on_code {
                    token.cancel();
                }
            }
        }
        site.actions
            .push((self.handle.profile_id.clone(), locator.clone(), action.clone()));
        Ok(())
    }

    async fn probe(&self, condition: &Condition) -> Result<bool, DriverError> {
        let site = self.site.state.lock().unwrap();
        if site.script.stall.as_ref() == Some(condition) {
            return Ok(false);
        }
        Ok(if *condition == phone_accepted() {
            site.phone_verdict == Some(true)
        } else if *condition == phone_rejected() {
            site.phone_verdict == Some(false)
        } else if *condition == code_accepted() {
            site.code_verdict == Some(true)
        } else if *condition == code_rejected() {
            site.code_verdict == Some(false)
        } else {
            true
        })
    }

    async fn screenshot(&self, path: &Path) -> Result<(), DriverError> {
        self.site
            .state
            .lock()
            .unwrap()
            .screenshots
            .push(path.to_path_buf());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Profile provisioner
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProvisionerCalls {
    pub acquire: usize,
    pub release: usize,
    pub rotate: usize,
}

#[derive(Debug, Default)]
struct ProvisionerState {
    calls: ProvisionerCalls,
    failure: Option<fn() -> ProvisionError>,
    panic_on: Option<usize>,
}

#[derive(Debug, Clone, Default)]
pub struct FakeProvisioner {
    site: FakeSite,
    state: Arc<Mutex<ProvisionerState>>,
}

impl FakeProvisioner {
    pub fn new(site: FakeSite) -> Self {
        Self {
            site,
            state: Arc::default(),
        }
    }

    /// Make every `acquire_profile` fail with the given error.
    pub fn failing(self, failure: fn() -> ProvisionError) -> Self {
        self.state.lock().unwrap().failure = Some(failure);
        self
    }

    /// Panic inside the `n`-th `acquire_profile` call.
    pub fn panicking_on(self, n: usize) -> Self {
        self.state.lock().unwrap().panic_on = Some(n);
        self
    }

    pub fn calls(&self) -> ProvisionerCalls {
        self.state.lock().unwrap().calls
    }
}

impl ProfileProvisioner for FakeProvisioner {
    type Session = FakeDriver;
    type Error = ProvisionError;

    async fn acquire_profile(&self) -> Result<FakeDriver, ProvisionError> {
        let mut state = self.state.lock().unwrap();
        state.calls.acquire += 1;
        if state.panic_on == Some(state.calls.acquire) {
            drop(state);
            panic!("profile service crashed");
        }
        if let Some(failure) = state.failure {
            return Err(failure());
        }
        Ok(FakeDriver {
            handle: SessionHandle::new(format!("profile-{}", state.calls.acquire))
                .with_proxy("127.0.0.1:9000"),
            site: self.site.clone(),
        })
    }

    async fn release_profile(&self, _session: FakeDriver) -> Result<(), ProvisionError> {
        self.state.lock().unwrap().calls.release += 1;
        Ok(())
    }

    async fn rotate_ip(&self, _session: &FakeDriver) -> Result<(), ProvisionError> {
        self.state.lock().unwrap().calls.rotate += 1;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Plan, records and wiring
// ---------------------------------------------------------------------------

pub fn phone_field() -> Locator {
    Locator::id("phone")
}

pub fn code_field() -> Locator {
    Locator::id("code")
}

pub fn phone_accepted() -> Condition {
    Condition::visible(code_field())
}

pub fn phone_rejected() -> Condition {
    Condition::text_present("invalid number")
}

pub fn code_accepted() -> Condition {
    Condition::url_contains("/welcome")
}

pub fn code_rejected() -> Condition {
    Condition::text_present("wrong code")
}

pub fn plan() -> FormPlan {
    FormPlan {
        signup_url: "https://site.test/signup".into(),
        start: FormStage {
            ready: Some(Condition::visible(Locator::id("first_name"))),
            steps: vec![
                FieldStep::type_in(
                    Locator::id("first_name"),
                    FieldValue::Profile("first_name".into()),
                ),
                FieldStep::click(Locator::id("next")),
            ],
            ..FormStage::default()
        },
        phone: VerificationStage {
            ready: Some(Condition::visible(phone_field())),
            steps: vec![
                FieldStep::type_in(phone_field(), FieldValue::PhoneInternational),
                FieldStep::click(Locator::id("send_code")),
            ],
            accepted: phone_accepted(),
            rejected: Some(phone_rejected()),
            timeout_ms: None,
        },
        code: VerificationStage {
            ready: None,
            steps: vec![
                FieldStep::type_in(code_field(), FieldValue::Code),
                FieldStep::click(Locator::id("verify")),
            ],
            accepted: code_accepted(),
            rejected: Some(code_rejected()),
            timeout_ms: None,
        },
        profile_details: FormStage {
            steps: vec![FieldStep::type_in(
                Locator::name("address"),
                FieldValue::Profile("address".into()),
            )],
            ..FormStage::default()
        },
        identity: FormStage {
            steps: vec![
                FieldStep::check(Locator::css("#terms"), true),
                FieldStep::click(Locator::id("finish")),
            ],
            done: Some(Condition::url_contains("/done")),
            ..FormStage::default()
        },
        completion: Some(Condition::text_present("Welcome")),
    }
}

pub fn record(id: &str) -> AccountRecord {
    AccountRecord::new(id)
        .with_field("first_name", format!("Name {id}"))
        .with_field("address", format!("{id} Main Street"))
}

pub fn records(n: usize) -> Vec<AccountRecord> {
    (1..=n).map(|i| record(&format!("acc-{i}"))).collect()
}

pub fn rent_retry() -> RetryConfig {
    RetryConfig::default()
        .with_min_delay(Duration::from_secs(1))
        .with_max_delay(Duration::from_secs(8))
        .with_max_retries(3)
}

pub fn config() -> OrchestratorConfig {
    OrchestratorConfig::builder()
        .sms(
            SmsConfig::builder()
                .api_key("test-key")
                .service("svc")
                .code_timeout(Duration::from_secs(30))
                .poll_interval(Duration::from_secs(3))
                .rent_retry(rent_retry())
                .build(),
        )
        .step_timeout(Duration::from_secs(5))
        .ui_poll_interval(Duration::from_millis(100))
        .build()
}

pub type TestOrchestrator = Orchestrator<MemoryAccountStore, FakeProvider, FakeProvisioner>;
pub type TestRunner = BatchRunner<MemoryAccountStore, FakeProvider, FakeProvisioner>;

/// Everything a test needs to drive and inspect one setup.
pub struct Harness {
    pub store: Arc<MemoryAccountStore>,
    pub provider: FakeProvider,
    pub provisioner: FakeProvisioner,
    pub site: FakeSite,
    pub orchestrator: Arc<TestOrchestrator>,
}

impl Harness {
    pub fn new(records: Vec<AccountRecord>, provider: FakeProvider, script: SiteScript) -> Self {
        Self::with_config(records, provider, script, config())
    }

    pub fn with_config(
        records: Vec<AccountRecord>,
        provider: FakeProvider,
        script: SiteScript,
        config: OrchestratorConfig,
    ) -> Self {
        let site = FakeSite::new(script);
        let provisioner = FakeProvisioner::new(site.clone());
        Self::assemble(records, provider, provisioner, site, config)
    }

    pub fn assemble(
        records: Vec<AccountRecord>,
        provider: FakeProvider,
        provisioner: FakeProvisioner,
        site: FakeSite,
        config: OrchestratorConfig,
    ) -> Self {
        let store = Arc::new(MemoryAccountStore::new(records).unwrap());
        let orchestrator = Orchestrator::new(
            Arc::clone(&store),
            provider.clone(),
            Arc::new(provisioner.clone()),
            plan(),
            config,
        )
        .unwrap();
        Self {
            store,
            provider,
            provisioner,
            site,
            orchestrator: Arc::new(orchestrator),
        }
    }

    pub fn record(&self, id: &str) -> AccountRecord {
        self.store
            .snapshot()
            .into_iter()
            .find(|r| r.id.as_str() == id)
            .unwrap()
    }
}
