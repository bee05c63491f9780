//! Per-account registration driver.

use super::config::OrchestratorConfig;
use super::error::{FailureKind, FatalError, RegistrationFailure, StepError};
use super::plan::{FieldStep, FormPlan, FormStage, Inputs, VerificationStage, stage_timeout};
use super::state::RegistrationState;
use crate::account::{AccountStore, StoreError};
use crate::driver::{BrowserDriver, Verdict};
use crate::errors::{ConfigError, RetryableError};
use crate::provisioner::ProfileProvisioner;
use crate::providers::SmsProvider;
use crate::sms::{PhoneRental, SmsError, SmsVerifier};
use crate::types::{AccountId, AccountRecord, AccountStatus, RecordPatch};
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[cfg(feature = "tracing")]
use tracing::{debug, error, info, warn};

/// Result of one [`Orchestrator::run`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The account was registered and recorded as `success`.
    Success,
    /// The attempt failed and was recorded as `failed`.
    Failed(RegistrationFailure),
    /// The record was not `pending` when the run tried to claim it.
    Skipped(AccountStatus),
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success)
    }
}

/// Resources held by one run. Everything here is released in
/// [`Orchestrator::conclude`] whatever the outcome.
struct Run<D> {
    account: AccountRecord,
    state: RegistrationState,
    session: Option<D>,
    rental: Option<PhoneRental>,
}

/// Drives one account at a time through the signup state machine.
///
/// Steps run strictly in sequence. A classified failure aborts the
/// remaining steps of that account only; the rental and browser session are
/// released and the record is settled before `run` returns.
///
/// # Example
///
/// ```rust,ignore
/// use signup_orchestrator::{Orchestrator, OrchestratorConfig, JsonAccountStore};
/// use std::sync::Arc;
/// use tokio_util::sync::CancellationToken;
///
/// let store = Arc::new(JsonAccountStore::open("accounts.json").await?);
/// let orchestrator = Orchestrator::new(store, provider, provisioner, plan, config)?;
/// let outcome = orchestrator.run(&"acc-1".into(), &CancellationToken::new()).await?;
/// ```
pub struct Orchestrator<S, P, V>
where
    S: AccountStore,
    P: SmsProvider,
    V: ProfileProvisioner,
{
    store: Arc<S>,
    verifier: SmsVerifier<P>,
    provisioner: Arc<V>,
    plan: FormPlan,
    config: OrchestratorConfig,
}

impl<S, P, V> Orchestrator<S, P, V>
where
    S: AccountStore,
    P: SmsProvider,
    V: ProfileProvisioner,
{
    /// Validates both the configuration and the form plan.
    pub fn new(
        store: Arc<S>,
        provider: P,
        provisioner: Arc<V>,
        plan: FormPlan,
        config: OrchestratorConfig,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        plan.validate()?;
        Ok(Self {
            store,
            verifier: SmsVerifier::new(provider, config.sms.clone()),
            provisioner,
            plan,
            config,
        })
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn verifier(&self) -> &SmsVerifier<P> {
        &self.verifier
    }

    pub fn plan(&self) -> &FormPlan {
        &self.plan
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Register one pending account.
    ///
    /// The record is flipped to `in_progress` and persisted before any
    /// browser or provider call. Account-local failures come back as
    /// [`Outcome::Failed`]; only fatal errors are returned as `Err`, after
    /// the record has been settled as `failed`.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "orchestrator.run", skip_all, fields(account_id = %account_id))
    )]
    pub async fn run(
        &self,
        account_id: &AccountId,
        cancel: &CancellationToken,
    ) -> Result<Outcome, FatalError> {
        let account = match self.store.claim(account_id).await {
            Ok(record) => record,
            Err(StoreError::StatusConflict { actual, .. }) => {
                #[cfg(feature = "tracing")]
                debug!(status = %actual, "Account is not pending, skipping");
                return Ok(Outcome::Skipped(actual));
            }
            Err(e) => return Err(e.into()),
        };

        #[cfg(feature = "tracing")]
        info!(attempt = account.attempts, "Account claimed");

        let mut run = Run {
            account,
            state: RegistrationState::Init,
            session: None,
            rental: None,
        };
        let result = self.drive(&mut run, cancel).await;
        self.conclude(run, result).await
    }

    async fn drive(
        &self,
        run: &mut Run<V::Session>,
        cancel: &CancellationToken,
    ) -> Result<(), StepError> {
        checkpoint(cancel)?;
        let session = self
            .provisioner
            .acquire_profile()
            .await
            .map_err(StepError::provisioner)?;
        let driver = &*run.session.insert(session);

        #[cfg(feature = "tracing")]
        debug!(session = %driver.handle(), "Profile acquired");
        run.state.advance(RegistrationState::ProfileReady);

        checkpoint(cancel)?;
        driver.navigate(&self.plan.signup_url).await?;
        self.fill(driver, &self.plan.start, &Inputs::profile(&run.account))
            .await?;
        run.state.advance(RegistrationState::FormStarted);

        checkpoint(cancel)?;
        self.submit_phone(driver, &run.account, &mut run.rental, cancel)
            .await?;
        run.state.advance(RegistrationState::PhoneSubmitted);

        checkpoint(cancel)?;
        self.submit_code(driver, &run.account, &mut run.rental, cancel)
            .await?;
        run.state.advance(RegistrationState::CodeVerified);

        let inputs = Inputs {
            record: &run.account,
            phone: run.rental.as_ref().map(PhoneRental::number),
            code: None,
        };

        checkpoint(cancel)?;
        self.fill(driver, &self.plan.profile_details, &inputs).await?;
        run.state.advance(RegistrationState::ProfileDetailsSubmitted);

        checkpoint(cancel)?;
        self.fill(driver, &self.plan.identity, &inputs).await?;
        run.state.advance(RegistrationState::IdentitySubmitted);

        if let Some(completion) = &self.plan.completion {
            driver
                .wait_until(
                    completion,
                    self.config.step_timeout,
                    self.config.ui_poll_interval,
                )
                .await?;
        }
        run.state.advance(RegistrationState::Done);
        Ok(())
    }

    /// Rent a number and enter it until the form accepts one.
    ///
    /// A rejected number is cancelled and the egress rotated before the
    /// next rental.
    async fn submit_phone(
        &self,
        driver: &V::Session,
        account: &AccountRecord,
        slot: &mut Option<PhoneRental>,
        cancel: &CancellationToken,
    ) -> Result<(), StepError> {
        let attempts = self.config.sms.max_phone_attempts;
        for attempt in 1..=attempts {
            if attempt > 1 {
                checkpoint(cancel)?;
                if let Err(e) = self.provisioner.rotate_ip(driver).await {
                    if e.is_fatal() {
                        return Err(StepError::provisioner(e));
                    }
                    #[cfg(feature = "tracing")]
                    warn!(error = %e, "IP rotation failed, continuing on the same egress");
                }
            }

            let rental = slot.insert(
                self.verifier
                    .rent_number()
                    .await
                    .map_err(|e| StepError::sms(e, FailureKind::ProvisioningFailure))?,
            );
            self.store
                .update(
                    &account.id,
                    RecordPatch::default().phone(rental.number().as_str()),
                )
                .await?;

            let inputs = Inputs {
                record: account,
                phone: Some(rental.number()),
                code: None,
            };
            let verdict = self.submit(driver, &self.plan.phone, &inputs).await?;
            match verdict {
                Verdict::Accepted => {
                    #[cfg(feature = "tracing")]
                    info!(attempt, activation_id = %rental.activation_id(), "Phone number accepted");
                    return Ok(());
                }
                Verdict::Rejected => {
                    #[cfg(feature = "tracing")]
                    warn!(attempt, attempts, activation_id = %rental.activation_id(), "Phone number rejected");
                    let released = self.verifier.release(rental).await;
                    tolerate(released, "release rejected number")?;
                }
            }
        }

        Err(StepError::failed(
            FailureKind::VerificationRejected,
            format!("phone number rejected {attempts} times"),
        ))
    }

    /// Wait for a code and enter it, re-polling once per rejection.
    async fn submit_code(
        &self,
        driver: &V::Session,
        account: &AccountRecord,
        slot: &mut Option<PhoneRental>,
        cancel: &CancellationToken,
    ) -> Result<(), StepError> {
        let Some(rental) = slot.as_mut() else {
            return Err(StepError::failed(
                FailureKind::VerificationTimeout,
                "no phone number is rented",
            ));
        };

        let attempts = self.config.sms.max_code_attempts;
        for attempt in 1..=attempts {
            if attempt > 1 {
                checkpoint(cancel)?;
                self.verifier
                    .request_resend(rental)
                    .await
                    .map_err(|e| StepError::sms(e, FailureKind::VerificationTimeout))?;
            }

            let code = self
                .verifier
                .wait_for_code(rental, cancel)
                .await
                .map_err(|e| match StepError::sms(e, FailureKind::VerificationTimeout) {
                    // no fresh code after the form rejected the previous one
                    StepError::Failed {
                        kind: FailureKind::VerificationTimeout,
                        message,
                    } if attempt > 1 => {
                        StepError::failed(FailureKind::VerificationRejected, message)
                    }
                    other => other,
                })?;
            self.store
                .update(
                    &account.id,
                    RecordPatch::default().verification_code(code.as_str()),
                )
                .await?;

            let inputs = Inputs {
                record: account,
                phone: Some(rental.number()),
                code: Some(&code),
            };
            let verdict = self.submit(driver, &self.plan.code, &inputs).await?;
            match verdict {
                Verdict::Accepted => {
                    #[cfg(feature = "tracing")]
                    info!(attempt, "Verification code accepted");
                    let finished = self.verifier.finish(rental).await;
                    tolerate(finished, "finish activation")?;
                    return Ok(());
                }
                Verdict::Rejected => {
                    #[cfg(feature = "tracing")]
                    warn!(attempt, attempts, "Verification code rejected");
                }
            }
        }

        Err(StepError::failed(
            FailureKind::VerificationRejected,
            format!("verification code rejected {attempts} times"),
        ))
    }

    async fn fill(
        &self,
        driver: &V::Session,
        stage: &FormStage,
        inputs: &Inputs<'_>,
    ) -> Result<(), StepError> {
        let timeout = stage_timeout(stage.timeout_ms, self.config.step_timeout);
        let interval = self.config.ui_poll_interval;

        if let Some(ready) = &stage.ready {
            driver.wait_until(ready, timeout, interval).await?;
        }
        self.perform(driver, &stage.steps, inputs).await?;
        if let Some(done) = &stage.done {
            driver.wait_until(done, timeout, interval).await?;
        }
        Ok(())
    }

    async fn submit(
        &self,
        driver: &V::Session,
        stage: &VerificationStage,
        inputs: &Inputs<'_>,
    ) -> Result<Verdict, StepError> {
        let timeout = stage_timeout(stage.timeout_ms, self.config.step_timeout);
        let interval = self.config.ui_poll_interval;

        if let Some(ready) = &stage.ready {
            driver.wait_until(ready, timeout, interval).await?;
        }
        self.perform(driver, &stage.steps, inputs).await?;
        let verdict = driver
            .wait_for_verdict(&stage.accepted, stage.rejected.as_ref(), timeout, interval)
            .await?;
        Ok(verdict)
    }

    async fn perform(
        &self,
        driver: &V::Session,
        steps: &[FieldStep],
        inputs: &Inputs<'_>,
    ) -> Result<(), StepError> {
        for step in steps {
            let action = step.resolve(inputs)?;
            #[cfg(feature = "tracing")]
            debug!(locator = %step.locator, action = action.kind(), "UI action");
            driver.find_and_act(&step.locator, &action).await?;
        }
        Ok(())
    }

    /// Release everything the run holds, then settle the record.
    async fn conclude(
        &self,
        run: Run<V::Session>,
        result: Result<(), StepError>,
    ) -> Result<Outcome, FatalError> {
        let Run {
            account,
            mut state,
            session,
            rental,
        } = run;
        let id = &account.id;
        let reached = state;

        if result.is_err()
            && let (Some(dir), Some(driver)) = (&self.config.screenshot_dir, &session)
        {
            capture(driver, dir, id, reached).await;
        }

        if let Some(mut rental) = rental
            && rental.is_active()
            && let Err(_e) = self.verifier.release(&mut rental).await
        {
            #[cfg(feature = "tracing")]
            warn!(error = %_e, activation_id = %rental.activation_id(), "Failed to cancel rental");
        }

        if let Some(session) = session
            && let Err(_e) = self.provisioner.release_profile(session).await
        {
            #[cfg(feature = "tracing")]
            warn!(error = %_e, "Failed to release profile");
        }

        match result {
            Ok(()) => {
                self.store
                    .transition(
                        id,
                        AccountStatus::InProgress,
                        AccountStatus::Success,
                        RecordPatch::default().clear_transient(),
                    )
                    .await?;

                #[cfg(feature = "tracing")]
                info!(state = %state, "Registration succeeded");
                Ok(Outcome::Success)
            }
            Err(StepError::Failed { kind, message }) => {
                state.advance(RegistrationState::Failed);
                let failure = RegistrationFailure::new(kind, reached, message);
                self.store
                    .transition(
                        id,
                        AccountStatus::InProgress,
                        AccountStatus::Failed,
                        RecordPatch::default().failure_reason(failure.to_string()),
                    )
                    .await?;

                #[cfg(feature = "tracing")]
                info!(reason = %failure, "Registration failed");
                Ok(Outcome::Failed(failure))
            }
            Err(StepError::Fatal(fatal)) => {
                state.advance(RegistrationState::Failed);
                let failure = RegistrationFailure::new(FailureKind::Fatal, reached, fatal.to_string());
                if let Err(_e) = self
                    .store
                    .transition(
                        id,
                        AccountStatus::InProgress,
                        AccountStatus::Failed,
                        RecordPatch::default().failure_reason(failure.to_string()),
                    )
                    .await
                {
                    #[cfg(feature = "tracing")]
                    error!(error = %_e, "Could not record fatal failure");
                }

                #[cfg(feature = "tracing")]
                error!(error = %fatal, state = %reached, "Fatal error during registration");
                Err(fatal)
            }
        }
    }
}

fn checkpoint(cancel: &CancellationToken) -> Result<(), StepError> {
    if cancel.is_cancelled() {
        return Err(StepError::failed(
            FailureKind::Cancelled,
            "run cancelled before the next step",
        ));
    }
    Ok(())
}

/// Fatal provider errors abort the run; anything else is only logged.
fn tolerate(result: Result<(), SmsError>, _what: &'static str) -> Result<(), StepError> {
    match result {
        Ok(()) => Ok(()),
        Err(e) if e.is_fatal() => Err(StepError::Fatal(FatalError::Provider(e))),
        Err(_e) => {
            #[cfg(feature = "tracing")]
            warn!(error = %_e, "Could not {_what}");
            Ok(())
        }
    }
}

/// Screenshot errors never change the outcome.
async fn capture<D: BrowserDriver>(
    driver: &D,
    dir: &Path,
    id: &AccountId,
    state: RegistrationState,
) {
    let path = dir.join(format!("{id}-{state}.png"));
    if let Err(_e) = tokio::fs::create_dir_all(dir).await {
        #[cfg(feature = "tracing")]
        warn!(error = %_e, dir = %dir.display(), "Cannot create screenshot directory");
        return;
    }
    match driver.screenshot(&path).await {
        Ok(()) => {
            #[cfg(feature = "tracing")]
            debug!(path = %path.display(), "Failure screenshot saved");
        }
        Err(_e) => {
            #[cfg(feature = "tracing")]
            warn!(error = %_e, "Failure screenshot not saved");
        }
    }
}
