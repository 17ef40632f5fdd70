//! The service a cover interface talks to.
//!
//! One [`CoverGate`] per protected application. It owns the classifier, the
//! session state, and the wipe executor, and turns a submitted code into the
//! [`CoverFeedback`] the cover should show. The wipe is scheduled at most once
//! per gate, however many panic codes arrive.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use covergate_types::{
    ClassificationOutcome, CodeError, CodePolicy, CoverFeedback, LifecycleEvent, PinCode, Role,
    SessionState,
};
use thiserror::Error;
use tokio::sync::watch;

use crate::classifier::PinClassifier;
use crate::config::{DEFAULT_WIPE_DELAY_MS, GateConfig};
use crate::registry::CredentialRegistry;
use crate::session::{SessionError, SessionGate};
use crate::store::{CredentialStore, EncryptedFileStore, StoreError, StoreKey};
use crate::wipe::{Terminator, WipeExecutor, WipeHandle, WipePlan};

#[derive(Debug, Error)]
pub enum SubmitError {
    /// The store could not be read. Access is never granted on this path.
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Session(#[from] SessionError),
}

#[derive(Debug, Error)]
pub enum EnrollError {
    /// The candidate already opens another role. The caller should re-prompt.
    #[error("code is already in use by the {existing} role")]
    Collision { existing: Role },
    #[error("confirmation does not match")]
    ConfirmationMismatch,
    #[error("current code is not the real code")]
    NotAuthorized,
    #[error("a real code must be set before the {role} role")]
    RealNotConfigured { role: Role },
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Error)]
pub enum OpenError {
    #[error("no home directory; set [store] path explicitly")]
    NoStorePath,
    /// A panic code must destroy something; list at least one `[[wipe.targets]]`.
    #[error("no wipe targets configured")]
    NoWipeTargets,
    #[error(transparent)]
    Codes(#[from] CodeError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

pub struct CoverGate<S> {
    classifier: PinClassifier<S>,
    session: SessionGate,
    wipe: Arc<WipeExecutor>,
    wipe_delay: Duration,
    wipe_scheduled: AtomicBool,
    wipe_handle: Mutex<Option<WipeHandle>>,
    policy: CodePolicy,
}

impl<S> fmt::Debug for CoverGate<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CoverGate")
            .field("session", &self.session)
            .field("wipe_delay", &self.wipe_delay)
            .finish_non_exhaustive()
    }
}

impl CoverGate<EncryptedFileStore> {
    /// Open the sealed store named by `config` and assemble a gate around it.
    ///
    /// Refuses a config with no wipe targets, so a panic code can never
    /// silently destroy nothing.
    pub fn open(
        config: &GateConfig,
        key: &StoreKey,
        terminator: Arc<dyn Terminator>,
    ) -> Result<Self, OpenError> {
        let policy = config.code_policy()?;
        if config.wipe.targets.is_empty() {
            return Err(OpenError::NoWipeTargets);
        }
        let path = config.store_path().ok_or(OpenError::NoStorePath)?;
        let store = Arc::new(EncryptedFileStore::open(path, key)?);
        let plan = config.wipe.plan(None);

        Ok(
            Self::new(Arc::new(CredentialRegistry::new(store)), plan, terminator)
                .with_wipe_delay(config.wipe.delay())
                .with_code_policy(policy),
        )
    }
}

impl<S: CredentialStore + 'static> CoverGate<S> {
    /// The store's backing file, if any, is always added to the plan's
    /// preserved paths.
    #[must_use]
    pub fn new(
        registry: Arc<CredentialRegistry<S>>,
        plan: WipePlan,
        terminator: Arc<dyn Terminator>,
    ) -> Self {
        if plan.target_list().is_empty() {
            tracing::warn!("Wipe plan has no targets; a panic code will only terminate");
        }
        let plan = match registry.store().backing_path() {
            Some(path) => plan.preserve(path),
            None => plan,
        };
        Self {
            classifier: PinClassifier::new(registry),
            session: SessionGate::new(),
            wipe: Arc::new(WipeExecutor::new(plan, terminator)),
            wipe_delay: Duration::from_millis(DEFAULT_WIPE_DELAY_MS),
            wipe_scheduled: AtomicBool::new(false),
            wipe_handle: Mutex::new(None),
            policy: CodePolicy::default(),
        }
    }

    #[must_use]
    pub fn with_wipe_delay(mut self, delay: Duration) -> Self {
        self.wipe_delay = delay;
        self
    }

    #[must_use]
    pub fn with_code_policy(mut self, policy: CodePolicy) -> Self {
        self.policy = policy;
        self
    }

    #[must_use]
    pub fn registry(&self) -> &Arc<CredentialRegistry<S>> {
        self.classifier.registry()
    }

    #[must_use]
    pub fn classifier(&self) -> &PinClassifier<S> {
        &self.classifier
    }

    /// Validate raw keypad input against this gate's length bounds.
    pub fn parse_code(&self, raw: &str) -> Result<PinCode, CodeError> {
        PinCode::with_policy(raw, self.policy)
    }

    pub fn is_configured(&self) -> Result<bool, StoreError> {
        self.registry().is_configured()
    }

    #[must_use]
    pub fn state(&self) -> SessionState {
        self.session.state()
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.session.subscribe()
    }

    /// Forward a host lifecycle notification to the session.
    pub fn lifecycle(&self, event: LifecycleEvent) -> Result<SessionState, SessionError> {
        self.session.handle(event)
    }

    /// Classify `code`, advance the session, and say what the cover shows.
    ///
    /// A panic code schedules the wipe and returns the same feedback as a
    /// decoy. A storage fault leaves the session untouched. A real code whose
    /// classification overlapped a hiding lifecycle event does not unlock and
    /// is rejected.
    pub async fn submit(&self, code: PinCode) -> Result<CoverFeedback, SubmitError> {
        if self.session.state().is_terminal() {
            return Err(SessionError::Wiped.into());
        }

        let since = self.session.epoch();
        let outcome = self.classifier.evaluate_async(code).await?;
        let state = self.session.handle_classified(outcome, since)?;
        if outcome == ClassificationOutcome::Wipe {
            self.schedule_wipe();
        }
        if outcome == ClassificationOutcome::Real && state != SessionState::Unlocked {
            return Ok(CoverFeedback::Reject);
        }
        Ok(outcome.feedback())
    }

    /// [`submit`](Self::submit) for unvalidated keypad input.
    ///
    /// Input that cannot be a code is rejected like any wrong code.
    pub async fn submit_raw(&self, raw: &str) -> Result<CoverFeedback, SubmitError> {
        match self.parse_code(raw) {
            Ok(code) => self.submit(code).await,
            Err(_) => {
                self.session.handle(ClassificationOutcome::Wrong)?;
                Ok(CoverFeedback::Reject)
            }
        }
    }

    /// Completion of the scheduled wipe, once a panic code has been accepted.
    #[must_use]
    pub fn wipe_handle(&self) -> Option<WipeHandle> {
        self.wipe_handle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn schedule_wipe(&self) {
        if self.wipe_scheduled.swap(true, Ordering::SeqCst) {
            return;
        }
        let handle = self.wipe.schedule(self.wipe_delay);
        *self.wipe_handle.lock().unwrap_or_else(PoisonError::into_inner) = Some(handle);
    }

    /// Set `role`'s code after checking it against every other configured role.
    ///
    /// Re-entering a role's own current code is allowed. Decoy and panic codes
    /// need a real code first. Use [`change_real`](Self::change_real) once a
    /// real code exists and the owner is changing it.
    pub async fn enroll(&self, role: Role, code: PinCode) -> Result<(), EnrollError> {
        let registry = Arc::clone(self.registry());
        run_blocking(move || enroll_with(&registry, role, &code)).await
    }

    /// [`enroll`](Self::enroll) behind a second entry of the same code.
    pub async fn enroll_confirmed(
        &self,
        role: Role,
        code: PinCode,
        confirmation: PinCode,
    ) -> Result<(), EnrollError> {
        if code != confirmation {
            return Err(EnrollError::ConfirmationMismatch);
        }
        self.enroll(role, code).await
    }

    /// Replace the real code, proving knowledge of the current one first.
    pub async fn change_real(&self, current: PinCode, new: PinCode) -> Result<(), EnrollError> {
        let classifier = self.classifier.clone();
        run_blocking(move || {
            if classifier.evaluate(&current)? != ClassificationOutcome::Real {
                tracing::info!("Real code change refused");
                return Err(EnrollError::NotAuthorized);
            }
            enroll_with(classifier.registry(), Role::Real, &new)
        })
        .await
    }
}

fn enroll_with<S: CredentialStore>(
    registry: &CredentialRegistry<S>,
    role: Role,
    code: &PinCode,
) -> Result<(), EnrollError> {
    let _writes = registry.write_lock();
    if role != Role::Real && !registry.is_configured()? {
        return Err(EnrollError::RealNotConfigured { role });
    }
    for existing in Role::ALL.into_iter().filter(|r| *r != role) {
        if registry.matches(existing, code)? {
            tracing::info!(role = %role, "Enrollment refused: code collision");
            return Err(EnrollError::Collision { existing });
        }
    }
    registry.set_locked(role, code)?;
    Ok(())
}

async fn run_blocking<T, F>(f: F) -> Result<T, EnrollError>
where
    F: FnOnce() -> Result<T, EnrollError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f).await.map_err(|e| {
        tracing::error!("Enrollment task failed: {e}");
        EnrollError::Store(StoreError::Unavailable("enrollment task failed".into()))
    })?
}
