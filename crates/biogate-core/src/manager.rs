//! Biometric authentication manager
//!
//! One instance per process is the single authority for lockout decisions.
//! It owns the cached capabilities and the in-memory settings; storage is a
//! write-through copy refreshed after every mutation.
//!
//! # Suspension points
//!
//! Operations only await on the platform (probe, challenge) and on the
//! storage adapters. The platform challenge is never awaited while the state
//! lock is held. At most one challenge is in flight at a time; a concurrent
//! `authenticate` or `enable_biometric_auth` is refused with `busy`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::{Notify, RwLock};
use tracing::{debug, info, warn};

use crate::clock::{Clock, SystemClock};
use crate::config::ManagerConfig;
use crate::feedback::{FeedbackEvent, FeedbackSink, NoopFeedback};
use crate::platform::BiometricPlatform;
use crate::policy::AttemptDecision;
use crate::prober::CapabilityProber;
use crate::settings::SettingsRepository;
use crate::store::{KeyValueStore, SecureVault};
use crate::types::{
    duration_to_millis, AuthErrorKind, BiometricAuthResult, BiometricCapabilities,
    BiometricSettings, LockoutStatus, Modality, PromptOptions,
};
use crate::vault::TokenVault;

const FALLBACK_WARNING: &str = "Device passcode was chosen instead of biometrics";

/// Mutable state owned by the manager
struct ManagerState {
    /// Last probe result, `None` until the first probe
    capabilities: Option<BiometricCapabilities>,
    /// Authoritative settings
    settings: BiometricSettings,
    /// The last save did not reach storage
    dirty: bool,
}

/// Clears the in-flight flag when the attempt ends, including on drop of
/// the attempt future
struct AttemptGuard<'a> {
    flag: &'a AtomicBool,
}

impl Drop for AttemptGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// Biometric authentication and lockout manager
pub struct BiometricAuthManager {
    platform: Arc<dyn BiometricPlatform>,
    prober: CapabilityProber,
    settings: SettingsRepository,
    tokens: TokenVault,
    clock: Arc<dyn Clock>,
    feedback: Arc<dyn FeedbackSink>,
    config: ManagerConfig,
    state: RwLock<ManagerState>,
    in_flight: AtomicBool,
    /// Set by `cancel_pending` for the attempt currently in flight
    cancel_requested: AtomicBool,
    cancel: Notify,
}

impl BiometricAuthManager {
    /// Create a manager over the given collaborators
    ///
    /// Nothing is probed or loaded until `initialize` or the first
    /// `authenticate`.
    pub fn new(
        platform: Arc<dyn BiometricPlatform>,
        store: Arc<dyn KeyValueStore>,
        vault: Arc<dyn SecureVault>,
        config: ManagerConfig,
    ) -> Self {
        let settings = SettingsRepository::with_max_failures(store, config.policy.max_failures);
        let initial = settings.defaults();

        Self {
            prober: CapabilityProber::new(Arc::clone(&platform)),
            platform,
            settings,
            tokens: TokenVault::new(vault),
            clock: Arc::new(SystemClock),
            feedback: Arc::new(NoopFeedback),
            config,
            state: RwLock::new(ManagerState {
                capabilities: None,
                settings: initial,
                dirty: false,
            }),
            in_flight: AtomicBool::new(false),
            cancel_requested: AtomicBool::new(false),
            cancel: Notify::new(),
        }
    }

    /// Replace the clock
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Replace the feedback sink
    pub fn with_feedback(mut self, feedback: Arc<dyn FeedbackSink>) -> Self {
        self.feedback = feedback;
        self
    }

    /// Probe capabilities and load settings
    ///
    /// Safe to call repeatedly; every call re-probes and re-loads. If the
    /// last save failed, the in-memory settings are kept and saved again
    /// instead of being replaced by the stale stored copy.
    pub async fn initialize(&self) -> BiometricCapabilities {
        let capabilities = self.prober.probe().await;

        let settings = {
            let mut state = self.state.write().await;
            state.capabilities = Some(capabilities.clone());

            if state.dirty {
                warn!("Previous settings save failed, retrying instead of reloading");
                let ok = self.settings.save(&state.settings).await;
                state.dirty = !ok;
            } else {
                state.settings = self.settings.load().await;
            }
            state.settings.clone()
        };

        if settings.enabled && !self.tokens.is_issued().await {
            warn!("Biometric login is enabled but no login token is stored");
        }

        info!(
            available = capabilities.is_available(),
            enabled = settings.enabled,
            failure_count = settings.failure_count,
            "Biometric authentication initialized"
        );
        capabilities
    }

    /// Run one biometric authentication attempt
    pub async fn authenticate(&self, options: &PromptOptions) -> BiometricAuthResult {
        let Some(_guard) = self.begin_attempt() else {
            debug!("Rejecting authenticate: another attempt is in flight");
            return self.finish(BiometricAuthResult::failure(AuthErrorKind::Busy));
        };

        // 1. Probe if never probed
        let capabilities = self.ensure_initialized().await;

        // 2. Hardware check
        if !capabilities.is_available() {
            return self.finish(BiometricAuthResult::failure(
                AuthErrorKind::HardwareUnavailable,
            ));
        }

        // 3. Feature check
        let settings = self.state.read().await.settings.clone();
        if !settings.enabled {
            return self.finish(BiometricAuthResult::failure(AuthErrorKind::FeatureDisabled));
        }

        // 4. Lockout check, before the platform is touched
        if let AttemptDecision::Refuse { remaining } =
            self.config.policy.check_attempt(&settings, self.clock.now())
        {
            info!(
                remaining_ms = duration_to_millis(remaining),
                "Biometric attempt refused, locked out"
            );
            return self.finish(BiometricAuthResult::locked_out(remaining));
        }

        // 5. Platform challenge
        let outcome = self.run_challenge(options).await;

        // 6. Apply the transition and persist
        let now = self.clock.now();
        let mut state = self.state.write().await;
        let next = self
            .config
            .policy
            .apply_outcome(&state.settings, outcome.map(|_| ()), now);
        if let Some(next) = next {
            self.commit(&mut state, next).await;
        }

        let result = match outcome {
            Ok(modality) => {
                info!("Biometric authentication succeeded");
                BiometricAuthResult::success(modality.or(capabilities.primary_modality()))
            }
            Err(kind) if kind.is_counted() => {
                let remaining = self.config.policy.lockout_remaining(&state.settings, now);
                info!(
                    failure_count = state.settings.failure_count,
                    locked = remaining.is_some(),
                    "Biometric authentication failed"
                );
                let mut result = BiometricAuthResult::failure(kind)
                    .with_warning(self.config.policy.describe(&state.settings, now));
                result.time_remaining_ms = remaining.map(duration_to_millis);
                result
            }
            Err(kind) => {
                debug!(
                    error = %kind,
                    cancelled = kind.is_cancellation(),
                    "Biometric authentication aborted"
                );
                fallback_result(kind)
            }
        };
        drop(state);

        self.finish(result)
    }

    /// Enable biometric login after a dedicated enrollment challenge
    ///
    /// The challenge forbids the device passcode. A lockout left over from a
    /// previous enrollment does not block it, but re-enabling while already
    /// enabled and locked is refused with `locked_out`. On success the
    /// failure history is cleared and a new login token is issued.
    pub async fn enable_biometric_auth(&self) -> BiometricAuthResult {
        let Some(_guard) = self.begin_attempt() else {
            debug!("Rejecting enable: another attempt is in flight");
            return self.finish(BiometricAuthResult::failure(AuthErrorKind::Busy));
        };

        let capabilities = self.ensure_initialized().await;
        if !capabilities.is_available() {
            return self.finish(BiometricAuthResult::failure(
                AuthErrorKind::HardwareUnavailable,
            ));
        }

        let settings = self.state.read().await.settings.clone();
        if settings.enabled {
            if let AttemptDecision::Refuse { remaining } =
                self.config.policy.check_attempt(&settings, self.clock.now())
            {
                info!(
                    remaining_ms = duration_to_millis(remaining),
                    "Re-enrollment refused, locked out"
                );
                return self.finish(BiometricAuthResult::locked_out(remaining));
            }
        }

        let options = PromptOptions {
            disable_device_fallback: true,
            ..self.config.enrollment_prompt.clone()
        };

        match self.run_challenge(&options).await {
            Ok(modality) => {
                let now = self.clock.now();
                {
                    let mut state = self.state.write().await;
                    let next = self.config.policy.record_enrollment(&state.settings, now);
                    self.commit(&mut state, next).await;
                }
                self.tokens.issue().await;
                info!("Biometric login enabled");
                self.finish(BiometricAuthResult::success(
                    modality.or(capabilities.primary_modality()),
                ))
            }
            Err(kind) => {
                info!(error = %kind, "Biometric enrollment challenge did not succeed");
                self.finish(fallback_result(kind))
            }
        }
    }

    /// Disable biometric login and revoke the login token
    ///
    /// Always succeeds from the caller's point of view, including when
    /// already disabled.
    pub async fn disable_biometric_auth(&self) {
        {
            let mut state = self.state.write().await;
            let next = self
                .config
                .policy
                .record_disable(&state.settings, self.config.clear_history_on_disable);
            self.commit(&mut state, next).await;
        }
        self.tokens.revoke().await;
        info!("Biometric login disabled");
    }

    /// Resolve the in-flight attempt as `system_cancel`
    ///
    /// An attempt that has not reached the platform challenge yet resolves as
    /// cancelled once it does. No-op when nothing is in flight.
    pub fn cancel_pending(&self) {
        if self.in_flight.load(Ordering::Acquire) {
            debug!("Cancelling in-flight biometric attempt");
            self.cancel_requested.store(true, Ordering::Release);
            self.cancel.notify_waiters();
        }
    }

    /// A challenge is currently in flight
    pub fn is_attempt_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Last probed capabilities, `None` before the first probe
    pub async fn get_capabilities(&self) -> Option<BiometricCapabilities> {
        self.state.read().await.capabilities.clone()
    }

    /// Copy of the current settings
    pub async fn get_settings(&self) -> BiometricSettings {
        self.state.read().await.settings.clone()
    }

    /// Lockout state at the current time
    pub async fn get_lockout_status(&self) -> LockoutStatus {
        let state = self.state.read().await;
        self.config
            .policy
            .lockout_status(&state.settings, self.clock.now())
    }

    /// Current consecutive failure count
    pub async fn get_failure_count(&self) -> u32 {
        self.state.read().await.settings.failure_count
    }

    /// Human-readable lockout description
    pub async fn lockout_description(&self) -> String {
        let state = self.state.read().await;
        self.config.policy.describe(&state.settings, self.clock.now())
    }

    /// Configuration in use
    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    fn begin_attempt(&self) -> Option<AttemptGuard<'_>> {
        self.in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| {
                self.cancel_requested.store(false, Ordering::Release);
                AttemptGuard {
                    flag: &self.in_flight,
                }
            })
    }

    async fn ensure_initialized(&self) -> BiometricCapabilities {
        let cached = self.state.read().await.capabilities.clone();
        match cached {
            Some(capabilities) => capabilities,
            None => self.initialize().await,
        }
    }

    /// Run the platform challenge, honouring cancellation and the timeout
    async fn run_challenge(&self, options: &PromptOptions) -> Result<Option<Modality>, AuthErrorKind> {
        let cancelled = self.cancel.notified();
        tokio::pin!(cancelled);
        // Registered before the flag is read, so no cancel falls in between
        cancelled.as_mut().enable();
        if self.cancel_requested.load(Ordering::Acquire) {
            info!("Biometric attempt cancelled before the challenge");
            return Err(AuthErrorKind::SystemCancel);
        }

        let challenge = async {
            match self.config.challenge_timeout {
                Some(limit) => match tokio::time::timeout(limit, self.platform.challenge(options)).await {
                    Ok(response) => Some(response),
                    Err(_) => None,
                },
                None => Some(self.platform.challenge(options).await),
            }
        };

        tokio::select! {
            response = challenge => match response {
                Some(Ok(response)) => response.outcome(),
                Some(Err(e)) => {
                    warn!("Biometric challenge failed: {}", e);
                    Err(AuthErrorKind::UnexpectedError)
                }
                None => {
                    warn!("Biometric challenge timed out");
                    Err(AuthErrorKind::SystemCancel)
                }
            },
            _ = cancelled => {
                info!("Biometric challenge cancelled");
                Err(AuthErrorKind::SystemCancel)
            }
        }
    }

    /// Replace the settings and write them through
    async fn commit(&self, state: &mut ManagerState, next: BiometricSettings) {
        state.settings = next;
        let ok = self.settings.save(&state.settings).await;
        state.dirty = !ok;
    }

    fn finish(&self, result: BiometricAuthResult) -> BiometricAuthResult {
        let event = match result.error {
            None => FeedbackEvent::Success,
            Some(kind) => FeedbackEvent::for_error(kind),
        };
        self.feedback.notify(event);
        result
    }
}

fn fallback_result(kind: AuthErrorKind) -> BiometricAuthResult {
    let result = BiometricAuthResult::failure(kind);
    if kind == AuthErrorKind::UserFallback {
        result.with_warning(FALLBACK_WARNING)
    } else {
        result
    }
}
