//! Failure counting and timed lockout
//!
//! The policy is a set of pure functions over [`BiometricSettings`] and the
//! time of the attempt:
//!
//! - The policy's `max_failures` is authoritative; every transition writes
//!   it into the record
//! - Counted failures increment `failure_count` up to `max_failures`
//! - Reaching `max_failures` locks attempts out for `lockout_duration`
//! - Expiry is evaluated lazily at the next attempt, no timer is involved
//! - Expiry does not reset `failure_count`; only a success does, so a failed
//!   attempt after expiry locks out again immediately
//! - Cancellations never touch the counter

use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::types::{
    duration_to_millis, AuthErrorKind, BiometricSettings, LockoutStatus, DEFAULT_LOCKOUT_DURATION,
    DEFAULT_MAX_FAILURES,
};

/// Longest lockout a policy will apply
pub const MAX_LOCKOUT_DURATION: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

/// Lockout policy
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LockoutPolicy {
    /// Failures before lockout
    pub max_failures: u32,
    /// How long attempts are refused once the threshold is reached
    pub lockout_duration: Duration,
}

impl Default for LockoutPolicy {
    fn default() -> Self {
        Self {
            max_failures: DEFAULT_MAX_FAILURES,
            lockout_duration: DEFAULT_LOCKOUT_DURATION,
        }
    }
}

/// Position of a settings record in the lockout state machine
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PolicyState {
    /// Biometric login is off
    Disabled,
    /// Enabled and accepting attempts
    Clear,
    /// Enabled but refusing attempts until the given instant
    Locked { until: DateTime<Utc> },
}

/// Whether an attempt may reach the platform challenge
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AttemptDecision {
    Permit,
    Refuse { remaining: Duration },
}

impl LockoutPolicy {
    /// Create a policy with a custom threshold and duration
    ///
    /// The duration is capped at [`MAX_LOCKOUT_DURATION`].
    pub fn new(max_failures: u32, lockout_duration: Duration) -> Self {
        Self {
            max_failures: max_failures.max(1),
            lockout_duration: lockout_duration.min(MAX_LOCKOUT_DURATION),
        }
    }

    /// Fewer attempts, longer lockout
    pub fn strict() -> Self {
        Self::new(3, Duration::from_secs(15 * 60))
    }

    /// More attempts, shorter lockout
    pub fn lenient() -> Self {
        Self::new(10, Duration::from_secs(60))
    }

    /// Fresh settings record carrying this policy's threshold
    pub fn default_settings(&self) -> BiometricSettings {
        BiometricSettings::with_max_failures(self.max_failures)
    }

    /// Classify a settings record at `now`
    pub fn state(&self, settings: &BiometricSettings, now: DateTime<Utc>) -> PolicyState {
        if !settings.enabled {
            return PolicyState::Disabled;
        }
        match settings.lockout_until {
            Some(until) if until > now => PolicyState::Locked { until },
            _ => PolicyState::Clear,
        }
    }

    /// Remaining lockout at `now`, if any
    ///
    /// A lockout ends exactly at `lockout_until`.
    pub fn lockout_remaining(
        &self,
        settings: &BiometricSettings,
        now: DateTime<Utc>,
    ) -> Option<Duration> {
        settings
            .lockout_until
            .filter(|until| *until > now)
            .map(|until| (until - now).to_std().unwrap_or(Duration::ZERO))
    }

    /// Decide whether an attempt may proceed to the platform
    pub fn check_attempt(&self, settings: &BiometricSettings, now: DateTime<Utc>) -> AttemptDecision {
        match self.lockout_remaining(settings, now) {
            Some(remaining) => AttemptDecision::Refuse { remaining },
            None => AttemptDecision::Permit,
        }
    }

    /// Lockout status for display
    pub fn lockout_status(&self, settings: &BiometricSettings, now: DateTime<Utc>) -> LockoutStatus {
        match self.lockout_remaining(settings, now) {
            Some(remaining) => LockoutStatus {
                is_locked_out: true,
                time_remaining_ms: duration_to_millis(remaining),
            },
            None => LockoutStatus::default(),
        }
    }

    /// Settings after a successful attempt
    pub fn record_success(&self, settings: &BiometricSettings, now: DateTime<Utc>) -> BiometricSettings {
        BiometricSettings {
            failure_count: 0,
            max_failures: self.threshold(),
            lockout_until: None,
            last_used: Some(now),
            ..settings.clone()
        }
    }

    /// Settings after a counted failure
    pub fn record_failure(&self, settings: &BiometricSettings, now: DateTime<Utc>) -> BiometricSettings {
        let max_failures = self.threshold();
        let failure_count = settings.failure_count.saturating_add(1).min(max_failures);

        let lockout_until = if failure_count >= max_failures {
            Some(self.lockout_deadline(now))
        } else {
            settings.lockout_until
        };

        BiometricSettings {
            failure_count,
            max_failures,
            lockout_until,
            ..settings.clone()
        }
    }

    /// Settings after the enrollment challenge succeeded
    pub fn record_enrollment(
        &self,
        settings: &BiometricSettings,
        now: DateTime<Utc>,
    ) -> BiometricSettings {
        BiometricSettings {
            enabled: true,
            enrollment_date: Some(now),
            last_used: Some(now),
            failure_count: 0,
            max_failures: self.threshold(),
            lockout_until: None,
            ..settings.clone()
        }
    }

    /// Settings after the user turned biometric login off
    ///
    /// Failure history is kept unless `clear_history` is set.
    pub fn record_disable(&self, settings: &BiometricSettings, clear_history: bool) -> BiometricSettings {
        let mut next = BiometricSettings {
            enabled: false,
            ..settings.clone()
        };
        if clear_history {
            next.failure_count = 0;
            next.lockout_until = None;
        }
        next
    }

    /// Settings after a platform outcome, or `None` when the outcome leaves
    /// the record untouched
    pub fn apply_outcome(
        &self,
        settings: &BiometricSettings,
        outcome: Result<(), AuthErrorKind>,
        now: DateTime<Utc>,
    ) -> Option<BiometricSettings> {
        match outcome {
            Ok(()) => Some(self.record_success(settings, now)),
            Err(kind) if kind.is_counted() => Some(self.record_failure(settings, now)),
            Err(_) => None,
        }
    }

    /// Human-readable description of the lockout state
    pub fn describe(&self, settings: &BiometricSettings, now: DateTime<Utc>) -> String {
        if let Some(remaining) = self.lockout_remaining(settings, now) {
            let secs = remaining.as_secs().max(1);
            if secs < 60 {
                format!("Locked for {} seconds", secs)
            } else if secs < 3600 {
                format!("Locked for {} minutes", secs.div_ceil(60))
            } else {
                format!("Locked for {} hours", secs.div_ceil(3600))
            }
        } else {
            format!(
                "{} attempts remaining",
                self.threshold().saturating_sub(settings.failure_count)
            )
        }
    }

    fn threshold(&self) -> u32 {
        self.max_failures.max(1)
    }

    /// End of a lockout starting at `now`, saturating at the latest
    /// representable instant
    fn lockout_deadline(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        chrono::Duration::from_std(self.lockout_duration)
            .ok()
            .and_then(|duration| now.checked_add_signed(duration))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn enabled() -> BiometricSettings {
        BiometricSettings {
            enabled: true,
            ..Default::default()
        }
    }

    fn fail_times(policy: &LockoutPolicy, mut settings: BiometricSettings, n: u32, now: DateTime<Utc>) -> BiometricSettings {
        for _ in 0..n {
            settings = policy.record_failure(&settings, now);
        }
        settings
    }

    #[test]
    fn test_default_policy() {
        let policy = LockoutPolicy::default();
        assert_eq!(policy.max_failures, 5);
        assert_eq!(policy.lockout_duration.as_secs(), 300);
    }

    #[test]
    fn test_state_disabled() {
        let policy = LockoutPolicy::default();
        let now = Utc::now();
        assert_eq!(policy.state(&BiometricSettings::default(), now), PolicyState::Disabled);
        assert_eq!(policy.state(&enabled(), now), PolicyState::Clear);
    }

    #[test]
    fn test_no_lockout_below_threshold() {
        let policy = LockoutPolicy::default();
        let now = Utc::now();
        let settings = fail_times(&policy, enabled(), 4, now);

        assert_eq!(settings.failure_count, 4);
        assert!(settings.lockout_until.is_none());
        assert_eq!(policy.check_attempt(&settings, now), AttemptDecision::Permit);
    }

    #[test]
    fn test_lockout_at_threshold() {
        let policy = LockoutPolicy::default();
        let now = Utc::now();
        let settings = fail_times(&policy, enabled(), 5, now);

        assert_eq!(settings.failure_count, 5);
        assert_eq!(settings.lockout_until, Some(now + chrono::Duration::minutes(5)));
        assert_eq!(
            policy.check_attempt(&settings, now),
            AttemptDecision::Refuse {
                remaining: Duration::from_secs(300)
            }
        );
        assert!(matches!(policy.state(&settings, now), PolicyState::Locked { .. }));
    }

    #[test]
    fn test_failure_count_never_exceeds_max() {
        let policy = LockoutPolicy::default();
        let now = Utc::now();
        let settings = fail_times(&policy, enabled(), 12, now);
        assert_eq!(settings.failure_count, settings.max_failures);
    }

    #[test]
    fn test_lockout_ends_exactly_at_deadline() {
        let policy = LockoutPolicy::default();
        let now = Utc::now();
        let settings = fail_times(&policy, enabled(), 5, now);
        let until = settings.lockout_until.unwrap();

        assert!(policy.lockout_remaining(&settings, until - chrono::Duration::milliseconds(1)).is_some());
        assert_eq!(policy.check_attempt(&settings, until), AttemptDecision::Permit);
        assert_eq!(policy.state(&settings, until), PolicyState::Clear);
    }

    #[test]
    fn test_failure_after_expiry_relocks() {
        let policy = LockoutPolicy::default();
        let now = Utc::now();
        let settings = fail_times(&policy, enabled(), 5, now);
        let expired = settings.lockout_until.unwrap();

        let settings = policy.record_failure(&settings, expired);
        assert_eq!(settings.failure_count, 5);
        assert_eq!(settings.lockout_until, Some(expired + chrono::Duration::minutes(5)));
    }

    #[test]
    fn test_success_resets() {
        let policy = LockoutPolicy::default();
        let now = Utc::now();
        let settings = fail_times(&policy, enabled(), 3, now);

        let later = now + chrono::Duration::seconds(10);
        let settings = policy.record_success(&settings, later);
        assert_eq!(settings.failure_count, 0);
        assert!(settings.lockout_until.is_none());
        assert_eq!(settings.last_used, Some(later));
    }

    #[test]
    fn test_cancellations_leave_settings_untouched() {
        let policy = LockoutPolicy::default();
        let now = Utc::now();
        let settings = fail_times(&policy, enabled(), 3, now);

        for kind in [
            AuthErrorKind::UserCancel,
            AuthErrorKind::SystemCancel,
            AuthErrorKind::UserFallback,
        ] {
            assert!(policy.apply_outcome(&settings, Err(kind), now).is_none());
        }
    }

    #[test]
    fn test_unexpected_error_counts() {
        let policy = LockoutPolicy::default();
        let now = Utc::now();
        let next = policy
            .apply_outcome(&enabled(), Err(AuthErrorKind::UnexpectedError), now)
            .unwrap();
        assert_eq!(next.failure_count, 1);
    }

    #[test]
    fn test_enrollment_clears_history() {
        let policy = LockoutPolicy::default();
        let now = Utc::now();
        let mut settings = fail_times(&policy, enabled(), 5, now);
        settings.enabled = false;

        let settings = policy.record_enrollment(&settings, now);
        assert!(settings.enabled);
        assert_eq!(settings.failure_count, 0);
        assert!(settings.lockout_until.is_none());
        assert_eq!(settings.enrollment_date, Some(now));
        assert_eq!(settings.last_used, Some(now));
    }

    #[test]
    fn test_disable_keeps_history_by_default() {
        let policy = LockoutPolicy::default();
        let now = Utc::now();
        let settings = fail_times(&policy, enabled(), 5, now);

        let kept = policy.record_disable(&settings, false);
        assert!(!kept.enabled);
        assert_eq!(kept.failure_count, 5);
        assert!(kept.lockout_until.is_some());

        let cleared = policy.record_disable(&settings, true);
        assert_eq!(cleared.failure_count, 0);
        assert!(cleared.lockout_until.is_none());
    }

    #[test]
    fn test_policy_threshold_overrides_record() {
        let policy = LockoutPolicy::new(2, Duration::from_secs(60));
        let now = Utc::now();

        // Record written under the default threshold of 5
        let settings = fail_times(&policy, enabled(), 2, now);
        assert_eq!(settings.max_failures, 2);
        assert_eq!(settings.lockout_until, Some(now + chrono::Duration::seconds(60)));

        let reenrolled = policy.record_enrollment(&enabled(), now);
        assert_eq!(reenrolled.max_failures, 2);
        assert_eq!(policy.describe(&reenrolled, now), "2 attempts remaining");
    }

    #[test]
    fn test_new_caps_lockout_duration() {
        let policy = LockoutPolicy::new(1, Duration::from_secs(u64::MAX));
        assert_eq!(policy.lockout_duration, MAX_LOCKOUT_DURATION);

        let now = Utc::now();
        let settings = policy.record_failure(&enabled(), now);
        let remaining = policy.lockout_remaining(&settings, now).unwrap();
        assert_eq!(remaining, MAX_LOCKOUT_DURATION);
    }

    #[test]
    fn test_oversized_duration_saturates() {
        let policy = LockoutPolicy {
            max_failures: 1,
            lockout_duration: Duration::from_secs(u64::MAX),
        };
        let now = Utc::now();

        let settings = policy.record_failure(&enabled(), now);
        assert_eq!(settings.lockout_until, Some(DateTime::<Utc>::MAX_UTC));
        assert!(matches!(policy.check_attempt(&settings, now), AttemptDecision::Refuse { .. }));
    }

    #[test]
    fn test_describe() {
        let policy = LockoutPolicy::default();
        let now = Utc::now();
        assert_eq!(policy.describe(&enabled(), now), "5 attempts remaining");

        let locked = fail_times(&policy, enabled(), 5, now);
        assert_eq!(policy.describe(&locked, now), "Locked for 5 minutes");
        assert_eq!(
            policy.describe(&locked, now + chrono::Duration::seconds(270)),
            "Locked for 30 seconds"
        );
    }

    #[test]
    fn test_strict_and_lenient() {
        assert!(LockoutPolicy::strict().max_failures < LockoutPolicy::default().max_failures);
        assert!(LockoutPolicy::lenient().max_failures > LockoutPolicy::default().max_failures);
    }
}
