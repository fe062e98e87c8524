//! Core data model shared by the prober, policy and authenticator

use std::collections::BTreeSet;
use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Default number of consecutive failures before lockout
pub const DEFAULT_MAX_FAILURES: u32 = 5;

/// Default lockout duration (5 minutes)
pub const DEFAULT_LOCKOUT_DURATION: Duration = Duration::from_secs(5 * 60);

/// A specific biometric method
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Modality {
    Fingerprint,
    FacialRecognition,
    Iris,
}

impl fmt::Display for Modality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Modality::Fingerprint => write!(f, "fingerprint"),
            Modality::FacialRecognition => write!(f, "facial recognition"),
            Modality::Iris => write!(f, "iris"),
        }
    }
}

/// Strength of the device's biometric enrollment
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SecurityLevel {
    #[default]
    None,
    Weak,
    Strong,
}

/// Snapshot of what the device supports right now
///
/// Never persisted. Recomputed on every `initialize()`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BiometricCapabilities {
    /// Sensor hardware is present
    pub has_hardware: bool,
    /// At least one biometric is enrolled at the OS level
    pub is_enrolled: bool,
    /// Modalities the device reports
    pub supported_types: BTreeSet<Modality>,
    /// Security level of the enrolled biometrics
    pub security_level: SecurityLevel,
}

impl BiometricCapabilities {
    /// Capabilities of a device with nothing available
    pub fn unavailable() -> Self {
        Self::default()
    }

    /// Biometric authentication can be attempted on this device
    pub fn is_available(&self) -> bool {
        self.has_hardware && self.is_enrolled
    }

    /// Preferred modality to report in results
    ///
    /// Ranked by declaration order: iris, then face, then fingerprint.
    pub fn primary_modality(&self) -> Option<Modality> {
        self.supported_types.iter().next_back().copied()
    }
}

/// Durable biometric login settings
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BiometricSettings {
    /// Biometric login is enabled by the user
    #[serde(default)]
    pub enabled: bool,

    /// When biometric login was last enabled
    #[serde(default)]
    pub enrollment_date: Option<DateTime<Utc>>,

    /// When a biometric authentication last succeeded
    #[serde(default)]
    pub last_used: Option<DateTime<Utc>>,

    /// Consecutive counted failures
    #[serde(default)]
    pub failure_count: u32,

    /// Failures before lockout
    #[serde(default = "default_max_failures")]
    pub max_failures: u32,

    /// Attempts are refused until this instant
    #[serde(default)]
    pub lockout_until: Option<DateTime<Utc>>,
}

fn default_max_failures() -> u32 {
    DEFAULT_MAX_FAILURES
}

impl Default for BiometricSettings {
    fn default() -> Self {
        Self::with_max_failures(DEFAULT_MAX_FAILURES)
    }
}

impl BiometricSettings {
    /// Fresh settings with a custom failure threshold
    pub fn with_max_failures(max_failures: u32) -> Self {
        Self {
            enabled: false,
            enrollment_date: None,
            last_used: None,
            failure_count: 0,
            max_failures: max_failures.max(1),
            lockout_until: None,
        }
    }

    /// Bring a record read from storage in line with the active threshold
    ///
    /// The threshold always comes from the policy in force, never from the
    /// stored record; `failure_count` is clamped to it. Returns true if
    /// anything was changed.
    pub fn sanitize(&mut self, max_failures: u32) -> bool {
        let max_failures = max_failures.max(1);
        let mut changed = false;
        if self.max_failures != max_failures {
            self.max_failures = max_failures;
            changed = true;
        }
        if self.failure_count > self.max_failures {
            self.failure_count = self.max_failures;
            changed = true;
        }
        changed
    }
}

/// Result error taxonomy
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthErrorKind {
    /// No sensor or nothing enrolled
    HardwareUnavailable,
    /// Biometric login not enabled by the user
    FeatureDisabled,
    /// Too many recent failures
    LockedOut,
    /// User dismissed the prompt
    UserCancel,
    /// OS dismissed the prompt
    SystemCancel,
    /// User chose the device passcode instead
    UserFallback,
    /// Genuine biometric mismatch
    AuthenticationFailed,
    /// Uncategorized platform failure
    UnexpectedError,
    /// Another attempt is already in flight
    Busy,
}

impl AuthErrorKind {
    /// Outcome advances the failure counter
    pub fn is_counted(&self) -> bool {
        matches!(
            self,
            AuthErrorKind::AuthenticationFailed | AuthErrorKind::UnexpectedError
        )
    }

    /// Outcome is a benign abort
    pub fn is_cancellation(&self) -> bool {
        matches!(
            self,
            AuthErrorKind::UserCancel | AuthErrorKind::SystemCancel | AuthErrorKind::UserFallback
        )
    }

    /// Stable wire name
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthErrorKind::HardwareUnavailable => "hardware_unavailable",
            AuthErrorKind::FeatureDisabled => "feature_disabled",
            AuthErrorKind::LockedOut => "locked_out",
            AuthErrorKind::UserCancel => "user_cancel",
            AuthErrorKind::SystemCancel => "system_cancel",
            AuthErrorKind::UserFallback => "user_fallback",
            AuthErrorKind::AuthenticationFailed => "authentication_failed",
            AuthErrorKind::UnexpectedError => "unexpected_error",
            AuthErrorKind::Busy => "busy",
        }
    }
}

impl fmt::Display for AuthErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one `authenticate` or `enable_biometric_auth` call
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BiometricAuthResult {
    pub success: bool,
    pub error: Option<AuthErrorKind>,
    pub warning: Option<String>,
    pub biometric_type: Option<Modality>,
    /// Remaining lockout, only set for `locked_out`
    pub time_remaining_ms: Option<u64>,
}

impl BiometricAuthResult {
    /// Successful authentication
    pub fn success(biometric_type: Option<Modality>) -> Self {
        Self {
            success: true,
            error: None,
            warning: None,
            biometric_type,
            time_remaining_ms: None,
        }
    }

    /// Failed authentication with the given kind
    pub fn failure(kind: AuthErrorKind) -> Self {
        Self {
            success: false,
            error: Some(kind),
            warning: None,
            biometric_type: None,
            time_remaining_ms: None,
        }
    }

    /// Refusal because of an active lockout
    pub fn locked_out(remaining: Duration) -> Self {
        Self {
            time_remaining_ms: Some(duration_to_millis(remaining)),
            ..Self::failure(AuthErrorKind::LockedOut)
        }
    }

    /// Attach a soft warning
    pub fn with_warning(mut self, warning: impl Into<String>) -> Self {
        self.warning = Some(warning.into());
        self
    }
}

/// Lockout state as seen by the UI
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LockoutStatus {
    pub is_locked_out: bool,
    pub time_remaining_ms: u64,
}

/// Labels and flags passed to the platform challenge
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptOptions {
    pub prompt_message: String,
    pub cancel_label: String,
    pub fallback_label: String,
    /// Forbid the device passcode as an alternative
    pub disable_device_fallback: bool,
}

impl Default for PromptOptions {
    fn default() -> Self {
        Self {
            prompt_message: "Authenticate to continue".to_string(),
            cancel_label: "Cancel".to_string(),
            fallback_label: "Use Passcode".to_string(),
            disable_device_fallback: false,
        }
    }
}

impl PromptOptions {
    /// Prompt with a custom message and default labels
    pub fn with_message(message: impl Into<String>) -> Self {
        Self {
            prompt_message: message.into(),
            ..Default::default()
        }
    }
}

pub(crate) fn duration_to_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capabilities_availability() {
        let mut caps = BiometricCapabilities::unavailable();
        assert!(!caps.is_available());

        caps.has_hardware = true;
        assert!(!caps.is_available());

        caps.is_enrolled = true;
        assert!(caps.is_available());
    }

    #[test]
    fn test_primary_modality_prefers_face() {
        let caps = BiometricCapabilities {
            has_hardware: true,
            is_enrolled: true,
            supported_types: [Modality::Fingerprint, Modality::FacialRecognition]
                .into_iter()
                .collect(),
            security_level: SecurityLevel::Strong,
        };
        assert_eq!(caps.primary_modality(), Some(Modality::FacialRecognition));
    }

    #[test]
    fn test_settings_defaults() {
        let settings = BiometricSettings::default();
        assert!(!settings.enabled);
        assert_eq!(settings.failure_count, 0);
        assert_eq!(settings.max_failures, DEFAULT_MAX_FAILURES);
        assert!(settings.lockout_until.is_none());
    }

    #[test]
    fn test_settings_sanitize() {
        let mut settings = BiometricSettings {
            failure_count: 9,
            max_failures: 0,
            ..Default::default()
        };
        assert!(settings.sanitize(5));
        assert_eq!(settings.max_failures, 5);
        assert_eq!(settings.failure_count, 5);

        assert!(!settings.sanitize(5));
    }

    #[test]
    fn test_settings_sanitize_applies_active_threshold() {
        let mut settings = BiometricSettings {
            enabled: true,
            failure_count: 4,
            ..Default::default()
        };
        assert!(settings.sanitize(2));
        assert_eq!(settings.max_failures, 2);
        assert_eq!(settings.failure_count, 2);

        assert!(settings.sanitize(10));
        assert_eq!(settings.max_failures, 10);
        assert_eq!(settings.failure_count, 2);
    }

    #[test]
    fn test_settings_missing_fields_use_defaults() {
        let settings: BiometricSettings = serde_json::from_str(r#"{"enabled":true}"#).unwrap();
        assert!(settings.enabled);
        assert_eq!(settings.max_failures, DEFAULT_MAX_FAILURES);
        assert_eq!(settings.failure_count, 0);
    }

    #[test]
    fn test_error_kind_counting() {
        assert!(AuthErrorKind::AuthenticationFailed.is_counted());
        assert!(AuthErrorKind::UnexpectedError.is_counted());
        assert!(!AuthErrorKind::UserCancel.is_counted());
        assert!(!AuthErrorKind::SystemCancel.is_counted());
        assert!(!AuthErrorKind::UserFallback.is_counted());
        assert!(AuthErrorKind::UserFallback.is_cancellation());
    }

    #[test]
    fn test_error_kind_wire_names() {
        let json = serde_json::to_string(&AuthErrorKind::HardwareUnavailable).unwrap();
        assert_eq!(json, "\"hardware_unavailable\"");
        assert_eq!(AuthErrorKind::LockedOut.to_string(), "locked_out");
    }

    #[test]
    fn test_locked_out_result_carries_remaining() {
        let result = BiometricAuthResult::locked_out(Duration::from_secs(300));
        assert!(!result.success);
        assert_eq!(result.error, Some(AuthErrorKind::LockedOut));
        assert_eq!(result.time_remaining_ms, Some(300_000));
    }
}
