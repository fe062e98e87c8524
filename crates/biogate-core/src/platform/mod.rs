//! Platform biometric API abstraction
//!
//! The sensor is a black box: it reports what it supports and runs a
//! challenge that either succeeds or fails with a platform error code.
//! Everything else lives in the authenticator.

pub mod simulated;

pub use simulated::SimulatedPlatform;

use async_trait::async_trait;
use tracing::warn;

use crate::error::Result;
use crate::types::{AuthErrorKind, BiometricCapabilities, Modality, PromptOptions};

/// Platform error code for a user dismissal
pub const CODE_USER_CANCEL: &str = "user_cancel";
/// Platform error code for an OS dismissal
pub const CODE_SYSTEM_CANCEL: &str = "system_cancel";
/// Platform error code for an app-initiated dismissal
pub const CODE_APP_CANCEL: &str = "app_cancel";
/// Platform error code for choosing the passcode instead
pub const CODE_USER_FALLBACK: &str = "user_fallback";
/// Platform error code for a biometric mismatch
pub const CODE_AUTHENTICATION_FAILED: &str = "authentication_failed";

/// What the platform reported for one challenge
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChallengeResponse {
    /// The biometric matched
    Success { modality: Option<Modality> },
    /// The challenge ended without a match
    Failure { code: String },
}

impl ChallengeResponse {
    /// Success with an unspecified modality
    pub fn success() -> Self {
        ChallengeResponse::Success { modality: None }
    }

    /// Failure with the given platform code
    pub fn failure(code: impl Into<String>) -> Self {
        ChallengeResponse::Failure { code: code.into() }
    }

    /// Map to the result taxonomy
    pub fn outcome(&self) -> std::result::Result<Option<Modality>, AuthErrorKind> {
        match self {
            ChallengeResponse::Success { modality } => Ok(*modality),
            ChallengeResponse::Failure { code } => Err(classify_error_code(code)),
        }
    }
}

/// Map a platform error code to an error kind
///
/// Unknown codes count as a mismatch.
pub fn classify_error_code(code: &str) -> AuthErrorKind {
    match code {
        CODE_USER_CANCEL => AuthErrorKind::UserCancel,
        CODE_SYSTEM_CANCEL | CODE_APP_CANCEL => AuthErrorKind::SystemCancel,
        CODE_USER_FALLBACK => AuthErrorKind::UserFallback,
        CODE_AUTHENTICATION_FAILED => AuthErrorKind::AuthenticationFailed,
        other => {
            warn!("Unmapped platform error code {:?}, counting as failure", other);
            AuthErrorKind::AuthenticationFailed
        }
    }
}

/// Device biometric capability and challenge API
#[async_trait]
pub trait BiometricPlatform: Send + Sync {
    /// Query hardware, enrollment, modalities and security level
    ///
    /// Absence of hardware is a valid `Ok` value. `Err` is reserved for
    /// genuine platform failures.
    async fn probe_capabilities(&self) -> Result<BiometricCapabilities>;

    /// Run one biometric challenge with the given prompt
    async fn challenge(&self, options: &PromptOptions) -> Result<ChallengeResponse>;
}
