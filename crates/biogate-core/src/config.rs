//! Authenticator configuration

use std::time::Duration;

use crate::policy::LockoutPolicy;
use crate::types::PromptOptions;

/// Authenticator configuration
#[derive(Clone, Debug)]
pub struct ManagerConfig {
    /// Failure threshold and lockout duration
    pub policy: LockoutPolicy,

    /// Resolve a challenge as `system_cancel` if the platform has not
    /// answered within this time
    pub challenge_timeout: Option<Duration>,

    /// Reset failure count and lockout when biometric login is disabled
    pub clear_history_on_disable: bool,

    /// Prompt used by the enrollment challenge
    pub enrollment_prompt: PromptOptions,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            policy: LockoutPolicy::default(),
            challenge_timeout: None,
            clear_history_on_disable: false,
            enrollment_prompt: PromptOptions::with_message("Confirm your identity to enable biometric login"),
        }
    }
}

impl ManagerConfig {
    /// Config with a custom lockout policy
    pub fn with_policy(policy: LockoutPolicy) -> Self {
        Self {
            policy,
            ..Default::default()
        }
    }

    /// Set the challenge timeout
    pub fn challenge_timeout(mut self, timeout: Duration) -> Self {
        self.challenge_timeout = Some(timeout);
        self
    }

    /// Set whether disabling clears failure history
    pub fn clear_history_on_disable(mut self, clear: bool) -> Self {
        self.clear_history_on_disable = clear;
        self
    }
}
