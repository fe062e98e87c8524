//! Scripted platform for tests and the command-line front end
//!
//! Capabilities are fixed at construction. Challenge responses are taken from
//! a queue, falling back to a default response once the queue is empty.
//! Challenges can be held open until [`SimulatedPlatform::release`] is called.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use tokio::sync::Notify;

use super::{BiometricPlatform, ChallengeResponse};
use crate::error::{Error, Result};
use crate::types::{BiometricCapabilities, Modality, PromptOptions, SecurityLevel};

/// Scripted reply to one challenge
#[derive(Clone, Debug)]
pub enum ScriptedChallenge {
    /// Return this response
    Respond(ChallengeResponse),
    /// Fail with a platform error
    Error(String),
}

struct SimulatedState {
    capabilities: std::result::Result<BiometricCapabilities, String>,
    script: VecDeque<ScriptedChallenge>,
    default_reply: ScriptedChallenge,
    hold: bool,
    probe_count: usize,
    challenge_count: usize,
    last_options: Option<PromptOptions>,
}

/// Simulated biometric platform
pub struct SimulatedPlatform {
    state: Mutex<SimulatedState>,
    release: Arc<Notify>,
}

impl SimulatedPlatform {
    /// Platform reporting the given capabilities
    pub fn new(capabilities: BiometricCapabilities) -> Self {
        Self {
            state: Mutex::new(SimulatedState {
                capabilities: Ok(capabilities),
                script: VecDeque::new(),
                default_reply: ScriptedChallenge::Respond(ChallengeResponse::success()),
                hold: false,
                probe_count: 0,
                challenge_count: 0,
                last_options: None,
            }),
            release: Arc::new(Notify::new()),
        }
    }

    /// Enrolled fingerprint sensor
    pub fn available() -> Self {
        Self::new(BiometricCapabilities {
            has_hardware: true,
            is_enrolled: true,
            supported_types: [Modality::Fingerprint].into_iter().collect(),
            security_level: SecurityLevel::Strong,
        })
    }

    /// Device without a sensor
    pub fn no_hardware() -> Self {
        Self::new(BiometricCapabilities::unavailable())
    }

    /// Sensor present but nothing enrolled
    pub fn not_enrolled() -> Self {
        Self::new(BiometricCapabilities {
            has_hardware: true,
            is_enrolled: false,
            supported_types: [Modality::Fingerprint].into_iter().collect(),
            security_level: SecurityLevel::None,
        })
    }

    /// Platform whose capability probe fails
    pub fn probe_failing(message: impl Into<String>) -> Self {
        let platform = Self::no_hardware();
        platform.lock().capabilities = Err(message.into());
        platform
    }

    /// Replace the reported capabilities
    pub fn set_capabilities(&self, capabilities: BiometricCapabilities) {
        self.lock().capabilities = Ok(capabilities);
    }

    /// Queue a response for the next unscripted challenge
    pub fn push_response(&self, response: ChallengeResponse) {
        self.lock()
            .script
            .push_back(ScriptedChallenge::Respond(response));
    }

    /// Queue a platform error for the next unscripted challenge
    pub fn push_error(&self, message: impl Into<String>) {
        self.lock()
            .script
            .push_back(ScriptedChallenge::Error(message.into()));
    }

    /// Response used once the queue is drained
    pub fn set_default_reply(&self, reply: ScriptedChallenge) {
        self.lock().default_reply = reply;
    }

    /// Hold every challenge open until `release` is called
    pub fn set_hold(&self, hold: bool) {
        self.lock().hold = hold;
    }

    /// Let one held challenge complete
    pub fn release(&self) {
        self.release.notify_one();
    }

    /// Number of capability probes served
    pub fn probe_count(&self) -> usize {
        self.lock().probe_count
    }

    /// Number of challenges started
    pub fn challenge_count(&self) -> usize {
        self.lock().challenge_count
    }

    /// Prompt options of the most recent challenge
    pub fn last_options(&self) -> Option<PromptOptions> {
        self.lock().last_options.clone()
    }

    fn lock(&self) -> MutexGuard<'_, SimulatedState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for SimulatedPlatform {
    fn default() -> Self {
        Self::available()
    }
}

#[async_trait]
impl BiometricPlatform for SimulatedPlatform {
    async fn probe_capabilities(&self) -> Result<BiometricCapabilities> {
        let mut state = self.lock();
        state.probe_count += 1;
        state.capabilities.clone().map_err(Error::Platform)
    }

    async fn challenge(&self, options: &PromptOptions) -> Result<ChallengeResponse> {
        let (reply, hold) = {
            let mut state = self.lock();
            state.challenge_count += 1;
            state.last_options = Some(options.clone());
            let reply = match state.script.pop_front() {
                Some(reply) => reply,
                None => state.default_reply.clone(),
            };
            (reply, state.hold)
        };

        if hold {
            let release = Arc::clone(&self.release);
            release.notified().await;
        }

        match reply {
            ScriptedChallenge::Respond(response) => Ok(response),
            ScriptedChallenge::Error(message) => Err(Error::Platform(message)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_script_then_default() {
        let platform = SimulatedPlatform::available();
        platform.push_response(ChallengeResponse::failure("user_cancel"));

        let options = PromptOptions::default();
        let first = platform.challenge(&options).await.unwrap();
        assert_eq!(first, ChallengeResponse::failure("user_cancel"));

        let second = platform.challenge(&options).await.unwrap();
        assert_eq!(second, ChallengeResponse::success());
        assert_eq!(platform.challenge_count(), 2);
    }

    #[tokio::test]
    async fn test_probe_failure() {
        let platform = SimulatedPlatform::probe_failing("sensor offline");
        assert!(platform.probe_capabilities().await.is_err());
        assert_eq!(platform.probe_count(), 1);
    }

    #[tokio::test]
    async fn test_held_challenge_completes_after_release() {
        let platform = Arc::new(SimulatedPlatform::available());
        platform.set_hold(true);

        let task = {
            let platform = Arc::clone(&platform);
            tokio::spawn(async move { platform.challenge(&PromptOptions::default()).await })
        };

        platform.release();
        let response = task.await.unwrap().unwrap();
        assert_eq!(response, ChallengeResponse::success());
    }
}
