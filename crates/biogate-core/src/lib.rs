//! Biogate - Biometric authentication gate with abuse-resistant lockout
//!
//! This crate decides when a device-biometric authentication attempt may run,
//! counts failures, enforces a timed lockout and manages the login token tied
//! to "biometric login enabled":
//! - Capability probing against the platform sensor
//! - Durable settings with default fallback
//! - Secure token issue and revoke
//! - Pure lockout policy over settings and time
//! - The [`BiometricAuthManager`] that composes them
//!
//! Platform, storage and vault are collaborators behind traits. File-backed
//! and in-memory implementations live in [`store`]; a scripted platform lives
//! in [`platform::simulated`].

pub mod clock;
pub mod config;
pub mod error;
pub mod feedback;
pub mod manager;
pub mod platform;
pub mod policy;
pub mod prober;
pub mod settings;
pub mod store;
pub mod types;
pub mod vault;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::ManagerConfig;
pub use error::{Error, Result};
pub use feedback::{FeedbackEvent, FeedbackSink, NoopFeedback, TracingFeedback};
pub use manager::BiometricAuthManager;
pub use platform::{BiometricPlatform, ChallengeResponse, SimulatedPlatform};
pub use policy::{AttemptDecision, LockoutPolicy, PolicyState};
pub use prober::CapabilityProber;
pub use settings::SettingsRepository;
pub use store::{EncryptedFileVault, FileStore, KeyValueStore, MemoryStore, SecureVault};
pub use types::{
    AuthErrorKind, BiometricAuthResult, BiometricCapabilities, BiometricSettings, LockoutStatus,
    Modality, PromptOptions, SecurityLevel,
};
pub use vault::TokenVault;
