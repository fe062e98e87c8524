//! Settings persistence
//!
//! The settings record lives under one fixed key as JSON. Loading never
//! fails: a missing, unreadable or malformed record yields defaults. Saving
//! is best-effort: failures are logged and the in-memory copy stays
//! authoritative until the next successful save.
//!
//! The failure threshold belongs to the repository, not to the record. A
//! stored `maxFailures` is overwritten with the configured one on load.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::store::KeyValueStore;
use crate::types::{BiometricSettings, DEFAULT_MAX_FAILURES};

/// Storage key of the settings record
pub const SETTINGS_KEY: &str = "biometric_settings";

/// Loads and saves the settings record
pub struct SettingsRepository {
    store: Arc<dyn KeyValueStore>,
    max_failures: u32,
}

impl SettingsRepository {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self::with_max_failures(store, DEFAULT_MAX_FAILURES)
    }

    /// Repository enforcing a custom failure threshold
    pub fn with_max_failures(store: Arc<dyn KeyValueStore>, max_failures: u32) -> Self {
        Self {
            store,
            max_failures: max_failures.max(1),
        }
    }

    /// Settings used when nothing usable is stored
    pub fn defaults(&self) -> BiometricSettings {
        BiometricSettings::with_max_failures(self.max_failures)
    }

    /// Read the stored record, falling back to defaults
    pub async fn load(&self) -> BiometricSettings {
        let raw = match self.store.get(SETTINGS_KEY).await {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                debug!("No stored biometric settings, using defaults");
                return self.defaults();
            }
            Err(e) => {
                warn!("Failed to load biometric settings: {}", e);
                return self.defaults();
            }
        };

        match serde_json::from_str::<BiometricSettings>(&raw) {
            Ok(mut settings) => {
                if settings.max_failures != self.max_failures {
                    info!(
                        stored = settings.max_failures,
                        configured = self.max_failures,
                        "Applying configured failure threshold to stored settings"
                    );
                }
                if settings.sanitize(self.max_failures) {
                    debug!(
                        failure_count = settings.failure_count,
                        "Stored biometric settings adjusted"
                    );
                }
                settings
            }
            Err(e) => {
                warn!("Stored biometric settings are malformed: {}", e);
                self.defaults()
            }
        }
    }

    /// Persist the record; failures are logged and swallowed
    ///
    /// Returns whether the write reached the store.
    pub async fn save(&self, settings: &BiometricSettings) -> bool {
        let contents = match serde_json::to_string(settings) {
            Ok(contents) => contents,
            Err(e) => {
                warn!("Failed to serialize biometric settings: {}", e);
                return false;
            }
        };

        match self.store.set(SETTINGS_KEY, &contents).await {
            Ok(()) => {
                debug!(
                    enabled = settings.enabled,
                    failure_count = settings.failure_count,
                    "Saved biometric settings"
                );
                true
            }
            Err(e) => {
                warn!("Failed to save biometric settings: {}", e);
                false
            }
        }
    }
}
