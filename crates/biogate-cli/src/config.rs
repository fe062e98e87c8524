//! CLI configuration
//!
//! Loaded from `$BIOGATE_CONFIG`, or `config.json` under the user config
//! directory. A missing or unreadable file falls back to defaults.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use biogate_core::{LockoutPolicy, ManagerConfig};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Environment variable overriding the config file location
pub const CONFIG_ENV_VAR: &str = "BIOGATE_CONFIG";

/// Configuration file name
const CONFIG_FILE_NAME: &str = "config.json";

/// Directory name under the user config and data directories
const APP_DIR_NAME: &str = "biogate";

/// Persistent CLI configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CliConfig {
    /// Where settings and the vault are kept
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Failures before lockout
    #[serde(default = "default_max_failures")]
    pub max_failures: u32,

    /// Lockout duration in seconds
    #[serde(default = "default_lockout_secs")]
    pub lockout_secs: u64,

    /// Give up on a challenge after this many seconds
    #[serde(default)]
    pub challenge_timeout_secs: Option<u64>,

    /// Reset failure history when biometric login is disabled
    #[serde(default)]
    pub clear_history_on_disable: bool,
}

fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR_NAME)
}

fn default_max_failures() -> u32 {
    LockoutPolicy::default().max_failures
}

fn default_lockout_secs() -> u64 {
    LockoutPolicy::default().lockout_duration.as_secs()
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            max_failures: default_max_failures(),
            lockout_secs: default_lockout_secs(),
            challenge_timeout_secs: None,
            clear_history_on_disable: false,
        }
    }
}

impl CliConfig {
    /// Config file location
    pub fn default_path() -> Option<PathBuf> {
        if let Some(path) = std::env::var_os(CONFIG_ENV_VAR) {
            return Some(PathBuf::from(path));
        }
        dirs::config_dir().map(|d| d.join(APP_DIR_NAME).join(CONFIG_FILE_NAME))
    }

    /// Load configuration from `path`
    ///
    /// Returns the defaults if the file doesn't exist or can't be parsed.
    pub fn load(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }

        match fs::read_to_string(path) {
            Ok(contents) => serde_json::from_str(&contents).unwrap_or_else(|e| {
                warn!("Failed to parse config file {:?}: {}", path, e);
                Self::default()
            }),
            Err(e) => {
                warn!("Failed to read config file {:?}: {}", path, e);
                Self::default()
            }
        }
    }

    /// Settings file inside the data directory
    pub fn settings_path(&self) -> PathBuf {
        self.data_dir.join("settings.json")
    }

    /// Vault directory inside the data directory
    pub fn vault_path(&self) -> PathBuf {
        self.data_dir.join("vault")
    }

    /// Manager configuration built from these knobs
    pub fn manager_config(&self) -> ManagerConfig {
        let policy = LockoutPolicy::new(self.max_failures, Duration::from_secs(self.lockout_secs));
        let config = ManagerConfig::with_policy(policy)
            .clear_history_on_disable(self.clear_history_on_disable);

        match self.challenge_timeout_secs {
            Some(secs) => config.challenge_timeout(Duration::from_secs(secs)),
            None => config,
        }
    }
}
