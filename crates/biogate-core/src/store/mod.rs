//! Storage collaborators
//!
//! Two stores back the authenticator:
//!
//! - a plain durable key-value store for the settings record
//! - a secure vault for the biometric login token
//!
//! Both are asynchronous and fallible. Adapters above them recover every
//! failure locally.

mod encrypted_vault;
mod file;
mod memory;

pub use encrypted_vault::EncryptedFileVault;
pub use file::FileStore;
pub use memory::MemoryStore;

use async_trait::async_trait;
use zeroize::Zeroizing;

use crate::error::Result;

/// Durable key-value store for non-secret settings
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Read a value, `None` if absent
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Write a value, replacing any previous one
    async fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Remove a value; removing an absent key succeeds
    async fn delete(&self, key: &str) -> Result<()>;
}

/// Isolated storage for secrets
#[async_trait]
pub trait SecureVault: Send + Sync {
    /// Read a secret, `None` if absent
    async fn get_secret(&self, key: &str) -> Result<Option<Zeroizing<String>>>;

    /// Store a secret, replacing any previous one
    async fn set_secret(&self, key: &str, value: &str) -> Result<()>;

    /// Remove a secret; removing an absent key succeeds
    async fn delete_secret(&self, key: &str) -> Result<()>;
}
