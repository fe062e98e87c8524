//! In-memory store and vault
//!
//! Nothing survives the process. Used by tests and as a scratch backend, with
//! switches to make reads or writes fail.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use zeroize::Zeroizing;

use super::{KeyValueStore, SecureVault};
use crate::error::{Error, Result};

#[derive(Default)]
struct MemoryState {
    values: HashMap<String, String>,
    secrets: HashMap<String, Zeroizing<String>>,
    fail_reads: bool,
    fail_writes: bool,
    writes: usize,
    secret_writes: usize,
    secret_deletes: usize,
}

/// In-memory implementation of [`KeyValueStore`] and [`SecureVault`]
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every read fail
    pub fn set_fail_reads(&self, fail: bool) {
        self.lock().fail_reads = fail;
    }

    /// Make every write and delete fail
    pub fn set_fail_writes(&self, fail: bool) {
        self.lock().fail_writes = fail;
    }

    /// Plain value as stored, bypassing failure injection
    pub fn raw(&self, key: &str) -> Option<String> {
        self.lock().values.get(key).cloned()
    }

    /// Seed a plain value, bypassing failure injection
    pub fn insert_raw(&self, key: &str, value: &str) {
        self.lock().values.insert(key.to_string(), value.to_string());
    }

    /// Secret as stored, bypassing failure injection
    pub fn raw_secret(&self, key: &str) -> Option<String> {
        self.lock().secrets.get(key).map(|s| s.to_string())
    }

    /// Attempted plain writes, including failed ones
    pub fn write_count(&self) -> usize {
        self.lock().writes
    }

    /// Attempted secret writes, including failed ones
    pub fn secret_write_count(&self) -> usize {
        self.lock().secret_writes
    }

    /// Attempted secret deletes, including failed ones
    pub fn secret_delete_count(&self) -> usize {
        self.lock().secret_deletes
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let state = self.lock();
        if state.fail_reads {
            return Err(Error::Store(format!("read of {} failed", key)));
        }
        Ok(state.values.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut state = self.lock();
        state.writes += 1;
        if state.fail_writes {
            return Err(Error::Store(format!("write of {} failed", key)));
        }
        state.values.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut state = self.lock();
        if state.fail_writes {
            return Err(Error::Store(format!("delete of {} failed", key)));
        }
        state.values.remove(key);
        Ok(())
    }
}

#[async_trait]
impl SecureVault for MemoryStore {
    async fn get_secret(&self, key: &str) -> Result<Option<Zeroizing<String>>> {
        let state = self.lock();
        if state.fail_reads {
            return Err(Error::Vault(format!("read of {} failed", key)));
        }
        Ok(state.secrets.get(key).cloned())
    }

    async fn set_secret(&self, key: &str, value: &str) -> Result<()> {
        let mut state = self.lock();
        state.secret_writes += 1;
        if state.fail_writes {
            return Err(Error::Vault(format!("write of {} failed", key)));
        }
        state
            .secrets
            .insert(key.to_string(), Zeroizing::new(value.to_string()));
        Ok(())
    }

    async fn delete_secret(&self, key: &str) -> Result<()> {
        let mut state = self.lock();
        state.secret_deletes += 1;
        if state.fail_writes {
            return Err(Error::Vault(format!("delete of {} failed", key)));
        }
        state.secrets.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_values_and_secrets_are_separate() {
        let store = MemoryStore::new();
        store.set("k", "plain").await.unwrap();
        store.set_secret("k", "secret").await.unwrap();

        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("plain"));
        assert_eq!(
            store.get_secret("k").await.unwrap().map(|s| s.to_string()),
            Some("secret".to_string())
        );
    }

    #[tokio::test]
    async fn test_failure_injection() {
        let store = MemoryStore::new();
        store.set_fail_writes(true);
        assert!(store.set("k", "v").await.is_err());
        assert_eq!(store.write_count(), 1);
        assert!(store.raw("k").is_none());

        store.set_fail_reads(true);
        assert!(store.get("k").await.is_err());
    }

    #[tokio::test]
    async fn test_delete_missing_is_ok() {
        let store = MemoryStore::new();
        assert!(store.delete("missing").await.is_ok());
        assert!(store.delete_secret("missing").await.is_ok());
    }
}
