//! File-backed secure vault
//!
//! Software stand-in for a hardware keystore. Secrets are kept in one file
//! encrypted with ChaCha20-Poly1305 under a random 32-byte device key that
//! lives in a separate owner-only key file.
//!
//! # Storage Format
//!
//! `vault.key` holds the hex-encoded device key.
//! `vault.enc` holds:
//! - 12-byte nonce
//! - Encrypted JSON object of key -> secret
//! - 16-byte authentication tag (appended by ChaCha20-Poly1305)

use std::collections::BTreeMap;
use std::path::PathBuf;

use async_trait::async_trait;
use chacha20poly1305::{
    aead::{Aead, KeyInit},
    ChaCha20Poly1305, Nonce,
};
use rand::RngCore;
use tokio::sync::Mutex;
use tracing::info;
use zeroize::Zeroizing;

use super::file::write_atomic;
use super::SecureVault;
use crate::error::{Error, Result};

/// Size of the nonce for ChaCha20-Poly1305
const NONCE_SIZE: usize = 12;

/// Size of the device key
const KEY_SIZE: usize = 32;

const KEY_FILE: &str = "vault.key";
const DATA_FILE: &str = "vault.enc";

type DeviceKey = Zeroizing<[u8; KEY_SIZE]>;

/// Encrypted secret storage in a directory
pub struct EncryptedFileVault {
    base_path: PathBuf,
    /// Cached device key, also serializes read-modify-write cycles
    key: Mutex<Option<DeviceKey>>,
}

impl EncryptedFileVault {
    /// Vault rooted at `base_path`; files are created on first write
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
            key: Mutex::new(None),
        }
    }

    fn key_path(&self) -> PathBuf {
        self.base_path.join(KEY_FILE)
    }

    fn data_path(&self) -> PathBuf {
        self.base_path.join(DATA_FILE)
    }

    /// Load the device key, generating it on first use
    async fn device_key(&self, cached: &mut Option<DeviceKey>) -> Result<DeviceKey> {
        if let Some(key) = cached.as_ref() {
            return Ok(key.clone());
        }

        let path = self.key_path();
        let key = match tokio::fs::read_to_string(&path).await {
            Ok(contents) => {
                let bytes = Zeroizing::new(
                    hex::decode(contents.trim())
                        .map_err(|e| Error::Crypto(format!("Invalid vault key: {}", e)))?,
                );
                let array: [u8; KEY_SIZE] = bytes
                    .as_slice()
                    .try_into()
                    .map_err(|_| Error::Crypto("Invalid vault key length".to_string()))?;
                Zeroizing::new(array)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let mut array = Zeroizing::new([0u8; KEY_SIZE]);
                rand::rngs::OsRng.fill_bytes(&mut array[..]);
                let encoded = Zeroizing::new(hex::encode(&array[..]));
                write_atomic(&path, encoded.as_bytes(), "key.tmp").await?;
                info!("Generated new vault key at {:?}", path);
                array
            }
            Err(e) => return Err(e.into()),
        };

        *cached = Some(key.clone());
        Ok(key)
    }

    async fn read_secrets(&self, key: &DeviceKey) -> Result<BTreeMap<String, String>> {
        let encrypted_data = match tokio::fs::read(self.data_path()).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(e) => return Err(e.into()),
        };

        if encrypted_data.len() < NONCE_SIZE {
            return Err(Error::Vault("Encrypted file too short".to_string()));
        }

        // Extract nonce and ciphertext
        let nonce = Nonce::from_slice(&encrypted_data[..NONCE_SIZE]);
        let ciphertext = &encrypted_data[NONCE_SIZE..];

        let cipher = ChaCha20Poly1305::new_from_slice(&key[..])
            .map_err(|e| Error::Crypto(format!("Invalid key: {}", e)))?;

        let plaintext = Zeroizing::new(
            cipher
                .decrypt(nonce, ciphertext)
                .map_err(|_| Error::Crypto("Vault decryption failed".to_string()))?,
        );

        Ok(serde_json::from_slice(&plaintext)?)
    }

    async fn write_secrets(&self, key: &DeviceKey, secrets: &BTreeMap<String, String>) -> Result<()> {
        let plaintext = Zeroizing::new(serde_json::to_vec(secrets)?);

        let mut nonce_bytes = [0u8; NONCE_SIZE];
        rand::rngs::OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let cipher = ChaCha20Poly1305::new_from_slice(&key[..])
            .map_err(|e| Error::Crypto(format!("Invalid key: {}", e)))?;

        let ciphertext = cipher
            .encrypt(nonce, plaintext.as_slice())
            .map_err(|e| Error::Crypto(format!("Encryption failed: {}", e)))?;

        // Combine nonce + ciphertext
        let mut encrypted_data = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        encrypted_data.extend_from_slice(&nonce_bytes);
        encrypted_data.extend_from_slice(&ciphertext);

        write_atomic(&self.data_path(), &encrypted_data, "enc.tmp").await
    }
}

#[async_trait]
impl SecureVault for EncryptedFileVault {
    async fn get_secret(&self, name: &str) -> Result<Option<Zeroizing<String>>> {
        let mut cached = self.key.lock().await;
        let key = self.device_key(&mut cached).await?;
        let mut secrets = self.read_secrets(&key).await?;
        Ok(secrets.remove(name).map(Zeroizing::new))
    }

    async fn set_secret(&self, name: &str, value: &str) -> Result<()> {
        let mut cached = self.key.lock().await;
        let key = self.device_key(&mut cached).await?;
        let mut secrets = self.read_secrets(&key).await?;
        secrets.insert(name.to_string(), value.to_string());
        self.write_secrets(&key, &secrets).await
    }

    async fn delete_secret(&self, name: &str) -> Result<()> {
        let mut cached = self.key.lock().await;
        let key = self.device_key(&mut cached).await?;
        let mut secrets = self.read_secrets(&key).await?;
        if secrets.remove(name).is_some() {
            self.write_secrets(&key, &secrets).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_round_trip_across_instances() {
        let temp_dir = tempdir().unwrap();

        let vault = EncryptedFileVault::new(temp_dir.path());
        vault.set_secret("token", "s3cret").await.unwrap();

        let reopened = EncryptedFileVault::new(temp_dir.path());
        let secret = reopened.get_secret("token").await.unwrap().unwrap();
        assert_eq!(secret.as_str(), "s3cret");
    }

    #[tokio::test]
    async fn test_ciphertext_does_not_contain_secret() {
        let temp_dir = tempdir().unwrap();
        let vault = EncryptedFileVault::new(temp_dir.path());
        vault.set_secret("token", "plainly-visible").await.unwrap();

        let raw = std::fs::read(temp_dir.path().join(DATA_FILE)).unwrap();
        let needle = b"plainly-visible";
        assert!(!raw.windows(needle.len()).any(|w| w == needle));
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let temp_dir = tempdir().unwrap();
        let vault = EncryptedFileVault::new(temp_dir.path());

        vault.delete_secret("token").await.unwrap();
        vault.set_secret("token", "x").await.unwrap();
        vault.delete_secret("token").await.unwrap();
        vault.delete_secret("token").await.unwrap();
        assert!(vault.get_secret("token").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_wrong_key_fails() {
        let temp_dir = tempdir().unwrap();
        let vault = EncryptedFileVault::new(temp_dir.path());
        vault.set_secret("token", "x").await.unwrap();

        std::fs::write(temp_dir.path().join(KEY_FILE), hex::encode([7u8; KEY_SIZE])).unwrap();

        let reopened = EncryptedFileVault::new(temp_dir.path());
        assert!(matches!(reopened.get_secret("token").await, Err(Error::Crypto(_))));
    }
}
