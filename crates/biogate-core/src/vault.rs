//! Biometric login token lifecycle
//!
//! A fresh opaque token is written to the secure vault every time biometric
//! login is enabled and removed when it is disabled. The token binds the
//! "enabled" state to a local secret; nothing in this crate reads its value
//! back except to check presence.

use std::sync::Arc;

use rand::{distributions::Alphanumeric, rngs::OsRng, Rng};
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

use crate::store::SecureVault;

/// Vault key of the login token
pub const TOKEN_KEY: &str = "biometric_token";

/// Vault key of the enrollment artifact
pub const ENROLLMENT_KEY: &str = "biometric_enrollment";

/// Every key removed on revoke
pub const REVOKED_KEYS: [&str; 2] = [TOKEN_KEY, ENROLLMENT_KEY];

/// Token length in characters
pub const TOKEN_LENGTH: usize = 64;

/// Issues and revokes the biometric login token
pub struct TokenVault {
    vault: Arc<dyn SecureVault>,
}

impl TokenVault {
    pub fn new(vault: Arc<dyn SecureVault>) -> Self {
        Self { vault }
    }

    /// Generate a token and store it, replacing any previous one
    ///
    /// Returns whether the token reached the vault.
    pub async fn issue(&self) -> bool {
        let token = generate_token();
        match self.vault.set_secret(TOKEN_KEY, &token).await {
            Ok(()) => {
                info!("Issued biometric login token");
                true
            }
            Err(e) => {
                warn!("Failed to store biometric login token: {}", e);
                false
            }
        }
    }

    /// Delete the token and enrollment artifact
    ///
    /// Deleting absent entries is not an error. Every key is attempted even
    /// if an earlier delete fails.
    pub async fn revoke(&self) -> bool {
        let mut revoked = true;
        for key in REVOKED_KEYS {
            if let Err(e) = self.vault.delete_secret(key).await {
                warn!("Failed to delete {} from secure vault: {}", key, e);
                revoked = false;
            }
        }
        if revoked {
            info!("Revoked biometric login token");
        }
        revoked
    }

    /// A token is currently stored
    pub async fn is_issued(&self) -> bool {
        match self.vault.get_secret(TOKEN_KEY).await {
            Ok(token) => token.is_some(),
            Err(e) => {
                debug!("Could not read biometric login token: {}", e);
                false
            }
        }
    }
}

/// 64 alphanumeric characters from the OS random source
pub fn generate_token() -> Zeroizing<String> {
    Zeroizing::new(
        OsRng
            .sample_iter(&Alphanumeric)
            .take(TOKEN_LENGTH)
            .map(char::from)
            .collect(),
    )
}
