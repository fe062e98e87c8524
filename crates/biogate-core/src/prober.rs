//! Capability probing

use std::sync::Arc;

use tracing::{debug, warn};

use crate::platform::BiometricPlatform;
use crate::types::BiometricCapabilities;

/// Read-only capability query against the platform
///
/// A probe never fails. A platform error degrades to
/// [`BiometricCapabilities::unavailable`] with a warning.
pub struct CapabilityProber {
    platform: Arc<dyn BiometricPlatform>,
}

impl CapabilityProber {
    pub fn new(platform: Arc<dyn BiometricPlatform>) -> Self {
        Self { platform }
    }

    /// Ask the device what it supports right now
    pub async fn probe(&self) -> BiometricCapabilities {
        match self.platform.probe_capabilities().await {
            Ok(capabilities) => {
                debug!(
                    has_hardware = capabilities.has_hardware,
                    is_enrolled = capabilities.is_enrolled,
                    security_level = ?capabilities.security_level,
                    "Probed biometric capabilities"
                );
                capabilities
            }
            Err(e) => {
                warn!("Biometric capability probe failed: {}", e);
                BiometricCapabilities::unavailable()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::SimulatedPlatform;

    #[tokio::test]
    async fn test_probe_available() {
        let prober = CapabilityProber::new(Arc::new(SimulatedPlatform::available()));
        assert!(prober.probe().await.is_available());
    }

    #[tokio::test]
    async fn test_probe_absence_is_not_an_error() {
        let prober = CapabilityProber::new(Arc::new(SimulatedPlatform::not_enrolled()));
        let caps = prober.probe().await;
        assert!(caps.has_hardware);
        assert!(!caps.is_available());
    }

    #[tokio::test]
    async fn test_probe_failure_degrades() {
        let prober = CapabilityProber::new(Arc::new(SimulatedPlatform::probe_failing("boom")));
        assert_eq!(prober.probe().await, BiometricCapabilities::unavailable());
    }
}
