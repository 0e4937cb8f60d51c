// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Device validation gate.
//!
//! A second, independent check after identification: the resolved device
//! must still exist in the device registry. Authorization and existence
//! are distinct — a device can hold a valid, cached credential and be
//! deleted afterwards. Runs unconditionally for every auth mode.

use std::sync::Arc;

use tracing::{info, warn};

use crate::cache::IdentityCache;
use crate::clients::DeviceRegistryService;

use super::credentials::ResolvedIdentity;
use super::error::AuthError;

pub struct DeviceValidationGate {
    registry: Arc<dyn DeviceRegistryService>,
    cache: Arc<IdentityCache>,
}

impl DeviceValidationGate {
    pub fn new(registry: Arc<dyn DeviceRegistryService>, cache: Arc<IdentityCache>) -> Self {
        Self { registry, cache }
    }

    /// Confirm the device record exists for this identity.
    ///
    /// A "not found" answer also evicts whatever the cache holds for the
    /// device, so a deleted device stops riding a stale entry even when the
    /// corresponding lifecycle event was missed.
    ///
    /// # Errors
    /// `DeviceNotFound` when the registry has no record; `UpstreamServiceError`
    /// when the registry call itself fails.
    pub async fn validate(&self, identity: &ResolvedIdentity) -> Result<(), AuthError> {
        let exists = self
            .registry
            .device_exists(&identity.tenant, &identity.device_id)
            .await
            .map_err(|e| {
                warn!(
                    tenant = %identity.tenant,
                    device_id = %identity.device_id,
                    error = %e,
                    "device registry call failed"
                );
                AuthError::UpstreamServiceError(e.to_string())
            })?;

        if !exists {
            info!(
                tenant = %identity.tenant,
                device_id = %identity.device_id,
                "device no longer registered, evicting cached identity"
            );
            self.cache.remove_device(&identity.tenant, &identity.device_id);
            return Err(AuthError::DeviceNotFound);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use crate::clients::ClientError;

    use super::*;

    enum RegistryBehavior {
        Exists,
        Missing,
        Failing,
    }

    struct MockRegistry(RegistryBehavior);

    #[async_trait]
    impl DeviceRegistryService for MockRegistry {
        async fn device_exists(&self, _tenant: &str, _device_id: &str) -> Result<bool, ClientError> {
            match self.0 {
                RegistryBehavior::Exists => Ok(true),
                RegistryBehavior::Missing => Ok(false),
                RegistryBehavior::Failing => Err(ClientError::Request("timeout".to_string())),
            }
        }
    }

    fn gate(behavior: RegistryBehavior) -> (DeviceValidationGate, Arc<IdentityCache>) {
        let cache = Arc::new(IdentityCache::new(16));
        let gate = DeviceValidationGate::new(Arc::new(MockRegistry(behavior)), Arc::clone(&cache));
        (gate, cache)
    }

    #[tokio::test]
    async fn existing_device_passes() {
        let (gate, _) = gate(RegistryBehavior::Exists);
        let identity = ResolvedIdentity::new("acme", "dev1");
        assert!(gate.validate(&identity).await.is_ok());
    }

    #[tokio::test]
    async fn missing_device_is_rejected_and_cache_evicted() {
        let (gate, cache) = gate(RegistryBehavior::Missing);
        let identity = ResolvedIdentity::new("acme", "dev1");
        cache.put("fp-1", identity.clone());

        let err = gate.validate(&identity).await.unwrap_err();
        assert_eq!(err, AuthError::DeviceNotFound);
        assert!(cache.get("fp-1").is_none());
    }

    #[tokio::test]
    async fn registry_failure_is_an_upstream_error() {
        let (gate, cache) = gate(RegistryBehavior::Failing);
        let identity = ResolvedIdentity::new("acme", "dev1");
        cache.put("fp-1", identity.clone());

        let err = gate.validate(&identity).await.unwrap_err();
        assert!(matches!(err, AuthError::UpstreamServiceError(_)));
        // Upstream trouble is not evidence the device is gone.
        assert!(cache.get("fp-1").is_some());
    }
}
