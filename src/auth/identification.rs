// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Identification pipeline.
//!
//! Orchestrates mode resolution, credential extraction, cache lookup,
//! fallback remote validation and cache population into a single
//! `identify` entry point. The cache is consulted strictly before any
//! remote call, and a hit short-circuits validation regardless of how
//! stale the entry might be; staleness is corrected only by lifecycle
//! event invalidation.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::cache::IdentityCache;
use crate::clients::{CertificateAclService, DeviceAuthService};

use super::credentials::{self, basic_flag_key, CredentialMaterial, IdentifyRequest, ResolvedIdentity};
use super::error::AuthError;
use super::mode::{AuthMode, AuthModeResolver};

/// Resolves WHO sent a request: tenant plus device identity, or a typed
/// rejection.
pub struct IdentificationService {
    resolver: AuthModeResolver,
    cache: Arc<IdentityCache>,
    certificate_acl: Arc<dyn CertificateAclService>,
    device_auth: Arc<dyn DeviceAuthService>,
}

impl IdentificationService {
    pub fn new(
        resolver: AuthModeResolver,
        cache: Arc<IdentityCache>,
        certificate_acl: Arc<dyn CertificateAclService>,
        device_auth: Arc<dyn DeviceAuthService>,
    ) -> Self {
        Self {
            resolver,
            cache,
            certificate_acl,
            device_auth,
        }
    }

    /// Resolve the identity behind a request.
    ///
    /// # Errors
    /// Returns the matching [`AuthError`] kind for absent, malformed or
    /// rejected credentials; collaborator failures never escape raw.
    pub async fn identify(&self, request: &IdentifyRequest) -> Result<ResolvedIdentity, AuthError> {
        let mode = self
            .resolver
            .resolve(request.has_certificate(), request.has_basic());
        let material = credentials::extract(mode, request)?;

        match material {
            CredentialMaterial::Fingerprint(ref credential)
            | CredentialMaterial::CommonName(ref credential) => {
                self.identify_certificate(credential).await
            }
            CredentialMaterial::Basic { username, password } => {
                self.identify_basic(&username, &password).await
            }
            CredentialMaterial::Unsecure { tenant, device_id } => {
                // Identity taken verbatim from the out-of-band source; the
                // cache is never touched.
                Ok(ResolvedIdentity::new(tenant, device_id))
            }
        }
    }

    /// Certificate modes: cache key is the credential value itself.
    async fn identify_certificate(&self, credential: &str) -> Result<ResolvedIdentity, AuthError> {
        if let Some(identity) = self.cache.get(credential) {
            debug!(tenant = %identity.tenant, device_id = %identity.device_id, "identity cache hit");
            return Ok(identity);
        }

        let entry = self
            .certificate_acl
            .resolve_entry(credential)
            .await
            .map_err(|e| {
                warn!(error = %e, "certificate-acl rejected or failed");
                AuthError::InvalidCertificate
            })?;

        // The ACL entry is a `tenant:deviceId` pair; a payload that does
        // not split is a collaborator contract violation, not a rejection.
        let (tenant, device_id) = entry.split_once(':').ok_or_else(|| {
            AuthError::UpstreamServiceError(format!("malformed ACL entry '{entry}'"))
        })?;

        let identity = ResolvedIdentity::new(tenant, device_id);
        self.cache.put(credential, identity.clone());
        Ok(identity)
    }

    /// Basic mode: the identity is decoded from the username; the remote
    /// validator is only consulted when the pair has no validated flag yet.
    async fn identify_basic(
        &self,
        username: &str,
        password: &str,
    ) -> Result<ResolvedIdentity, AuthError> {
        let identity = CredentialMaterial::basic_identity(username)?;
        let flag_key = basic_flag_key(username, password);

        if self.cache.get_flag(&flag_key) {
            debug!(tenant = %identity.tenant, device_id = %identity.device_id, "validated-flag cache hit");
            return Ok(identity);
        }

        let authenticated = self
            .device_auth
            .authenticate(username, password)
            .await
            .map_err(|e| {
                warn!(error = %e, "basic-credential validator failed");
                AuthError::InvalidCredentials
            })?;

        if !authenticated {
            return Err(AuthError::InvalidCredentials);
        }

        self.cache.set_flag(&flag_key, &identity);
        Ok(identity)
    }
}
