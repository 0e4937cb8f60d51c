// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Remote collaborator interfaces.
//!
//! The gateway never implements these services; it only calls them and
//! interprets the result. Each is behind a trait so the identification
//! pipeline can be exercised against in-process fakes, with reqwest-backed
//! HTTP implementations for deployment. Every call is bounded by the
//! client-level timeout; a timed-out call surfaces as a plain error and is
//! treated by callers exactly like any other remote failure.

use std::time::Duration;

use async_trait::async_trait;

pub mod certificate_acl;
pub mod device_auth;
pub mod device_registry;

pub use certificate_acl::HttpCertificateAclService;
pub use device_auth::HttpDeviceAuthService;
pub use device_registry::HttpDeviceRegistryService;

/// Timeout applied to every collaborator call.
pub const CLIENT_TIMEOUT: Duration = Duration::from_secs(10);

/// Failure of a collaborator call, before interpretation by the caller.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("request failed: {0}")]
    Request(String),

    #[error("unexpected status {0}")]
    Status(u16),

    #[error("response was invalid: {0}")]
    InvalidResponse(String),
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        ClientError::Request(err.to_string())
    }
}

/// Certificate-ACL service: maps a certificate fingerprint or CN to the
/// owning `tenant:deviceId` entry.
#[async_trait]
pub trait CertificateAclService: Send + Sync {
    async fn resolve_entry(&self, credential: &str) -> Result<String, ClientError>;
}

/// Basic-credential validator: confirms a username/password pair.
#[async_trait]
pub trait DeviceAuthService: Send + Sync {
    async fn authenticate(&self, username: &str, password: &str) -> Result<bool, ClientError>;
}

/// Device registry: source of truth for device existence.
#[async_trait]
pub trait DeviceRegistryService: Send + Sync {
    async fn device_exists(&self, tenant: &str, device_id: &str) -> Result<bool, ClientError>;
}

/// Build the shared HTTP client used by the collaborator implementations.
pub(crate) fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(CLIENT_TIMEOUT)
        .build()
        .expect("Failed to create HTTP client")
}
