// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! HTTP client for the certificate-ACL service.

use async_trait::async_trait;
use tracing::debug;

use super::{http_client, CertificateAclService, ClientError};

/// Queries the certificate-ACL service for the ACL entry bound to a
/// certificate fingerprint or common name. The entry is returned as a
/// plain-text `tenant:deviceId` pair.
pub struct HttpCertificateAclService {
    base_url: String,
    client: reqwest::Client,
}

impl HttpCertificateAclService {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            client: http_client(),
        }
    }
}

#[async_trait]
impl CertificateAclService for HttpCertificateAclService {
    async fn resolve_entry(&self, credential: &str) -> Result<String, ClientError> {
        debug!(credential, "querying certificate-acl");
        let response = self
            .client
            .get(format!("{}/internal/api/v1/acl-entries/{credential}", self.base_url))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ClientError::Status(response.status().as_u16()));
        }

        let entry = response.text().await?;
        let entry = entry.trim().to_string();
        if entry.is_empty() {
            return Err(ClientError::InvalidResponse("empty ACL entry".to_string()));
        }
        Ok(entry)
    }
}
