// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! HTTP client for the device registry (device manager).

use async_trait::async_trait;
use reqwest::StatusCode;
use tracing::debug;

use super::{http_client, ClientError, DeviceRegistryService};

/// Header carrying the tenant on internal registry calls.
const TENANT_HEADER: &str = "x-tenant-id";

/// Confirms a device record exists in the device registry. A 404 is a
/// definitive "no", not an error; anything else non-2xx is a collaborator
/// failure.
pub struct HttpDeviceRegistryService {
    base_url: String,
    client: reqwest::Client,
}

impl HttpDeviceRegistryService {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            client: http_client(),
        }
    }
}

#[async_trait]
impl DeviceRegistryService for HttpDeviceRegistryService {
    async fn device_exists(&self, tenant: &str, device_id: &str) -> Result<bool, ClientError> {
        debug!(tenant, device_id, "querying device registry");
        let response = self
            .client
            .get(format!("{}/internal/api/v1/devices/{device_id}", self.base_url))
            .header(TENANT_HEADER, tenant)
            .send()
            .await?;

        match response.status() {
            status if status.is_success() => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            status => Err(ClientError::Status(status.as_u16())),
        }
    }
}
