// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! HTTP client for the basic-credential validator.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use super::{http_client, ClientError, DeviceAuthService};

#[derive(Deserialize)]
struct AuthenticationStatus {
    authenticated: bool,
}

/// Asks the device basic-authentication service whether a username/password
/// pair is valid. The answer is a boolean; interpreting `false` as a
/// credential rejection is up to the caller.
pub struct HttpDeviceAuthService {
    base_url: String,
    client: reqwest::Client,
}

impl HttpDeviceAuthService {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            client: http_client(),
        }
    }
}

#[async_trait]
impl DeviceAuthService for HttpDeviceAuthService {
    async fn authenticate(&self, username: &str, password: &str) -> Result<bool, ClientError> {
        debug!(username, "querying basic-auth validator");
        let response = self
            .client
            .post(format!("{}/internal/api/v1/authentication", self.base_url))
            .json(&json!({
                "username": username,
                "password": password,
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ClientError::Status(response.status().as_u16()));
        }

        let status: AuthenticationStatus = response
            .json()
            .await
            .map_err(|e| ClientError::InvalidResponse(e.to_string()))?;
        Ok(status.authenticated)
    }
}
