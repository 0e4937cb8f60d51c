// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Identification and authorization errors.
//!
//! Every collaborator failure is converted into one of these kinds at the
//! call site; no raw client error crosses the auth boundary. The caller
//! (middleware) maps each kind to a transport status code via
//! [`AuthError::status_code`].

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Identification/authorization error taxonomy.
///
/// "Missing" variants are deliberately distinct from "invalid" variants so
/// that a device operator can tell a misconfigured transport (no certificate
/// forwarded) apart from a rejected credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// No usable credential and unsecure mode does not apply.
    UnableToAuthenticate,
    /// Certificate mode selected but no certificate attributes were
    /// forwarded by the transport layer.
    MissingCertificate,
    /// Certificate present but the certificate-ACL service rejected it.
    InvalidCertificate,
    /// Basic mode selected but no Authorization header was sent.
    MissingBasicToken,
    /// Authorization header present but not decodable into a credential.
    InvalidBasicToken,
    /// Credential decodable but rejected by the remote validator.
    InvalidCredentials,
    /// Identity resolved but the device registry has no record for it.
    DeviceNotFound,
    /// A collaborator call failed for reasons other than credential
    /// rejection (network, timeout, 5xx). Retry-eligible.
    UpstreamServiceError(String),
}

#[derive(Serialize)]
struct AuthErrorBody {
    error: String,
    error_code: String,
}

impl AuthError {
    /// Get the stable error code for this error.
    pub fn error_code(&self) -> &'static str {
        match self {
            AuthError::UnableToAuthenticate => "unable_to_authenticate",
            AuthError::MissingCertificate => "missing_certificate",
            AuthError::InvalidCertificate => "invalid_certificate",
            AuthError::MissingBasicToken => "missing_basic_token",
            AuthError::InvalidBasicToken => "invalid_basic_token",
            AuthError::InvalidCredentials => "invalid_credentials",
            AuthError::DeviceNotFound => "device_not_found",
            AuthError::UpstreamServiceError(_) => "upstream_service_error",
        }
    }

    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::UnableToAuthenticate
            | AuthError::MissingCertificate
            | AuthError::MissingBasicToken
            | AuthError::InvalidBasicToken
            | AuthError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            AuthError::InvalidCertificate | AuthError::DeviceNotFound => StatusCode::FORBIDDEN,
            AuthError::UpstreamServiceError(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl std::fmt::Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthError::UnableToAuthenticate => write!(f, "Unable to authenticate the request"),
            AuthError::MissingCertificate => write!(f, "Client certificate is required"),
            AuthError::InvalidCertificate => write!(f, "Client certificate is invalid"),
            AuthError::MissingBasicToken => write!(f, "Missing Basic token"),
            AuthError::InvalidBasicToken => write!(f, "Invalid Basic token"),
            AuthError::InvalidCredentials => write!(f, "Invalid credentials"),
            AuthError::DeviceNotFound => write!(f, "Device not found"),
            AuthError::UpstreamServiceError(msg) => {
                write!(f, "Upstream service unavailable: {msg}")
            }
        }
    }
}

impl std::error::Error for AuthError {}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(AuthErrorBody {
            error: self.to_string(),
            error_code: self.error_code().to_string(),
        });
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    #[tokio::test]
    async fn missing_basic_token_returns_401() {
        let response = AuthError::MissingBasicToken.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let body_bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&body_bytes).unwrap();
        assert_eq!(body["error_code"], "missing_basic_token");
    }

    #[test]
    fn invalid_certificate_returns_403() {
        assert_eq!(
            AuthError::InvalidCertificate.status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(AuthError::DeviceNotFound.status_code(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn upstream_failures_are_server_errors() {
        let err = AuthError::UpstreamServiceError("timeout".to_string());
        assert_eq!(err.status_code(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(err.error_code(), "upstream_service_error");
    }
}
