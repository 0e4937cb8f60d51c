// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Credential extraction.
//!
//! Pulls the raw credential material for the selected [`AuthMode`] out of
//! the transport metadata and rejects structurally invalid input before any
//! remote call is attempted. TLS termination happens upstream; the gateway
//! receives already-parsed certificate attributes as trusted headers.

use base64ct::{Base64, Encoding};
use serde::Serialize;
use sha2::{Digest, Sha256};
use utoipa::ToSchema;

use super::error::AuthError;
use super::mode::AuthMode;

/// Header carrying the client-certificate fingerprint, set by the
/// TLS-terminating transport.
pub const CERT_FINGERPRINT_HEADER: &str = "x-client-cert-fingerprint";

/// Header carrying the certificate subject common name.
pub const CERT_CN_HEADER: &str = "x-client-cert-cn";

/// Transport metadata relevant to identification, detached from the axum
/// request so the core stays framework-free.
#[derive(Debug, Default, Clone)]
pub struct IdentifyRequest {
    pub certificate_fingerprint: Option<String>,
    pub certificate_common_name: Option<String>,
    /// Raw `Authorization` header value, if any.
    pub authorization: Option<String>,
    /// Out-of-band tenant (query parameter), used only in unsecure mode.
    pub tenant_param: Option<String>,
    /// Out-of-band device id (query parameter), used only in unsecure mode.
    pub device_id_param: Option<String>,
}

impl IdentifyRequest {
    /// Whether the transport forwarded any certificate attributes.
    pub fn has_certificate(&self) -> bool {
        self.certificate_fingerprint.is_some() || self.certificate_common_name.is_some()
    }

    /// Whether an Authorization header is present.
    pub fn has_basic(&self) -> bool {
        self.authorization.is_some()
    }
}

/// The resolved tenant/device identity attached to accepted requests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct ResolvedIdentity {
    pub tenant: String,
    pub device_id: String,
}

impl ResolvedIdentity {
    pub fn new(tenant: impl Into<String>, device_id: impl Into<String>) -> Self {
        Self {
            tenant: tenant.into(),
            device_id: device_id.into(),
        }
    }

    /// The `tenant@deviceId` key under which lifecycle events address this
    /// device.
    pub fn device_key(&self) -> String {
        format!("{}@{}", self.tenant, self.device_id)
    }
}

/// Raw credential material for the selected mode. Never constructed for a
/// mode other than the one selected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialMaterial {
    Fingerprint(String),
    CommonName(String),
    Basic {
        /// Shaped `tenant@deviceId`; validated at extraction time.
        username: String,
        password: String,
    },
    Unsecure {
        tenant: String,
        device_id: String,
    },
}

impl CredentialMaterial {
    /// Decode the tenant/device identity carried by a basic-auth username.
    ///
    /// Only meaningful for [`CredentialMaterial::Basic`]; extraction
    /// guarantees the username splits.
    pub fn basic_identity(username: &str) -> Result<ResolvedIdentity, AuthError> {
        let (tenant, device_id) = username
            .split_once('@')
            .ok_or(AuthError::InvalidBasicToken)?;
        if tenant.is_empty() || device_id.is_empty() {
            return Err(AuthError::InvalidBasicToken);
        }
        Ok(ResolvedIdentity::new(tenant, device_id))
    }
}

/// Cache key for the basic-credential validated flag: SHA-256 over the
/// decoded `username:password` pair.
pub fn basic_flag_key(username: &str, password: &str) -> String {
    let digest = Sha256::digest(format!("{username}:{password}").as_bytes());
    format!("{digest:x}")
}

/// Extract the credential material for `mode` from the request.
///
/// # Errors
/// Structurally invalid or absent credentials are rejected here, before any
/// remote validation is attempted.
pub fn extract(mode: AuthMode, request: &IdentifyRequest) -> Result<CredentialMaterial, AuthError> {
    match mode {
        AuthMode::CertificateFingerprint => {
            let fingerprint = request
                .certificate_fingerprint
                .as_deref()
                .filter(|v| !v.is_empty())
                .ok_or(AuthError::MissingCertificate)?;
            Ok(CredentialMaterial::Fingerprint(fingerprint.to_string()))
        }
        AuthMode::CertificateCommonName => {
            let cn = request
                .certificate_common_name
                .as_deref()
                .filter(|v| !v.is_empty())
                .ok_or(AuthError::MissingCertificate)?;
            Ok(CredentialMaterial::CommonName(cn.to_string()))
        }
        AuthMode::BasicCredential => {
            let header = request
                .authorization
                .as_deref()
                .ok_or(AuthError::MissingBasicToken)?;
            let (username, password) = decode_basic_token(header)?;
            // Reject usernames that cannot encode an identity up front.
            CredentialMaterial::basic_identity(&username)?;
            Ok(CredentialMaterial::Basic { username, password })
        }
        AuthMode::Unsecure => {
            let tenant = request
                .tenant_param
                .as_deref()
                .filter(|v| !v.is_empty())
                .ok_or(AuthError::UnableToAuthenticate)?;
            let device_id = request
                .device_id_param
                .as_deref()
                .filter(|v| !v.is_empty())
                .ok_or(AuthError::UnableToAuthenticate)?;
            Ok(CredentialMaterial::Unsecure {
                tenant: tenant.to_string(),
                device_id: device_id.to_string(),
            })
        }
    }
}

/// Decode an `Authorization: Basic <token>` header into a username/password
/// pair.
fn decode_basic_token(header: &str) -> Result<(String, String), AuthError> {
    let token = header
        .strip_prefix("Basic ")
        .map(str::trim)
        .ok_or(AuthError::InvalidBasicToken)?;

    let decoded = Base64::decode_vec(token).map_err(|_| AuthError::InvalidBasicToken)?;
    let decoded = String::from_utf8(decoded).map_err(|_| AuthError::InvalidBasicToken)?;

    let (username, password) = decoded
        .split_once(':')
        .ok_or(AuthError::InvalidBasicToken)?;
    if username.is_empty() || password.is_empty() {
        return Err(AuthError::InvalidBasicToken);
    }
    Ok((username.to_string(), password.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    // base64("test@abc123:PassWorD/123")
    const VALID_BASIC: &str = "Basic dGVzdEBhYmMxMjM6UGFzc1dvckQvMTIz";

    fn request() -> IdentifyRequest {
        IdentifyRequest::default()
    }

    #[test]
    fn fingerprint_extraction_requires_header() {
        let err = extract(AuthMode::CertificateFingerprint, &request()).unwrap_err();
        assert_eq!(err, AuthError::MissingCertificate);

        let req = IdentifyRequest {
            certificate_fingerprint: Some("AB:CD:EF".to_string()),
            ..request()
        };
        assert_eq!(
            extract(AuthMode::CertificateFingerprint, &req).unwrap(),
            CredentialMaterial::Fingerprint("AB:CD:EF".to_string())
        );
    }

    #[test]
    fn empty_common_name_is_missing() {
        let req = IdentifyRequest {
            certificate_common_name: Some(String::new()),
            ..request()
        };
        let err = extract(AuthMode::CertificateCommonName, &req).unwrap_err();
        assert_eq!(err, AuthError::MissingCertificate);
    }

    #[test]
    fn basic_extraction_decodes_the_pair() {
        let req = IdentifyRequest {
            authorization: Some(VALID_BASIC.to_string()),
            ..request()
        };
        match extract(AuthMode::BasicCredential, &req).unwrap() {
            CredentialMaterial::Basic { username, password } => {
                assert_eq!(username, "test@abc123");
                assert_eq!(password, "PassWorD/123");
            }
            other => panic!("unexpected material: {other:?}"),
        }
    }

    #[test]
    fn missing_authorization_header_is_missing_basic_token() {
        let err = extract(AuthMode::BasicCredential, &request()).unwrap_err();
        assert_eq!(err, AuthError::MissingBasicToken);
    }

    #[test]
    fn header_without_basic_scheme_is_invalid() {
        let req = IdentifyRequest {
            authorization: Some("dGVzdEBhYmMxMjM6UGFzc1dvckQvMTIz".to_string()),
            ..request()
        };
        let err = extract(AuthMode::BasicCredential, &req).unwrap_err();
        assert_eq!(err, AuthError::InvalidBasicToken);
    }

    #[test]
    fn undecodable_token_is_invalid() {
        let req = IdentifyRequest {
            authorization: Some("Basic !!!not-base64!!!".to_string()),
            ..request()
        };
        let err = extract(AuthMode::BasicCredential, &req).unwrap_err();
        assert_eq!(err, AuthError::InvalidBasicToken);
    }

    #[test]
    fn username_without_device_separator_is_invalid() {
        // base64("justauser:password")
        let req = IdentifyRequest {
            authorization: Some("Basic anVzdGF1c2VyOnBhc3N3b3Jk".to_string()),
            ..request()
        };
        let err = extract(AuthMode::BasicCredential, &req).unwrap_err();
        assert_eq!(err, AuthError::InvalidBasicToken);
    }

    #[test]
    fn unsecure_extraction_requires_both_params() {
        let err = extract(AuthMode::Unsecure, &request()).unwrap_err();
        assert_eq!(err, AuthError::UnableToAuthenticate);

        let req = IdentifyRequest {
            tenant_param: Some("acme".to_string()),
            device_id_param: Some("dev1".to_string()),
            ..request()
        };
        assert_eq!(
            extract(AuthMode::Unsecure, &req).unwrap(),
            CredentialMaterial::Unsecure {
                tenant: "acme".to_string(),
                device_id: "dev1".to_string(),
            }
        );
    }

    #[test]
    fn flag_key_is_stable_and_pair_sensitive() {
        let a = basic_flag_key("test@abc123", "secret");
        let b = basic_flag_key("test@abc123", "secret");
        let c = basic_flag_key("test@abc123", "other");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn device_key_joins_tenant_and_device() {
        let identity = ResolvedIdentity::new("acme", "dev1");
        assert_eq!(identity.device_key(), "acme@dev1");
    }
}
