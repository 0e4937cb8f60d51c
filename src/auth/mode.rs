// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Authentication mode selection.
//!
//! One [`AuthMode`] is selected per request from static configuration plus
//! what the transport actually supplied, and is immutable for the request's
//! lifetime. Unsecure mode applies only to fully credential-less requests;
//! a credentialed request always goes through the configured mode, even
//! when that credential turns out to be incomplete.

use std::str::FromStr;

use crate::config::SecurityConfig;

/// The authentication strategy configured for credentialed requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthorizationMode {
    /// Identify devices by client-certificate fingerprint.
    Fingerprint,
    /// Identify devices by the certificate subject common name.
    CommonName,
    /// Identify devices by HTTP basic credentials.
    BasicAuth,
}

impl FromStr for AuthorizationMode {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "fingerprint" => Ok(AuthorizationMode::Fingerprint),
            "cn" => Ok(AuthorizationMode::CommonName),
            "basic-auth" => Ok(AuthorizationMode::BasicAuth),
            _ => Err(()),
        }
    }
}

impl std::fmt::Display for AuthorizationMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthorizationMode::Fingerprint => write!(f, "fingerprint"),
            AuthorizationMode::CommonName => write!(f, "cn"),
            AuthorizationMode::BasicAuth => write!(f, "basic-auth"),
        }
    }
}

/// The strategy selected for a single request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMode {
    /// Credential-less; identity supplied out-of-band via query parameters.
    Unsecure,
    CertificateFingerprint,
    CertificateCommonName,
    BasicCredential,
}

/// Pure decision: which [`AuthMode`] applies to the current request.
#[derive(Debug, Clone)]
pub struct AuthModeResolver {
    security: SecurityConfig,
}

impl AuthModeResolver {
    pub fn new(security: SecurityConfig) -> Self {
        Self { security }
    }

    /// Select the mode for a request.
    ///
    /// `has_certificate` reflects whether the transport forwarded any
    /// client-certificate attributes; `has_basic` whether an Authorization
    /// header is present. Unsecure is selected only when the flag is on and
    /// the request carries neither.
    pub fn resolve(&self, has_certificate: bool, has_basic: bool) -> AuthMode {
        if self.security.unsecure_mode && !has_certificate && !has_basic {
            return AuthMode::Unsecure;
        }
        match self.security.authorization_mode {
            AuthorizationMode::Fingerprint => AuthMode::CertificateFingerprint,
            AuthorizationMode::CommonName => AuthMode::CertificateCommonName,
            AuthorizationMode::BasicAuth => AuthMode::BasicCredential,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver(unsecure: bool, mode: AuthorizationMode) -> AuthModeResolver {
        AuthModeResolver::new(SecurityConfig {
            unsecure_mode: unsecure,
            authorization_mode: mode,
        })
    }

    #[test]
    fn credential_less_request_with_unsecure_enabled_is_unsecure() {
        let r = resolver(true, AuthorizationMode::Fingerprint);
        assert_eq!(r.resolve(false, false), AuthMode::Unsecure);
    }

    #[test]
    fn credential_less_request_without_unsecure_uses_configured_mode() {
        let r = resolver(false, AuthorizationMode::Fingerprint);
        assert_eq!(r.resolve(false, false), AuthMode::CertificateFingerprint);
    }

    #[test]
    fn certificate_present_never_falls_back_to_unsecure() {
        let r = resolver(true, AuthorizationMode::CommonName);
        assert_eq!(r.resolve(true, false), AuthMode::CertificateCommonName);
    }

    #[test]
    fn basic_header_present_never_falls_back_to_unsecure() {
        let r = resolver(true, AuthorizationMode::BasicAuth);
        assert_eq!(r.resolve(false, true), AuthMode::BasicCredential);
    }

    #[test]
    fn mode_strings_round_trip() {
        for raw in ["fingerprint", "cn", "basic-auth"] {
            let mode: AuthorizationMode = raw.parse().unwrap();
            assert_eq!(mode.to_string(), raw);
        }
    }
}
