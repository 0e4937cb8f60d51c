// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! Configuration is loaded from the environment once at startup and is
//! immutable thereafter. A malformed value (unknown authorization mode, bad
//! port, invalid topic pattern) aborts the process before the server or the
//! lifecycle listener start.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `8080` |
//! | `GATEWAY_UNSECURE_MODE` | Allow credential-less requests (`true`/`false`) | `false` |
//! | `GATEWAY_AUTHORIZATION_MODE` | `fingerprint`, `cn` or `basic-auth` | `fingerprint` |
//! | `CERTIFICATE_ACL_URL` | Certificate-ACL service base URL | `http://certificate-acl:3000` |
//! | `DEVICE_AUTH_URL` | Basic-credential validator base URL | `http://basic-auth:3000` |
//! | `DEVICE_MANAGER_URL` | Device registry base URL | `http://device-manager:5000` |
//! | `LIFECYCLE_STREAM_URL` | NDJSON lifecycle event stream URL | unset (listener disabled) |
//! | `LIFECYCLE_TOPIC_PATTERN` | Regex matched against lifecycle topics | `.+\.device-manager\.device` |
//! | `IDENTITY_CACHE_CAPACITY` | LRU capacity per cache namespace | `8192` |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info` |

use std::env;

use regex::Regex;

use crate::auth::AuthorizationMode;

/// Default regex for device lifecycle topics.
pub const DEFAULT_LIFECYCLE_TOPIC_PATTERN: &str = r".+\.device-manager\.device";

/// Default LRU capacity for each cache namespace.
pub const DEFAULT_CACHE_CAPACITY: usize = 8192;

/// Errors raised while loading configuration. All of these are fatal at
/// startup; none can occur at request time.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("unrecognized authorization mode '{0}' (expected 'fingerprint', 'cn' or 'basic-auth')")]
    UnrecognizedAuthorizationMode(String),

    #[error("invalid PORT '{0}'")]
    InvalidPort(String),

    #[error("invalid LIFECYCLE_TOPIC_PATTERN: {0}")]
    InvalidTopicPattern(#[from] regex::Error),

    #[error("invalid IDENTITY_CACHE_CAPACITY '{0}'")]
    InvalidCacheCapacity(String),
}

/// Security-related settings consumed by the auth mode resolver.
#[derive(Debug, Clone)]
pub struct SecurityConfig {
    /// Whether fully credential-less requests may identify via query params.
    pub unsecure_mode: bool,
    /// The authentication strategy applied to credentialed requests.
    pub authorization_mode: AuthorizationMode,
}

/// Complete gateway configuration, loaded once in `main`.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub host: String,
    pub port: u16,
    pub security: SecurityConfig,
    pub certificate_acl_url: String,
    pub device_auth_url: String,
    pub device_manager_url: String,
    /// When unset the cache-invalidation listener is not started.
    pub lifecycle_stream_url: Option<String>,
    pub lifecycle_topic_pattern: Regex,
    pub cache_capacity: usize,
}

impl GatewayConfig {
    /// Load configuration from the environment.
    ///
    /// # Errors
    /// Returns a [`ConfigError`] for any unparsable value; callers are
    /// expected to treat this as fatal.
    pub fn from_env() -> Result<Self, ConfigError> {
        let host = env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port_raw = env::var("PORT").unwrap_or_else(|_| "8080".to_string());
        let port: u16 = port_raw
            .parse()
            .map_err(|_| ConfigError::InvalidPort(port_raw))?;

        let unsecure_mode = env::var("GATEWAY_UNSECURE_MODE")
            .map(|v| matches!(v.to_ascii_lowercase().as_str(), "true" | "1"))
            .unwrap_or(false);

        let mode_raw =
            env::var("GATEWAY_AUTHORIZATION_MODE").unwrap_or_else(|_| "fingerprint".to_string());
        let authorization_mode: AuthorizationMode = mode_raw
            .parse()
            .map_err(|_| ConfigError::UnrecognizedAuthorizationMode(mode_raw))?;

        let pattern_raw = env::var("LIFECYCLE_TOPIC_PATTERN")
            .unwrap_or_else(|_| DEFAULT_LIFECYCLE_TOPIC_PATTERN.to_string());
        let lifecycle_topic_pattern = Regex::new(&pattern_raw)?;

        let cache_capacity = match env::var("IDENTITY_CACHE_CAPACITY") {
            Ok(raw) => raw
                .parse()
                .map_err(|_| ConfigError::InvalidCacheCapacity(raw))?,
            Err(_) => DEFAULT_CACHE_CAPACITY,
        };

        Ok(Self {
            host,
            port,
            security: SecurityConfig {
                unsecure_mode,
                authorization_mode,
            },
            certificate_acl_url: env::var("CERTIFICATE_ACL_URL")
                .unwrap_or_else(|_| "http://certificate-acl:3000".to_string()),
            device_auth_url: env::var("DEVICE_AUTH_URL")
                .unwrap_or_else(|_| "http://basic-auth:3000".to_string()),
            device_manager_url: env::var("DEVICE_MANAGER_URL")
                .unwrap_or_else(|_| "http://device-manager:5000".to_string()),
            lifecycle_stream_url: env::var("LIFECYCLE_STREAM_URL").ok(),
            lifecycle_topic_pattern,
            cache_capacity,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_topic_pattern_matches_device_topics() {
        let pattern = Regex::new(DEFAULT_LIFECYCLE_TOPIC_PATTERN).unwrap();
        assert!(pattern.is_match("admin.device-manager.device"));
        assert!(!pattern.is_match("admin.telemetry.data"));
    }

    #[test]
    fn unrecognized_mode_is_an_error() {
        let parsed: Result<AuthorizationMode, _> = "oauth".parse();
        assert!(parsed.is_err());
    }
}
