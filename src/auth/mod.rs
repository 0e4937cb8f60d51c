// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Identification & Authorization Module
//!
//! Decides, for every inbound telemetry message, WHO sent it (tenant plus
//! device identity) and WHETHER the sender may submit data, before the
//! message reaches the downstream pipeline.
//!
//! ## Pipeline
//!
//! 1. [`AuthModeResolver`] selects the strategy for the request: unsecure,
//!    certificate fingerprint, certificate CN, or basic credentials.
//! 2. [`credentials::extract`] pulls the raw credential material and rejects
//!    structurally invalid input before any remote call.
//! 3. [`IdentificationService`] checks the identity cache, falls back to the
//!    matching remote validator on a miss, and populates the cache.
//! 4. [`DeviceValidationGate`] confirms the device still exists in the
//!    registry — independent of authorization.
//!
//! The cache is corrected asynchronously by the lifecycle listener in
//! `crate::events`; see that module for the consistency model.

pub mod credentials;
pub mod device_gate;
pub mod error;
pub mod identification;
pub mod middleware;
pub mod mode;

pub use credentials::{IdentifyRequest, ResolvedIdentity};
pub use device_gate::DeviceValidationGate;
pub use error::AuthError;
pub use identification::IdentificationService;
pub use mode::{AuthMode, AuthModeResolver, AuthorizationMode};
