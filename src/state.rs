// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use crate::auth::{DeviceValidationGate, IdentificationService};
use crate::cache::IdentityCache;
use crate::events::CacheInvalidationListener;
use crate::publish::TelemetryPublisher;

#[derive(Clone)]
pub struct AppState {
    pub identification: Arc<IdentificationService>,
    pub device_gate: Arc<DeviceValidationGate>,
    pub cache: Arc<IdentityCache>,
    pub publisher: Arc<dyn TelemetryPublisher>,
    /// Present only when a lifecycle stream is configured; readiness
    /// degrades gracefully without it.
    pub listener: Option<Arc<CacheInvalidationListener>>,
}

impl AppState {
    pub fn new(
        identification: Arc<IdentificationService>,
        device_gate: Arc<DeviceValidationGate>,
        cache: Arc<IdentityCache>,
        publisher: Arc<dyn TelemetryPublisher>,
        listener: Option<Arc<CacheInvalidationListener>>,
    ) -> Self {
        Self {
            identification,
            device_gate,
            cache,
            publisher,
            listener,
        }
    }
}
