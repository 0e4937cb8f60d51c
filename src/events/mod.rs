// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Device Lifecycle Events
//!
//! The device registry announces create/update/remove operations on an
//! external event stream. The gateway consumes that stream to keep the
//! identity cache consistent: a `remove` event evicts whatever is cached
//! for the device, so a deleted device can no longer ride on a stale hit.
//!
//! Consistency is eventual by design. A request may populate the cache for
//! a device that is being removed concurrently; the stale entry survives
//! until the next lifecycle event corrects it.

use serde::Deserialize;

pub mod consumer;
pub mod listener;

pub use consumer::{ChannelEventStream, EventStream, HttpEventStream, StreamError, Subscription};
pub use listener::CacheInvalidationListener;

/// Event name that triggers cache invalidation. All other events are
/// ignored.
pub const REMOVE_EVENT: &str = "remove";

/// A device lifecycle event as carried on the stream.
///
/// Wire shape: `{"event": "remove", "meta": {"service": "<tenant>"},
/// "data": {"id": "<deviceId>"}}`.
#[derive(Debug, Deserialize)]
pub struct DeviceLifecycleEvent {
    pub event: String,
    pub meta: EventMeta,
    pub data: EventData,
}

#[derive(Debug, Deserialize)]
pub struct EventMeta {
    /// The tenant the device belongs to.
    pub service: String,
}

#[derive(Debug, Deserialize)]
pub struct EventData {
    /// The device id.
    pub id: String,
}
