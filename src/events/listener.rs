// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Cache Invalidation Listener
//!
//! Background task that consumes device lifecycle events and evicts cache
//! entries for removed devices. One bad event must never stop the listener:
//! malformed payloads are logged and dropped.
//!
//! ## Subscription lifecycle
//!
//! The listener owns at most one active subscription. `register` releases
//! any previous subscription before creating the next, and the run loop
//! re-registers after a stream interruption; because eviction is
//! idempotent, resuming cannot produce duplicate side effects.
//!
//! ## Shutdown
//!
//! Uses `tokio_util::sync::CancellationToken` for graceful shutdown,
//! following the same pattern as the rest of our background tasks.

use std::sync::Arc;
use std::time::Duration;

use regex::Regex;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::cache::IdentityCache;

use super::consumer::{EventStream, StreamError, Subscription};
use super::{DeviceLifecycleEvent, REMOVE_EVENT};

/// Delay before re-registering after the stream drops or registration
/// fails.
const RESUME_DELAY: Duration = Duration::from_secs(5);

pub struct CacheInvalidationListener {
    stream: Arc<dyn EventStream>,
    cache: Arc<IdentityCache>,
    topic_pattern: Regex,
    subscription_id: Mutex<Option<u64>>,
}

impl CacheInvalidationListener {
    pub fn new(
        stream: Arc<dyn EventStream>,
        cache: Arc<IdentityCache>,
        topic_pattern: Regex,
    ) -> Self {
        Self {
            stream,
            cache,
            topic_pattern,
            subscription_id: Mutex::new(None),
        }
    }

    /// Subscribe to the lifecycle topic pattern, releasing any previous
    /// subscription first.
    ///
    /// # Errors
    /// Propagates the stream's subscription failure; the run loop treats
    /// this as retryable.
    pub async fn register(&self) -> Result<Subscription, StreamError> {
        let mut current = self.subscription_id.lock().await;
        if let Some(id) = current.take() {
            self.stream.unsubscribe(id).await;
        }
        let subscription = self.stream.subscribe(self.topic_pattern.clone()).await?;
        *current = Some(subscription.id);
        Ok(subscription)
    }

    /// Release the active subscription, if any. Safe to call repeatedly.
    pub async fn unregister(&self) {
        if let Some(id) = self.subscription_id.lock().await.take() {
            self.stream.unsubscribe(id).await;
        }
    }

    /// Connectivity probe for the readiness endpoint.
    pub async fn is_connected(&self) -> bool {
        self.stream.is_connected().await
    }

    /// Run until the cancellation token is triggered, resuming the
    /// subscription whenever the stream is interrupted.
    ///
    /// Should be spawned as a background task:
    /// ```rust,ignore
    /// tokio::spawn(async move { listener.run(shutdown).await });
    /// ```
    pub async fn run(&self, shutdown: CancellationToken) {
        info!(pattern = %self.topic_pattern, "cache invalidation listener starting");

        loop {
            let mut subscription = tokio::select! {
                result = self.register() => match result {
                    Ok(subscription) => subscription,
                    Err(e) => {
                        warn!(error = %e, "lifecycle subscription failed, retrying");
                        if self.wait_resume(&shutdown).await {
                            return;
                        }
                        continue;
                    }
                },
                _ = shutdown.cancelled() => return,
            };

            loop {
                tokio::select! {
                    maybe_payload = subscription.events.recv() => match maybe_payload {
                        Some(payload) => self.handle_payload(&payload),
                        None => break,
                    },
                    _ = shutdown.cancelled() => {
                        info!("cache invalidation listener shutting down");
                        self.unregister().await;
                        return;
                    }
                }
            }

            warn!("lifecycle stream interrupted, resuming subscription");
            if self.wait_resume(&shutdown).await {
                return;
            }
        }
    }

    /// Sleep before resuming; returns `true` when shutdown was requested.
    async fn wait_resume(&self, shutdown: &CancellationToken) -> bool {
        tokio::select! {
            _ = tokio::time::sleep(RESUME_DELAY) => false,
            _ = shutdown.cancelled() => {
                info!("cache invalidation listener shutting down");
                self.unregister().await;
                true
            }
        }
    }

    /// Process one raw event payload. Never fails: anything that cannot be
    /// interpreted is logged and dropped.
    fn handle_payload(&self, payload: &[u8]) {
        let event: DeviceLifecycleEvent = match serde_json::from_slice(payload) {
            Ok(event) => event,
            Err(e) => {
                warn!(error = %e, "dropping malformed lifecycle event");
                return;
            }
        };

        if event.event != REMOVE_EVENT {
            debug!(event = %event.event, "ignoring lifecycle event");
            return;
        }

        info!(
            tenant = %event.meta.service,
            device_id = %event.data.id,
            "device removed, evicting cache entries"
        );
        self.cache.remove_device(&event.meta.service, &event.data.id);
    }
}

#[cfg(test)]
mod tests {
    use crate::auth::ResolvedIdentity;
    use crate::events::ChannelEventStream;

    use super::*;

    const TOPIC: &str = "acme.device-manager.device";

    fn pattern() -> Regex {
        Regex::new(r".+\.device-manager\.device").unwrap()
    }

    fn listener_with_cache() -> (Arc<ChannelEventStream>, Arc<IdentityCache>, CacheInvalidationListener) {
        let stream = Arc::new(ChannelEventStream::new());
        let cache = Arc::new(IdentityCache::new(16));
        let listener = CacheInvalidationListener::new(
            Arc::clone(&stream) as Arc<dyn EventStream>,
            Arc::clone(&cache),
            pattern(),
        );
        (stream, cache, listener)
    }

    #[tokio::test]
    async fn remove_event_evicts_the_device() {
        let (stream, cache, listener) = listener_with_cache();
        cache.put("fp-1", ResolvedIdentity::new("acme", "dev1"));

        let shutdown = CancellationToken::new();
        let listener = Arc::new(listener);
        let task = {
            let listener = Arc::clone(&listener);
            let shutdown = shutdown.clone();
            tokio::spawn(async move { listener.run(shutdown).await })
        };

        // Give the run loop a chance to register.
        tokio::task::yield_now().await;
        stream
            .emit(
                TOPIC,
                br#"{"event":"remove","meta":{"service":"acme"},"data":{"id":"dev1"}}"#,
            )
            .await;

        // Wait for the eviction to land.
        for _ in 0..50 {
            if cache.get("fp-1").is_none() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(cache.get("fp-1").is_none());

        shutdown.cancel();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn non_remove_events_are_ignored() {
        let (_, cache, listener) = listener_with_cache();
        cache.put("fp-1", ResolvedIdentity::new("acme", "dev1"));

        listener.handle_payload(br#"{"event":"create","meta":{"service":"acme"},"data":{"id":"dev1"}}"#);
        assert!(cache.get("fp-1").is_some());
    }

    #[tokio::test]
    async fn malformed_payloads_are_dropped() {
        let (_, cache, listener) = listener_with_cache();
        cache.put("fp-1", ResolvedIdentity::new("acme", "dev1"));

        listener.handle_payload(b"not json at all");
        listener.handle_payload(br#"{"event":"remove"}"#);
        assert!(cache.get("fp-1").is_some());
    }

    #[tokio::test]
    async fn remove_for_never_cached_device_is_a_noop() {
        let (_, _, listener) = listener_with_cache();
        // Must not panic or error.
        listener.handle_payload(br#"{"event":"remove","meta":{"service":"ghost"},"data":{"id":"none"}}"#);
    }

    #[tokio::test]
    async fn reregistration_releases_the_previous_subscription() {
        let (stream, _, listener) = listener_with_cache();

        let first = listener.register().await.unwrap();
        let second = listener.register().await.unwrap();
        assert_ne!(first.id, second.id);

        // The first subscription was released; only the second receives.
        let mut first = first;
        let mut second = second;
        stream.emit(TOPIC, b"payload").await;
        assert!(first.events.recv().await.is_none());
        assert_eq!(second.events.recv().await.unwrap(), b"payload");

        listener.unregister().await;
        listener.unregister().await; // idempotent
    }
}
