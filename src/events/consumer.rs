// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Event stream consumption.
//!
//! [`EventStream`] abstracts the external lifecycle topic: subscription by
//! regex topic pattern, unsubscription, and a connectivity probe. Two
//! implementations:
//!
//! - [`ChannelEventStream`]: in-process, for tests and embedding;
//! - [`HttpEventStream`]: reads newline-delimited JSON envelopes
//!   (`{"topic": ..., "payload": ...}`) from a streaming HTTP endpoint and
//!   reconnects with a fixed delay after interruptions.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use regex::Regex;
use serde::Deserialize;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Buffered events per subscription before backpressure.
const SUBSCRIPTION_BUFFER: usize = 256;

/// Delay before reconnecting an interrupted HTTP stream.
const RECONNECT_DELAY: Duration = Duration::from_secs(5);

#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    #[error("subscription failed: {0}")]
    Subscribe(String),
}

/// A live subscription: its handle for unsubscription plus the raw event
/// payloads matching the topic pattern.
pub struct Subscription {
    pub id: u64,
    pub events: mpsc::Receiver<Vec<u8>>,
}

/// External lifecycle event stream. At most one subscription per topic
/// pattern is expected; callers release the old one before re-subscribing.
#[async_trait]
pub trait EventStream: Send + Sync {
    async fn subscribe(&self, topic_pattern: Regex) -> Result<Subscription, StreamError>;
    async fn unsubscribe(&self, id: u64);
    /// Whether the underlying transport is currently connected.
    async fn is_connected(&self) -> bool;
}

// ---------------------------------------------------------------------------
// In-process implementation
// ---------------------------------------------------------------------------

struct ChannelSubscriber {
    pattern: Regex,
    sender: mpsc::Sender<Vec<u8>>,
}

/// In-process stream: events are emitted directly by the embedding code.
/// Connectivity is simulated through [`ChannelEventStream::set_connected`].
pub struct ChannelEventStream {
    subscribers: Mutex<HashMap<u64, ChannelSubscriber>>,
    next_id: AtomicU64,
    connected: AtomicBool,
}

impl ChannelEventStream {
    pub fn new() -> Self {
        Self {
            subscribers: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            connected: AtomicBool::new(true),
        }
    }

    /// Deliver an event to every subscriber whose pattern matches `topic`.
    pub async fn emit(&self, topic: &str, payload: &[u8]) {
        let senders: Vec<mpsc::Sender<Vec<u8>>> = {
            let subscribers = self.subscribers.lock().await;
            subscribers
                .values()
                .filter(|s| s.pattern.is_match(topic))
                .map(|s| s.sender.clone())
                .collect()
        };
        for sender in senders {
            // A dropped receiver just means the subscription is gone.
            let _ = sender.send(payload.to_vec()).await;
        }
    }

    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }
}

impl Default for ChannelEventStream {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventStream for ChannelEventStream {
    async fn subscribe(&self, topic_pattern: Regex) -> Result<Subscription, StreamError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let (sender, events) = mpsc::channel(SUBSCRIPTION_BUFFER);
        self.subscribers.lock().await.insert(
            id,
            ChannelSubscriber {
                pattern: topic_pattern,
                sender,
            },
        );
        Ok(Subscription { id, events })
    }

    async fn unsubscribe(&self, id: u64) {
        self.subscribers.lock().await.remove(&id);
    }

    async fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

// ---------------------------------------------------------------------------
// HTTP NDJSON implementation
// ---------------------------------------------------------------------------

/// One line on the NDJSON stream.
#[derive(Deserialize)]
struct EventEnvelope {
    topic: String,
    payload: serde_json::Value,
}

/// Streams lifecycle events from an HTTP endpoint emitting one JSON
/// envelope per line. Each subscription owns a reader task that reconnects
/// after stream interruptions until the receiver is dropped or the
/// subscription is released.
pub struct HttpEventStream {
    url: String,
    client: reqwest::Client,
    connected: Arc<AtomicBool>,
    next_id: AtomicU64,
    readers: Mutex<HashMap<u64, JoinHandle<()>>>,
}

impl HttpEventStream {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            // No overall timeout: the stream is long-lived by design.
            client: reqwest::Client::new(),
            connected: Arc::new(AtomicBool::new(false)),
            next_id: AtomicU64::new(1),
            readers: Mutex::new(HashMap::new()),
        }
    }

    async fn read_loop(
        client: reqwest::Client,
        url: String,
        pattern: Regex,
        sender: mpsc::Sender<Vec<u8>>,
        connected: Arc<AtomicBool>,
    ) {
        loop {
            match client.get(&url).send().await {
                Ok(response) if response.status().is_success() => {
                    connected.store(true, Ordering::SeqCst);
                    let mut stream = response.bytes_stream();
                    let mut buffer: Vec<u8> = Vec::new();
                    while let Some(chunk) = stream.next().await {
                        let chunk = match chunk {
                            Ok(chunk) => chunk,
                            Err(e) => {
                                warn!(error = %e, "lifecycle stream read error");
                                break;
                            }
                        };
                        buffer.extend_from_slice(&chunk);
                        while let Some(pos) = buffer.iter().position(|b| *b == b'\n') {
                            let line: Vec<u8> = buffer.drain(..=pos).collect();
                            if !Self::forward_line(&line, &pattern, &sender).await {
                                connected.store(false, Ordering::SeqCst);
                                return;
                            }
                        }
                    }
                }
                Ok(response) => {
                    warn!(status = %response.status(), "lifecycle stream endpoint refused");
                }
                Err(e) => {
                    warn!(error = %e, "lifecycle stream connection failed");
                }
            }

            connected.store(false, Ordering::SeqCst);
            if sender.is_closed() {
                return;
            }
            tokio::time::sleep(RECONNECT_DELAY).await;
        }
    }

    /// Parse one envelope line and forward matching payloads. Returns
    /// `false` once the receiver is gone.
    async fn forward_line(line: &[u8], pattern: &Regex, sender: &mpsc::Sender<Vec<u8>>) -> bool {
        if line.iter().all(u8::is_ascii_whitespace) {
            return true;
        }
        match serde_json::from_slice::<EventEnvelope>(line) {
            Ok(envelope) if pattern.is_match(&envelope.topic) => {
                let payload = match serde_json::to_vec(&envelope.payload) {
                    Ok(payload) => payload,
                    Err(_) => return true,
                };
                sender.send(payload).await.is_ok()
            }
            Ok(envelope) => {
                debug!(topic = %envelope.topic, "ignoring event from unmatched topic");
                true
            }
            Err(e) => {
                warn!(error = %e, "dropping malformed stream envelope");
                true
            }
        }
    }
}

#[async_trait]
impl EventStream for HttpEventStream {
    async fn subscribe(&self, topic_pattern: Regex) -> Result<Subscription, StreamError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let (sender, events) = mpsc::channel(SUBSCRIPTION_BUFFER);
        let handle = tokio::spawn(Self::read_loop(
            self.client.clone(),
            self.url.clone(),
            topic_pattern,
            sender,
            Arc::clone(&self.connected),
        ));
        self.readers.lock().await.insert(id, handle);
        Ok(Subscription { id, events })
    }

    async fn unsubscribe(&self, id: u64) {
        if let Some(handle) = self.readers.lock().await.remove(&id) {
            handle.abort();
        }
    }

    async fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pattern() -> Regex {
        Regex::new(r".+\.device-manager\.device").unwrap()
    }

    #[tokio::test]
    async fn channel_stream_delivers_matching_topics_only() {
        let stream = ChannelEventStream::new();
        let mut sub = stream.subscribe(pattern()).await.unwrap();

        stream.emit("acme.device-manager.device", b"match").await;
        stream.emit("acme.telemetry.data", b"no-match").await;

        assert_eq!(sub.events.recv().await.unwrap(), b"match");
        assert!(sub.events.try_recv().is_err());
    }

    #[tokio::test]
    async fn unsubscribe_stops_delivery() {
        let stream = ChannelEventStream::new();
        let mut sub = stream.subscribe(pattern()).await.unwrap();
        stream.unsubscribe(sub.id).await;

        stream.emit("acme.device-manager.device", b"late").await;
        // Sender side is gone; the channel reports closed.
        assert!(sub.events.recv().await.is_none());
    }

    #[tokio::test]
    async fn connectivity_probe_reflects_state() {
        let stream = ChannelEventStream::new();
        assert!(stream.is_connected().await);
        stream.set_connected(false);
        assert!(!stream.is_connected().await);
    }

    #[tokio::test]
    async fn forward_line_drops_malformed_envelopes() {
        let (sender, mut events) = mpsc::channel(4);
        assert!(HttpEventStream::forward_line(b"not json\n", &pattern(), &sender).await);
        assert!(events.try_recv().is_err());

        let line = br#"{"topic":"acme.device-manager.device","payload":{"event":"remove"}}
"#;
        assert!(HttpEventStream::forward_line(line, &pattern(), &sender).await);
        let payload = events.try_recv().unwrap();
        let value: serde_json::Value = serde_json::from_slice(&payload).unwrap();
        assert_eq!(value["event"], "remove");
    }
}
