// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Downstream publishing seam.
//!
//! The gateway's job ends once a message is authorized and annotated; the
//! actual pipeline transport lives behind [`TelemetryPublisher`]. The
//! default implementation only logs the enveloped message, which keeps the
//! gateway runnable stand-alone and the seam honest in tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::auth::ResolvedIdentity;
use crate::models::IncomingMessage;

#[derive(Debug, thiserror::Error)]
#[error("downstream publish failed: {0}")]
pub struct PublishError(pub String);

/// Envelope handed to the pipeline for every accepted reading.
#[derive(Debug, Serialize)]
pub struct TelemetryEnvelope {
    pub message_id: Uuid,
    pub tenant: String,
    pub device_id: String,
    /// Device-reported timestamp, when present.
    pub ts: Option<DateTime<Utc>>,
    /// Gateway receive time.
    pub received_at: DateTime<Utc>,
    pub data: serde_json::Value,
}

impl TelemetryEnvelope {
    pub fn new(identity: &ResolvedIdentity, message: IncomingMessage) -> Self {
        Self {
            message_id: Uuid::new_v4(),
            tenant: identity.tenant.clone(),
            device_id: identity.device_id.clone(),
            ts: message.ts,
            received_at: Utc::now(),
            data: message.data,
        }
    }
}

/// Hands authorized messages to the downstream pipeline.
#[async_trait]
pub trait TelemetryPublisher: Send + Sync {
    async fn publish(
        &self,
        identity: &ResolvedIdentity,
        message: IncomingMessage,
    ) -> Result<(), PublishError>;
}

/// Stand-in publisher that records accepted messages in the log.
pub struct LogPublisher;

#[async_trait]
impl TelemetryPublisher for LogPublisher {
    async fn publish(
        &self,
        identity: &ResolvedIdentity,
        message: IncomingMessage,
    ) -> Result<(), PublishError> {
        let envelope = TelemetryEnvelope::new(identity, message);
        info!(
            message_id = %envelope.message_id,
            tenant = %envelope.tenant,
            device_id = %envelope.device_id,
            "telemetry message accepted"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn log_publisher_accepts_messages() {
        let identity = ResolvedIdentity::new("acme", "dev1");
        let message = IncomingMessage {
            ts: None,
            data: serde_json::json!({"temperature": 25.79}),
        };
        LogPublisher.publish(&identity, message).await.unwrap();
    }

    #[test]
    fn envelope_carries_identity_and_payload() {
        let identity = ResolvedIdentity::new("acme", "dev1");
        let message = IncomingMessage {
            ts: None,
            data: serde_json::json!({"temperature": 25.79}),
        };
        let envelope = TelemetryEnvelope::new(&identity, message);
        assert_eq!(envelope.tenant, "acme");
        assert_eq!(envelope.device_id, "dev1");
        assert_eq!(envelope.data["temperature"], 25.79);
    }
}
