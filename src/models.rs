// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Wire types for the ingestion API.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use utoipa::ToSchema;

/// One telemetry reading submitted by a device.
///
/// `data` is required; its schema is device-defined and validated
/// downstream, not by the gateway.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct IncomingMessage {
    /// Device-reported timestamp (RFC 3339).
    #[serde(default)]
    pub ts: Option<DateTime<Utc>>,
    /// Device-defined payload.
    pub data: serde_json::Value,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_field_is_required() {
        let err = serde_json::from_str::<IncomingMessage>(r#"{"ts":"2021-07-12T09:31:01.683Z"}"#);
        assert!(err.is_err());
    }

    #[test]
    fn ts_is_optional() {
        let message: IncomingMessage =
            serde_json::from_str(r#"{"data":{"temperature":25.79}}"#).unwrap();
        assert!(message.ts.is_none());
        assert_eq!(message.data["temperature"], 25.79);
    }
}
