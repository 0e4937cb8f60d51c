// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use utoipa::ToSchema;

use crate::state::AppState;

/// Readiness response with individual component status.
#[derive(Debug, Serialize, ToSchema)]
pub struct ReadyResponse {
    /// Overall health status ("ok" or "degraded").
    pub status: String,
    /// Individual health checks and their results.
    pub checks: HealthChecks,
}

/// Individual health check results.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthChecks {
    /// Whether the service process is running.
    pub service: String,
    /// Lifecycle stream connectivity.
    /// Only present when a lifecycle stream is configured.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lifecycle_stream: Option<String>,
}

/// Simple health check response for liveness probes.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
}

/// Check lifecycle stream connectivity, when a listener is configured.
async fn check_lifecycle_stream(state: &AppState) -> Option<String> {
    match &state.listener {
        Some(listener) => {
            if listener.is_connected().await {
                Some("ok".to_string())
            } else {
                Some("disconnected".to_string())
            }
        }
        None => None,
    }
}

/// Liveness probe handler.
///
/// Always returns 200 if the process is running.
/// Does not check dependencies - use readiness for that.
#[utoipa::path(
    get,
    path = "/health",
    tag = "Health",
    responses(
        (status = 200, description = "Service is alive", body = HealthResponse)
    )
)]
pub async fn liveness() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

/// Readiness probe handler.
///
/// Returns 200 only when the gateway can serve its purpose: a configured
/// but disconnected lifecycle stream degrades readiness because cache
/// invalidation is not keeping up with device removals.
#[utoipa::path(
    get,
    path = "/health/ready",
    tag = "Health",
    responses(
        (status = 200, description = "Service is ready", body = ReadyResponse),
        (status = 503, description = "Service is not ready", body = ReadyResponse)
    )
)]
pub async fn readiness(State(state): State<AppState>) -> (StatusCode, Json<ReadyResponse>) {
    let lifecycle_stream = check_lifecycle_stream(&state).await;
    let stream_ok = lifecycle_stream.as_ref().map(|s| s == "ok").unwrap_or(true);

    let response = ReadyResponse {
        status: if stream_ok { "ok" } else { "degraded" }.to_string(),
        checks: HealthChecks {
            service: "ok".to_string(),
            lifecycle_stream,
        },
    };

    let status = if stream_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status, Json(response))
}
