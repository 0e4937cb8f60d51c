// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Incoming telemetry handlers.
//!
//! By the time these run, the identification middleware has already
//! resolved and validated the sender; handlers only forward the reading to
//! the downstream publisher.

use axum::{extract::State, http::StatusCode, Extension, Json};

use crate::auth::ResolvedIdentity;
use crate::error::ApiError;
use crate::models::IncomingMessage;
use crate::state::AppState;

/// Submit a single telemetry reading.
#[utoipa::path(
    post,
    path = "/v1/incoming-messages",
    tag = "Ingestion",
    request_body = IncomingMessage,
    responses(
        (status = 204, description = "Message accepted"),
        (status = 401, description = "Authentication failed"),
        (status = 403, description = "Sender not authorized"),
        (status = 503, description = "Upstream service unavailable")
    )
)]
pub async fn create_message(
    State(state): State<AppState>,
    Extension(identity): Extension<ResolvedIdentity>,
    Json(message): Json<IncomingMessage>,
) -> Result<StatusCode, ApiError> {
    state
        .publisher
        .publish(&identity, message)
        .await
        .map_err(|e| ApiError::service_unavailable(e.to_string()))?;
    Ok(StatusCode::NO_CONTENT)
}

/// Submit a batch of telemetry readings.
#[utoipa::path(
    post,
    path = "/v1/incoming-messages/create-many",
    tag = "Ingestion",
    request_body = Vec<IncomingMessage>,
    responses(
        (status = 204, description = "All messages accepted"),
        (status = 401, description = "Authentication failed"),
        (status = 403, description = "Sender not authorized"),
        (status = 503, description = "Upstream service unavailable")
    )
)]
pub async fn create_many(
    State(state): State<AppState>,
    Extension(identity): Extension<ResolvedIdentity>,
    Json(messages): Json<Vec<IncomingMessage>>,
) -> Result<StatusCode, ApiError> {
    for message in messages {
        state
            .publisher
            .publish(&identity, message)
            .await
            .map_err(|e| ApiError::service_unavailable(e.to_string()))?;
    }
    Ok(StatusCode::NO_CONTENT)
}

/// Submit a single reading over the unsecure listener path.
///
/// Identity comes from the `tenant` / `deviceId` query parameters; the
/// identification middleware only admits this when unsecure mode is
/// enabled and the request is fully credential-less.
#[utoipa::path(
    post,
    path = "/v1/unsecure/incoming-messages",
    tag = "Ingestion",
    request_body = IncomingMessage,
    params(
        ("tenant" = String, Query, description = "Out-of-band tenant"),
        ("deviceId" = String, Query, description = "Out-of-band device id")
    ),
    responses(
        (status = 204, description = "Message accepted"),
        (status = 401, description = "Authentication failed"),
        (status = 403, description = "Sender not authorized")
    )
)]
pub async fn create_unsecure_message(
    state: State<AppState>,
    identity: Extension<ResolvedIdentity>,
    message: Json<IncomingMessage>,
) -> Result<StatusCode, ApiError> {
    create_message(state, identity, message).await
}
