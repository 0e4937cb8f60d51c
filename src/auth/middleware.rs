// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Device identification middleware for Axum.
//!
//! Applied to every ingestion route. Detaches the transport metadata from
//! the request, runs identification and the device validation gate, and on
//! success annotates the request with the [`ResolvedIdentity`] extension
//! for downstream handlers. Rejections are answered directly with the
//! error's status code and JSON body.

use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    http::HeaderMap,
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::debug;

use crate::state::AppState;

use super::credentials::{IdentifyRequest, CERT_CN_HEADER, CERT_FINGERPRINT_HEADER};

/// Identification + device validation, in strict sequence, before any
/// handler runs.
pub async fn device_identification(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let identify_request = identify_request_from(request.headers(), request.uri().query());

    let identity = match state.identification.identify(&identify_request).await {
        Ok(identity) => identity,
        Err(e) => return e.into_response(),
    };

    if let Err(e) = state.device_gate.validate(&identity).await {
        return e.into_response();
    }

    debug!(
        tenant = %identity.tenant,
        device_id = %identity.device_id,
        "request identified"
    );
    request.extensions_mut().insert(identity);
    next.run(request).await
}

/// Build the framework-free identification input from request parts.
fn identify_request_from(headers: &HeaderMap, query: Option<&str>) -> IdentifyRequest {
    let header_value = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    };

    let mut tenant_param = None;
    let mut device_id_param = None;
    if let Some(query) = query {
        for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
            match key.as_ref() {
                "tenant" => tenant_param = Some(value.into_owned()),
                "deviceId" => device_id_param = Some(value.into_owned()),
                _ => {}
            }
        }
    }

    IdentifyRequest {
        certificate_fingerprint: header_value(CERT_FINGERPRINT_HEADER),
        certificate_common_name: header_value(CERT_CN_HEADER),
        authorization: header_value(AUTHORIZATION.as_str()),
        tenant_param,
        device_id_param,
    }
}
