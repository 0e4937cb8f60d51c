// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

mod api;
mod auth;
mod cache;
mod clients;
mod config;
mod error;
mod events;
mod models;
mod publish;
mod state;

#[cfg(not(test))]
use std::{net::SocketAddr, sync::Arc};

#[cfg(not(test))]
use tokio_util::sync::CancellationToken;
#[cfg(not(test))]
use tracing::info;
#[cfg(not(test))]
use tracing_subscriber::EnvFilter;

#[cfg(not(test))]
use api::router;
#[cfg(not(test))]
use auth::{AuthModeResolver, DeviceValidationGate, IdentificationService};
#[cfg(not(test))]
use cache::IdentityCache;
#[cfg(not(test))]
use clients::{HttpCertificateAclService, HttpDeviceAuthService, HttpDeviceRegistryService};
#[cfg(not(test))]
use config::GatewayConfig;
#[cfg(not(test))]
use events::{CacheInvalidationListener, HttpEventStream};
#[cfg(not(test))]
use publish::LogPublisher;
#[cfg(not(test))]
use state::AppState;

#[cfg(not(test))]
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match std::env::var("LOG_FORMAT").as_deref() {
        Ok("json") => builder.json().init(),
        _ => builder.init(),
    }
}

#[cfg(not(test))]
#[tokio::main]
async fn main() {
    init_tracing();

    // Bad configuration must never let the gateway start in a weaker
    // security posture than the operator intended.
    let config = GatewayConfig::from_env().expect("Failed to load configuration");

    let cache = Arc::new(IdentityCache::new(config.cache_capacity));
    let identification = Arc::new(IdentificationService::new(
        AuthModeResolver::new(config.security.clone()),
        Arc::clone(&cache),
        Arc::new(HttpCertificateAclService::new(&config.certificate_acl_url)),
        Arc::new(HttpDeviceAuthService::new(&config.device_auth_url)),
    ));
    let device_gate = Arc::new(DeviceValidationGate::new(
        Arc::new(HttpDeviceRegistryService::new(&config.device_manager_url)),
        Arc::clone(&cache),
    ));

    let shutdown = CancellationToken::new();

    let listener = config.lifecycle_stream_url.as_ref().map(|url| {
        Arc::new(CacheInvalidationListener::new(
            Arc::new(HttpEventStream::new(url)),
            Arc::clone(&cache),
            config.lifecycle_topic_pattern.clone(),
        ))
    });
    let listener_task = listener.as_ref().map(|listener| {
        let listener = Arc::clone(listener);
        let shutdown = shutdown.clone();
        tokio::spawn(async move { listener.run(shutdown).await })
    });
    if listener.is_none() {
        info!("no lifecycle stream configured, cache invalidation listener disabled");
    }

    let state = AppState::new(
        identification,
        device_gate,
        cache,
        Arc::new(LogPublisher),
        listener,
    );
    let app = router(state);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .expect("Failed to parse bind address");

    info!(
        %addr,
        unsecure_mode = config.security.unsecure_mode,
        mode = %config.security.authorization_mode,
        "ingest gateway listening (docs at /docs)"
    );

    let tcp = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind listen address");
    axum::serve(tcp, app)
        .with_graceful_shutdown({
            let shutdown = shutdown.clone();
            async move {
                let _ = tokio::signal::ctrl_c().await;
                info!("shutdown signal received");
                shutdown.cancel();
            }
        })
        .await
        .expect("HTTP server failed");

    if let Some(task) = listener_task {
        let _ = task.await;
    }
}
