// SPDX-FileCopyrightText: 2026 Hearth Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Gateway HTTP server built on axum.
//!
//! Binds to loopback only. `GET /health` answers unauthenticated; the
//! WebSocket upgrade on the same port carries everything else behind the
//! token handshake.

use std::collections::HashMap;
use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    Json, Router,
    extract::{State, ws::Message},
    routing::get,
};
use dashmap::DashMap;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;

use hearth_agent::ActiveRuns;
use hearth_config::HearthConfig;
use hearth_core::{ChatProvider, HearthError};
use hearth_security::{AuditLog, SecretFilter};
use hearth_session::SessionStore;
use hearth_storage::Database;
use hearth_tools::{ApprovalCoordinator, JobScheduler, ToolRegistry};

use crate::ws;

/// Shared state for every connection handler.
#[derive(Clone)]
pub struct GatewayState {
    /// Expected auth token (environment-sourced). `None` rejects every
    /// handshake (fail-closed).
    pub token: Option<String>,
    /// Process start time for uptime reporting.
    pub start_time: Instant,
    pub config: HearthConfig,
    pub workspace: PathBuf,
    pub sessions: Arc<SessionStore>,
    pub tools: Arc<ToolRegistry>,
    pub providers: Arc<HashMap<String, Arc<dyn ChatProvider>>>,
    pub approvals: Arc<ApprovalCoordinator>,
    pub active_runs: Arc<ActiveRuns>,
    pub scheduler: Arc<dyn JobScheduler>,
    pub db: Database,
    pub audit: Arc<AuditLog>,
    pub filter: Arc<SecretFilter>,
    /// connection id -> socket writer, for server-wide broadcasts
    /// (`scheduler.run_completed`).
    pub ws_senders: Arc<DashMap<String, mpsc::Sender<Message>>>,
}

impl GatewayState {
    /// Fan-out push emitter delivering one event to every authenticated
    /// connection. Best-effort: closed or backlogged sockets are skipped.
    pub fn broadcast_fn(&self) -> Arc<dyn Fn(&str, serde_json::Value) + Send + Sync> {
        let senders = self.ws_senders.clone();
        Arc::new(move |event: &str, data: serde_json::Value| {
            let frame = serde_json::json!({"event": event, "data": data}).to_string();
            for sender in senders.iter() {
                let _ = sender.value().try_send(Message::Text(frame.clone().into()));
            }
        })
    }
}

impl std::fmt::Debug for GatewayState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayState")
            .field("token", &self.token.as_ref().map(|_| "[redacted]"))
            .field("workspace", &self.workspace)
            .field("connections", &self.ws_senders.len())
            .finish()
    }
}

/// Starts the gateway and serves until `shutdown` fires.
pub async fn start_server(
    state: GatewayState,
    shutdown: CancellationToken,
) -> Result<(), HearthError> {
    let host = state.config.gateway.host.clone();
    let port = state.config.gateway.port;

    if !is_loopback_host(&host) {
        return Err(HearthError::Gateway {
            message: format!("refusing to bind non-loopback address {host}"),
            source: None,
        });
    }

    let app = Router::new()
        .route("/health", get(get_health))
        .route("/ws", get(ws::ws_handler))
        .with_state(state)
        .layer(CorsLayer::permissive());

    let addr = format!("{host}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| HearthError::Gateway {
            message: format!("failed to bind gateway to {addr}: {e}"),
            source: Some(Box::new(e)),
        })?;

    tracing::info!("gateway listening on {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .map_err(|e| HearthError::Gateway {
            message: format!("gateway server error: {e}"),
            source: Some(Box::new(e)),
        })
}

/// Unauthenticated health endpoint.
async fn get_health(State(state): State<GatewayState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "uptime": state.start_time.elapsed().as_secs(),
    }))
}

/// Whether a configured bind host names loopback.
pub(crate) fn is_loopback_host(host: &str) -> bool {
    if host.eq_ignore_ascii_case("localhost") {
        return true;
    }
    let trimmed = host.trim_start_matches('[').trim_end_matches(']');
    trimmed
        .parse::<IpAddr>()
        .map(|ip| ip.is_loopback())
        .unwrap_or(false)
}
