// SPDX-FileCopyrightText: 2026 Hearth Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `hearth serve` command implementation.
//!
//! Wires every component together: config, secret filter, audit log,
//! storage, session store, providers, tool registry, scheduler engine, and
//! the gateway. Shuts down gracefully on SIGINT, draining the browser and
//! closing the database.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use hearth_agent::ActiveRuns;
use hearth_anthropic::AnthropicProvider;
use hearth_core::{ChatProvider, HearthError};
use hearth_gateway::{GatewayState, start_server};
use hearth_openai::OpenAiProvider;
use hearth_scheduler::SchedulerEngine;
use hearth_security::{AuditLog, SecretFilter};
use hearth_session::SessionStore;
use hearth_storage::Database;
use hearth_tools::{ApprovalCoordinator, BrowserManager, JobScheduler, ToolRegistry};

/// Runs the gateway until SIGINT.
pub async fn run_serve(data_dir: Option<PathBuf>) -> Result<(), HearthError> {
    let data_dir = resolve_data_dir(data_dir)?;
    std::fs::create_dir_all(&data_dir).map_err(|e| {
        HearthError::Config(format!("failed to create data dir {}: {e}", data_dir.display()))
    })?;

    let config = hearth_config::load_config(&data_dir)
        .map_err(|e| HearthError::Config(format!("failed to load config: {e}")))?;
    init_tracing();

    info!(data_dir = %data_dir.display(), "starting hearth serve");

    // The gateway token is environment-only; without it every handshake
    // fails, so refuse to start instead.
    let token = hearth_config::gateway_token();
    if token.is_none() {
        return Err(HearthError::Config(format!(
            "no gateway token configured. Set the {} environment variable.",
            hearth_config::GATEWAY_TOKEN_ENV
        )));
    }

    let filter = Arc::new(SecretFilter::from_env(config.security.secrets_filter));
    let audit = Arc::new(AuditLog::open(
        data_dir.join("audit.jsonl"),
        config.security.audit_log,
    ));

    let db_path = data_dir.join("memory.db");
    let db = Database::open(db_path.to_str().ok_or_else(|| {
        HearthError::Config(format!("non-UTF-8 database path {}", db_path.display()))
    })?)
    .await?;

    let sessions = Arc::new(SessionStore::open(data_dir.join("sessions"))?);

    let workspace = config
        .agents
        .workspace_path
        .as_ref()
        .map(PathBuf::from)
        .unwrap_or_else(|| data_dir.join("workspace"));
    std::fs::create_dir_all(&workspace).map_err(|e| {
        HearthError::Config(format!(
            "failed to create workspace {}: {e}",
            workspace.display()
        ))
    })?;

    let providers = build_providers()?;
    if providers.is_empty() {
        warn!("no provider API keys found; chat turns will fail until one is set");
    }
    let providers = Arc::new(providers);

    let browser = Arc::new(BrowserManager::new());
    let mut registry = ToolRegistry::new();
    hearth_tools::register_builtins(&mut registry, browser.clone());
    let tools = Arc::new(registry);
    info!(tools = tools.len(), "tool registry initialized");

    let engine = SchedulerEngine::new(
        db.clone(),
        providers.clone(),
        sessions.clone(),
        tools.clone(),
        audit.clone(),
        filter.clone(),
        config.clone(),
        workspace.clone(),
    );

    let state = GatewayState {
        token,
        start_time: Instant::now(),
        config,
        workspace,
        sessions,
        tools,
        providers,
        approvals: Arc::new(ApprovalCoordinator::new()),
        active_runs: Arc::new(ActiveRuns::new()),
        scheduler: engine.clone() as Arc<dyn JobScheduler>,
        db: db.clone(),
        audit,
        filter,
        ws_senders: Arc::new(dashmap::DashMap::new()),
    };

    // Scheduler broadcasts fan out to every authenticated connection.
    engine.set_broadcast(state.broadcast_fn());
    engine.start().await?;

    let shutdown = CancellationToken::new();
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("shutdown signal received");
                shutdown.cancel();
            }
        });
    }

    start_server(state, shutdown).await?;

    engine.stop();
    browser.close_all().await;
    db.close().await?;
    info!("hearth serve shutdown complete");
    Ok(())
}

/// Builds the provider map from environment credentials.
fn build_providers() -> Result<HashMap<String, Arc<dyn ChatProvider>>, HearthError> {
    let mut providers: HashMap<String, Arc<dyn ChatProvider>> = HashMap::new();
    if let Some(anthropic) = AnthropicProvider::from_env()? {
        info!("anthropic provider configured");
        providers.insert("anthropic".into(), Arc::new(anthropic));
    }
    if let Some(openai) = OpenAiProvider::from_env()? {
        info!("openai provider configured");
        providers.insert("openai".into(), Arc::new(openai));
    }
    Ok(providers)
}

/// Default data directory: `<platform data dir>/hearth`.
pub(crate) fn resolve_data_dir(explicit: Option<PathBuf>) -> Result<PathBuf, HearthError> {
    if let Some(dir) = explicit {
        return Ok(dir);
    }
    dirs::data_dir()
        .map(|dir| dir.join("hearth"))
        .ok_or_else(|| HearthError::Config("could not determine the platform data directory".into()))
}

/// Initializes the tracing subscriber.
fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("hearth=info,warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();
}
