// SPDX-FileCopyrightText: 2026 Hearth Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! JSON-RPC method dispatch.
//!
//! Every method validates its params through a typed serde struct before the
//! handler runs; schema failures map to −32602 with the offending field
//! named. Streaming methods return synchronously (`chat.send` -> `{runId}`)
//! and deliver results as push events on the same connection.

use serde::Deserialize;
use serde::de::DeserializeOwned;
use uuid::Uuid;

use hearth_core::HearthError;
use hearth_session::{TranscriptEvent, TranscriptRole};
use hearth_storage::queries;
use hearth_tools::{JobScheduler as _, PushFn};

use crate::chat;
use crate::proto::{RpcError, RpcRequest, RpcResponse};
use crate::server::GatewayState;

/// Dispatches one validated request frame and returns its response frame.
pub async fn dispatch(state: &GatewayState, push: &PushFn, request: RpcRequest) -> RpcResponse {
    let id = request.id.clone();
    match handle(state, push, &request.method, request.params).await {
        Ok(result) => RpcResponse::ok(id, result),
        Err(error) => RpcResponse::err(Some(id), error),
    }
}

async fn handle(
    state: &GatewayState,
    push: &PushFn,
    method: &str,
    params: serde_json::Value,
) -> Result<serde_json::Value, RpcError> {
    match method {
        "health.check" => Ok(serde_json::json!({
            "status": "ok",
            "uptime": state.start_time.elapsed().as_secs(),
        })),

        "agents.list" => {
            let agents = hearth_agent::list_agents(&state.workspace).await;
            let agents: Vec<serde_json::Value> = agents
                .iter()
                .map(|agent| {
                    let model = if agent.provider.is_empty() {
                        None
                    } else {
                        Some(format!("{}/{}", agent.provider, agent.model))
                    };
                    serde_json::json!({
                        "id": agent.id,
                        "model": model,
                        "description": agent.description,
                    })
                })
                .collect();
            Ok(serde_json::json!({"agents": agents}))
        }

        "sessions.create" => {
            let p: SessionsCreateParams = parse_params(params)?;
            let agent_id = p
                .agent_id
                .unwrap_or_else(|| state.config.agents.default.clone());
            let meta = state.sessions.create(&agent_id).await.map_err(internal)?;
            Ok(serde_json::json!({"sessionKey": meta.session_key, "meta": meta}))
        }

        "sessions.list" => {
            let sessions = state.sessions.list().await.map_err(internal)?;
            Ok(serde_json::json!({"sessions": sessions}))
        }

        "sessions.get" => {
            let p: SessionKeyParams = parse_params(params)?;
            require_uuid(&p.session_key, "sessionKey")?;
            let session = state
                .sessions
                .get(&p.session_key)
                .await
                .map_err(internal)?
                .ok_or_else(|| RpcError::internal("session not found"))?;
            let messages = state
                .sessions
                .read_events(&p.session_key, None)
                .await
                .map_err(internal)?;
            Ok(serde_json::json!({"session": session, "messages": messages}))
        }

        "chat.send" => chat_send(state, push, params).await,

        "chat.history" => {
            let p: ChatHistoryParams = parse_params(params)?;
            require_uuid(&p.session_key, "sessionKey")?;
            let limit = bounded(p.limit, 100, 1, 500, "limit")?;
            state
                .sessions
                .get(&p.session_key)
                .await
                .map_err(internal)?
                .ok_or_else(|| RpcError::internal("session not found"))?;
            let messages = state
                .sessions
                .read_events(&p.session_key, Some(limit))
                .await
                .map_err(internal)?;
            Ok(serde_json::json!({"messages": messages}))
        }

        "chat.abort" => {
            let p: RunIdParams = parse_params(params)?;
            require_uuid(&p.run_id, "runId")?;
            if state.active_runs.abort(&p.run_id) {
                Ok(serde_json::json!({"ok": true}))
            } else {
                Err(RpcError::invalid_params(format!(
                    "unknown runId: {}",
                    p.run_id
                )))
            }
        }

        "exec.approve" => {
            let p: ApprovalIdParams = parse_params(params)?;
            require_uuid(&p.approval_id, "approvalId")?;
            if state.approvals.resolve(&p.approval_id) {
                Ok(serde_json::json!({"ok": true}))
            } else {
                Err(RpcError::invalid_params(format!(
                    "unknown approvalId: {}",
                    p.approval_id
                )))
            }
        }

        "exec.deny" => {
            let p: DenyParams = parse_params(params)?;
            require_uuid(&p.approval_id, "approvalId")?;
            if state.approvals.reject(&p.approval_id, p.reason) {
                Ok(serde_json::json!({"ok": true}))
            } else {
                Err(RpcError::invalid_params(format!(
                    "unknown approvalId: {}",
                    p.approval_id
                )))
            }
        }

        "memory.search" => {
            let p: MemorySearchParams = parse_params(params)?;
            if p.query.is_empty() {
                return Err(RpcError::invalid_params("query must not be empty"));
            }
            let k = bounded(p.k, 10, 1, 50, "k")?;
            let results = queries::memory::search_memory(&state.db, &p.query, k)
                .await
                .map_err(internal)?;
            Ok(serde_json::json!({"results": results}))
        }

        "scheduler.list" => {
            let p: SchedulerListParams = parse_params(params)?;
            let jobs = state
                .scheduler
                .list_jobs(p.enabled_only.unwrap_or(false))
                .await
                .map_err(internal)?;
            Ok(serde_json::json!({"jobs": jobs}))
        }

        "scheduler.get" => {
            let p: JobIdOnlyParams = parse_params(params)?;
            let job = state
                .scheduler
                .get_job(&p.id)
                .await
                .map_err(internal)?
                .ok_or_else(|| {
                    RpcError::invalid_params(format!("unknown job id: {}", p.id))
                })?;
            Ok(serde_json::json!({"job": job}))
        }

        "scheduler.runs" => {
            let p: SchedulerRunsParams = parse_params(params)?;
            let limit = bounded(p.limit, 20, 1, 100, "limit")?;
            let runs = state
                .scheduler
                .recent_runs(&p.job_id, limit)
                .await
                .map_err(internal)?;
            Ok(serde_json::json!({"runs": runs}))
        }

        _ => Err(RpcError::method_not_found(method)),
    }
}

async fn chat_send(
    state: &GatewayState,
    push: &PushFn,
    params: serde_json::Value,
) -> Result<serde_json::Value, RpcError> {
    let p: ChatSendParams = parse_params(params)?;
    require_uuid(&p.session_key, "sessionKey")?;
    let length = p.message.chars().count();
    if length == 0 || length > 32_000 {
        return Err(RpcError::invalid_params(
            "message must be between 1 and 32000 characters",
        ));
    }

    let session = state
        .sessions
        .get(&p.session_key)
        .await
        .map_err(internal)?
        .ok_or_else(|| RpcError::internal("session not found"))?;

    let run_id = Uuid::new_v4().to_string();
    state
        .sessions
        .append_event(
            &p.session_key,
            &TranscriptEvent::now(TranscriptRole::User, &p.message).with_run_id(&run_id),
        )
        .await
        .map_err(internal)?;

    let cancel = state.active_runs.insert(&run_id);
    tokio::spawn(chat::run_chat(
        state.clone(),
        push.clone(),
        session,
        run_id.clone(),
        cancel,
    ));

    Ok(serde_json::json!({"runId": run_id}))
}

// --- param shapes ---

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct SessionsCreateParams {
    #[serde(default)]
    agent_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct SessionKeyParams {
    session_key: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct ChatSendParams {
    session_key: String,
    message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct ChatHistoryParams {
    session_key: String,
    #[serde(default)]
    limit: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct RunIdParams {
    run_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct ApprovalIdParams {
    approval_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct DenyParams {
    approval_id: String,
    #[serde(default)]
    reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct MemorySearchParams {
    query: String,
    #[serde(default)]
    k: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct SchedulerListParams {
    #[serde(default)]
    enabled_only: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct JobIdOnlyParams {
    id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct SchedulerRunsParams {
    job_id: String,
    #[serde(default)]
    limit: Option<u64>,
}

// --- helpers ---

fn parse_params<T: DeserializeOwned>(params: serde_json::Value) -> Result<T, RpcError> {
    let params = if params.is_null() {
        serde_json::Value::Object(serde_json::Map::new())
    } else {
        params
    };
    serde_json::from_value(params)
        .map_err(|e| RpcError::invalid_params(format!("invalid params: {e}")))
}

fn require_uuid(value: &str, field: &str) -> Result<(), RpcError> {
    Uuid::parse_str(value)
        .map(|_| ())
        .map_err(|_| RpcError::invalid_params(format!("{field} must be a UUID")))
}

fn bounded(
    value: Option<u64>,
    default: u64,
    min: u64,
    max: u64,
    field: &str,
) -> Result<usize, RpcError> {
    let value = value.unwrap_or(default);
    if value < min || value > max {
        return Err(RpcError::invalid_params(format!(
            "{field} must be between {min} and {max}"
        )));
    }
    Ok(value as usize)
}

fn internal(e: HearthError) -> RpcError {
    RpcError::internal(e.to_string())
}
