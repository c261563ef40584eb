// SPDX-FileCopyrightText: 2026 Hearth Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Live chat execution: one spawned task per accepted `chat.send`.
//!
//! The task resolves the session's agent, replays the transcript as provider
//! messages (user and assistant roles only; prior tool results are not
//! model-visible), runs the agent turn, forwards every provider event as a
//! push event tagged with the runId, and persists the assistant's text.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use hearth_agent::{ToolDispatcher, TurnOptions, run_turn};
use hearth_core::{ChatEvent, ChatMessage, HearthError};
use hearth_security::{AuditEvent, AuditKind, AuditLog, SecretFilter};
use hearth_session::{SessionMeta, TranscriptEvent, TranscriptRole};
use hearth_tools::{PushFn, ToolContext, ToolRegistry};

use crate::server::GatewayState;

/// Runs one chat turn to completion and clears the active-run entry.
pub(crate) async fn run_chat(
    state: GatewayState,
    push: PushFn,
    session: SessionMeta,
    run_id: String,
    cancel: CancellationToken,
) {
    if let Err(e) = run_chat_inner(&state, &push, &session, &run_id, cancel).await {
        error!(run = run_id.as_str(), error = %e, "chat run failed");
        push.as_ref()(
            "chat.error",
            serde_json::json!({"runId": run_id, "message": e.to_string()}),
        );
    }
    state.active_runs.remove(&run_id);
}

async fn run_chat_inner(
    state: &GatewayState,
    push: &PushFn,
    session: &SessionMeta,
    run_id: &str,
    cancel: CancellationToken,
) -> Result<(), HearthError> {
    let binding = hearth_agent::resolve_agent(&state.workspace, &session.agent_id).await;
    let (provider, model) = hearth_agent::select_provider(
        binding.as_ref(),
        &state.providers,
        &state.config.agents.provider_fallback,
    )?;
    let system_prompt =
        hearth_agent::compose_system_prompt(&state.workspace, &session.agent_id, false).await;

    let history = state
        .sessions
        .read_events(&session.session_key, None)
        .await?;
    let messages: Vec<ChatMessage> = history
        .iter()
        .filter_map(|event| match event.role {
            TranscriptRole::User => Some(ChatMessage::user(event.content.clone())),
            TranscriptRole::Assistant => Some(ChatMessage::assistant(event.content.clone())),
            TranscriptRole::ToolResult => None,
        })
        .collect();

    let ctx = ToolContext::new(
        state.approvals.clone(),
        state.audit.clone(),
        state.filter.clone(),
    )
    .with_push(push.clone())
    .with_session(&session.session_key)
    .with_run(run_id)
    .with_workspace(&state.workspace)
    .with_scheduler(state.scheduler.clone())
    .with_limits(
        Duration::from_millis(state.config.tools.timeout),
        state.config.tools.max_output_bytes,
    );

    let dispatcher = LiveDispatcher {
        tools: state.tools.clone(),
        ctx,
        filter: state.filter.clone(),
        audit: state.audit.clone(),
        sessions: state.sessions.clone(),
        push: push.clone(),
        session_key: session.session_key.clone(),
        run_id: run_id.to_string(),
    };

    let text = Arc::new(Mutex::new(String::new()));
    let sink = {
        let text = text.clone();
        let push = push.clone();
        let run_id = run_id.to_string();
        move |event: ChatEvent| match event {
            ChatEvent::Delta { text: chunk } => {
                if let Ok(mut buffer) = text.lock() {
                    buffer.push_str(&chunk);
                }
                push.as_ref()(
                    "chat.delta",
                    serde_json::json!({"runId": run_id, "text": chunk}),
                );
            }
            ChatEvent::Final { usage } => {
                push.as_ref()(
                    "chat.final",
                    serde_json::json!({"runId": run_id, "usage": usage}),
                );
            }
            ChatEvent::Error { message } => {
                push.as_ref()(
                    "chat.error",
                    serde_json::json!({"runId": run_id, "message": message}),
                );
            }
            // Tool calls surface through exec.approval_request and
            // tool.progress, not as a raw push event.
            ChatEvent::ToolCall { .. } => {}
        }
    };

    run_turn(
        provider.as_ref(),
        TurnOptions {
            model,
            system_prompt: Some(system_prompt),
            messages,
            tools: state.tools.definitions(),
            cancel,
        },
        &sink,
        &dispatcher,
    )
    .await?;

    let assistant_text = text.lock().map(|t| t.clone()).unwrap_or_default();
    if !assistant_text.is_empty() {
        state
            .sessions
            .append_event(
                &session.session_key,
                &TranscriptEvent::now(TranscriptRole::Assistant, &assistant_text)
                    .with_run_id(run_id),
            )
            .await?;
    }
    debug!(run = run_id, "chat run complete");
    Ok(())
}

/// Dispatcher for live runs: executes the tool through the approval-gated
/// context, forwards attachments, audits, and redacts output before it
/// reaches the model.
struct LiveDispatcher {
    tools: Arc<ToolRegistry>,
    ctx: ToolContext,
    filter: Arc<SecretFilter>,
    audit: Arc<AuditLog>,
    sessions: Arc<hearth_session::SessionStore>,
    push: PushFn,
    session_key: String,
    run_id: String,
}

#[async_trait]
impl ToolDispatcher for LiveDispatcher {
    async fn dispatch(&self, name: &str, input: serde_json::Value, _call_id: &str) -> String {
        let Some(tool) = self.tools.get(name) else {
            return format!("Unknown tool: {name}");
        };

        let detail = self.filter.filter(&truncate(&input.to_string(), 200));
        match tool.execute(input, &self.ctx).await {
            Ok(result) => {
                if !result.attachments.is_empty() {
                    self.push.as_ref()(
                        "tool.attachments",
                        serde_json::json!({
                            "runId": self.run_id,
                            "tool": name,
                            "attachments": result.attachments,
                        }),
                    );
                }

                let kind = if result.denied {
                    AuditKind::ToolDenied
                } else {
                    AuditKind::ToolExec
                };
                self.audit
                    .record(
                        AuditEvent::new(kind, detail)
                            .with_tool(name)
                            .with_session(&self.session_key)
                            .with_run(&self.run_id),
                    )
                    .await;

                let mut output = self.filter.filter(&result.output);
                if result.truncated {
                    output.push_str("\n[output truncated]");
                }

                // Transcript records carry the attachment count, not the
                // payloads. Best-effort: a failed append never fails the tool.
                let mut record = TranscriptEvent::now(TranscriptRole::ToolResult, &output)
                    .with_run_id(&self.run_id)
                    .with_tool_name(name);
                if !result.attachments.is_empty() {
                    record.attachment_count = Some(result.attachments.len() as u32);
                }
                if let Err(e) = self.sessions.append_event(&self.session_key, &record).await {
                    error!(run = self.run_id.as_str(), error = %e, "failed to append tool result");
                }

                output
            }
            Err(e) => {
                self.audit
                    .record(
                        AuditEvent::new(AuditKind::ToolExec, format!("failed: {e}"))
                            .with_tool(name)
                            .with_session(&self.session_key)
                            .with_run(&self.run_id),
                    )
                    .await;
                self.filter.filter(&format!("Tool {name} failed: {e}"))
            }
        }
    }
}

fn truncate(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        text.to_string()
    } else {
        text.chars().take(limit).collect()
    }
}
