// SPDX-FileCopyrightText: 2026 Hearth Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Tool trait, registry, and per-invocation context.
//!
//! The [`Tool`] trait is the contract every built-in implements. The
//! [`ToolRegistry`] is an insertion-order map from name to tool; registering
//! a duplicate name overwrites the prior registration. [`ToolContext`]
//! carries everything a tool needs at invocation time: event/progress
//! emitters, the approval coordinator, audit and redaction handles, and the
//! scheduler surface.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use hearth_core::{HearthError, ToolDefinition, ToolResult};
use hearth_security::{AuditLog, SecretFilter};

use crate::approval::ApprovalCoordinator;
use crate::jobs::JobScheduler;

/// Best-effort push-event emitter bound to one connection; silently dropped
/// when the socket has closed.
pub type PushFn = Arc<dyn Fn(&str, serde_json::Value) + Send + Sync>;

/// A named side-effecting capability with a JSON-schema input.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Unique lookup key and the name shown to the model.
    fn name(&self) -> &str;

    /// Human-readable description passed to the provider.
    fn description(&self) -> &str;

    /// JSON Schema describing the tool's input parameters.
    fn input_schema(&self) -> serde_json::Value;

    /// Whether this tool is gated behind the human-in-the-loop approval flow.
    fn requires_approval(&self) -> bool {
        false
    }

    /// Invokes the tool. Failures surface as `Err` here and are stringified
    /// back to the model by the dispatcher; they never abort the turn.
    async fn execute(
        &self,
        input: serde_json::Value,
        ctx: &ToolContext,
    ) -> Result<ToolResult, HearthError>;
}

/// Everything a tool invocation can reach.
#[derive(Clone)]
pub struct ToolContext {
    pub session_key: Option<String>,
    pub run_id: Option<String>,
    pub job_id: Option<String>,
    /// Set on scheduler-owned contexts: approvals are pre-granted and the
    /// approval gate is skipped entirely.
    pub auto_approve: bool,
    pub workspace: PathBuf,
    pub approvals: Arc<ApprovalCoordinator>,
    pub audit: Arc<AuditLog>,
    pub filter: Arc<SecretFilter>,
    pub scheduler: Option<Arc<dyn JobScheduler>>,
    /// Shell tool wall-clock cap.
    pub tool_timeout: Duration,
    /// Shell tool merged-output cap in bytes.
    pub max_output_bytes: usize,
    push: Option<PushFn>,
}

impl ToolContext {
    pub fn new(
        approvals: Arc<ApprovalCoordinator>,
        audit: Arc<AuditLog>,
        filter: Arc<SecretFilter>,
    ) -> Self {
        Self {
            session_key: None,
            run_id: None,
            job_id: None,
            auto_approve: false,
            workspace: PathBuf::from("."),
            approvals,
            audit,
            filter,
            scheduler: None,
            tool_timeout: Duration::from_millis(120_000),
            max_output_bytes: 100 * 1024,
            push: None,
        }
    }

    pub fn with_push(mut self, push: PushFn) -> Self {
        self.push = Some(push);
        self
    }

    pub fn with_session(mut self, session_key: impl Into<String>) -> Self {
        self.session_key = Some(session_key.into());
        self
    }

    pub fn with_run(mut self, run_id: impl Into<String>) -> Self {
        self.run_id = Some(run_id.into());
        self
    }

    pub fn with_job(mut self, job_id: impl Into<String>) -> Self {
        self.job_id = Some(job_id.into());
        self
    }

    pub fn with_auto_approve(mut self, auto_approve: bool) -> Self {
        self.auto_approve = auto_approve;
        self
    }

    pub fn with_workspace(mut self, workspace: impl Into<PathBuf>) -> Self {
        self.workspace = workspace.into();
        self
    }

    pub fn with_scheduler(mut self, scheduler: Arc<dyn JobScheduler>) -> Self {
        self.scheduler = Some(scheduler);
        self
    }

    pub fn with_limits(mut self, tool_timeout: Duration, max_output_bytes: usize) -> Self {
        self.tool_timeout = tool_timeout;
        self.max_output_bytes = max_output_bytes;
        self
    }

    /// Emits a push event on the owning connection. Best-effort; a no-op for
    /// scheduler-owned contexts.
    pub fn send_event(&self, event: &str, data: serde_json::Value) {
        if let Some(push) = &self.push {
            push.as_ref()(event, data);
        }
    }

    /// Emits a `tool.progress` event so the UI can render per-step status.
    pub fn report_progress(&self, message: &str) {
        self.send_event(
            "tool.progress",
            serde_json::json!({
                "runId": self.run_id,
                "message": message,
            }),
        );
    }
}

/// Insertion-order registry from tool name to implementation.
#[derive(Default)]
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a tool. A duplicate name overwrites the prior registration
    /// in place; there is no silent coexistence.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        match self.tools.iter_mut().find(|t| t.name() == tool.name()) {
            Some(slot) => *slot = tool,
            None => self.tools.push(tool),
        }
    }

    /// Looks up a tool by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.iter().find(|t| t.name() == name).cloned()
    }

    /// All registered tools in insertion order.
    pub fn all(&self) -> &[Arc<dyn Tool>] {
        &self.tools
    }

    /// Tool definitions in the shape passed to the provider.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools
            .iter()
            .map(|tool| ToolDefinition {
                name: tool.name().to_string(),
                description: tool.description().to_string(),
                input_schema: tool.input_schema(),
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}
