// SPDX-FileCopyrightText: 2026 Hearth Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Append-only structured audit log (`audit.jsonl`).
//!
//! Writes are best-effort: a failure to record an entry is logged and never
//! propagated to the caller.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tracing::warn;

/// Kind of an audit entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditKind {
    /// A tool executed on behalf of a live chat turn.
    ToolExec,
    /// The user denied a tool invocation.
    ToolDenied,
    /// A tool executed on behalf of a scheduled run.
    SchedulerRun,
}

/// One structured audit record, one JSON object per line.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEvent {
    pub ts: String,
    pub kind: AuditKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool: Option<String>,
    /// Redacted free-form detail (command line, denial reason, summary).
    pub detail: String,
}

impl AuditEvent {
    /// A record stamped with the current wall-clock time.
    pub fn new(kind: AuditKind, detail: impl Into<String>) -> Self {
        Self {
            ts: chrono::Utc::now().to_rfc3339(),
            kind,
            session_key: None,
            run_id: None,
            job_id: None,
            tool: None,
            detail: detail.into(),
        }
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

    pub fn with_tool(mut self, tool: impl Into<String>) -> Self {
        self.tool = Some(tool.into());
        self
    }
}

/// Append-only audit log writer.
pub struct AuditLog {
    path: PathBuf,
    enabled: bool,
}

impl AuditLog {
    /// Opens the log at the given path. Nothing is written until the first
    /// record.
    pub fn open(path: impl Into<PathBuf>, enabled: bool) -> Self {
        Self {
            path: path.into(),
            enabled,
        }
    }

    /// A disabled log that drops every record (tests, `security.auditLog: false`).
    pub fn disabled() -> Self {
        Self {
            path: PathBuf::new(),
            enabled: false,
        }
    }

    /// Appends one record. Best-effort: failures are logged, never returned.
    pub async fn record(&self, event: AuditEvent) {
        if !self.enabled {
            return;
        }
        let mut line = match serde_json::to_string(&event) {
            Ok(line) => line,
            Err(e) => {
                warn!(error = %e, "failed to serialize audit event");
                return;
            }
        };
        line.push('\n');

        let result = async {
            let mut file = tokio::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.path)
                .await?;
            file.write_all(line.as_bytes()).await?;
            file.flush().await?;
            file.sync_all().await
        }
        .await;

        if let Err(e) = result {
            warn!(path = %self.path.display(), error = %e, "failed to append audit event");
        }
    }
}
