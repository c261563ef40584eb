// SPDX-FileCopyrightText: 2026 Hearth Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Row models for the scheduled-jobs tables and the memory search surface.

use serde::{Deserialize, Serialize};

/// A persisted scheduled job (one row in `scheduled_jobs`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduledJob {
    /// 128-bit random identifier.
    pub id: String,
    pub name: String,
    /// 5-field cron expression. Validated before any insert or update.
    pub cron_expression: String,
    /// Prompt text fed to the agent when the job fires.
    pub prompt: String,
    pub agent_id: String,
    pub enabled: bool,
    pub created_at: String,
    pub updated_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_run_at: Option<String>,
    /// "success" or "error".
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_run_status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_run_summary: Option<String>,
}

/// One execution of a scheduled job (one row in `job_runs`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobRun {
    pub id: String,
    pub job_id: String,
    pub started_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<String>,
    /// "running", "success", or "error".
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Fields required to create a scheduled job.
#[derive(Debug, Clone)]
pub struct NewJob {
    pub name: String,
    pub cron_expression: String,
    pub prompt: String,
    pub agent_id: Option<String>,
    pub enabled: bool,
}

/// Partial update to a scheduled job. `None` fields are left unchanged.
#[derive(Debug, Clone, Default)]
pub struct JobPatch {
    pub name: Option<String>,
    pub cron_expression: Option<String>,
    pub prompt: Option<String>,
    pub agent_id: Option<String>,
    pub enabled: Option<bool>,
}

/// One hit returned by `memory.search` against the external indexer's table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryHit {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ts: Option<String>,
    pub content: String,
}
