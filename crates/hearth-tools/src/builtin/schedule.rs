// SPDX-FileCopyrightText: 2026 Hearth Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Built-in schedule management tool.
//!
//! Lets the model create, inspect, update, and delete cron jobs through the
//! scheduler engine. Does not require approval; the side effects are
//! persisted rows, not command execution. Returns formatted text for the
//! model to relay.

use async_trait::async_trait;
use serde::Deserialize;

use hearth_core::{HearthError, ToolResult};
use hearth_storage::{JobPatch, JobRun, NewJob, ScheduledJob};

use crate::jobs::JobScheduler;
use crate::tool::{Tool, ToolContext};

/// Runs shown by the `get` action.
const RECENT_RUNS: usize = 5;

/// Schedule CRUD for the model.
pub struct ScheduleTool;

#[derive(Debug, Deserialize)]
#[serde(tag = "action", rename_all = "lowercase", deny_unknown_fields)]
enum ScheduleInput {
    Create {
        name: String,
        cron: String,
        prompt: String,
        #[serde(default, rename = "agentId")]
        agent_id: Option<String>,
        #[serde(default = "default_enabled")]
        enabled: bool,
    },
    List {},
    Get {
        id: String,
    },
    Update {
        id: String,
        #[serde(default)]
        name: Option<String>,
        #[serde(default)]
        cron: Option<String>,
        #[serde(default)]
        prompt: Option<String>,
        #[serde(default, rename = "agentId")]
        agent_id: Option<String>,
        #[serde(default)]
        enabled: Option<bool>,
    },
    Delete {
        id: String,
    },
}

fn default_enabled() -> bool {
    true
}

#[async_trait]
impl Tool for ScheduleTool {
    fn name(&self) -> &str {
        "schedule"
    }

    fn description(&self) -> &str {
        "Manage scheduled jobs: create, list, get, update, delete. Jobs run \
         a prompt on a 5-field cron expression with tools pre-approved."
    }

    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "action": {
                    "type": "string",
                    "enum": ["create", "list", "get", "update", "delete"]
                },
                "id": {"type": "string"},
                "name": {"type": "string"},
                "cron": {
                    "type": "string",
                    "description": "5-field cron expression (minute hour day-of-month month day-of-week)"
                },
                "prompt": {"type": "string"},
                "agentId": {"type": "string"},
                "enabled": {"type": "boolean"}
            },
            "required": ["action"]
        })
    }

    async fn execute(
        &self,
        input: serde_json::Value,
        ctx: &ToolContext,
    ) -> Result<ToolResult, HearthError> {
        let scheduler = ctx
            .scheduler
            .as_ref()
            .ok_or_else(|| HearthError::tool("scheduler is not available"))?;
        let input: ScheduleInput = serde_json::from_value(input)
            .map_err(|e| HearthError::tool(format!("invalid schedule input: {e}")))?;

        let output = match input {
            ScheduleInput::Create {
                name,
                cron,
                prompt,
                agent_id,
                enabled,
            } => {
                let job = scheduler
                    .create_job(NewJob {
                        name,
                        cron_expression: cron,
                        prompt,
                        agent_id,
                        enabled,
                    })
                    .await?;
                let phrase = scheduler
                    .describe_cron(&job.cron_expression)
                    .unwrap_or_else(|_| job.cron_expression.clone());
                format!(
                    "Created job '{}' ({})\nSchedule: {} -- {}\nEnabled: {}",
                    job.name, job.id, job.cron_expression, phrase, job.enabled
                )
            }
            ScheduleInput::List {} => {
                let jobs = scheduler.list_jobs(false).await?;
                if jobs.is_empty() {
                    "No scheduled jobs.".to_string()
                } else {
                    jobs.iter().map(format_job_line).collect::<Vec<_>>().join("\n")
                }
            }
            ScheduleInput::Get { id } => match scheduler.get_job(&id).await? {
                Some(job) => {
                    let runs = scheduler.recent_runs(&job.id, RECENT_RUNS).await?;
                    format_job_detail(&job, &runs, scheduler.describe_cron(&job.cron_expression).ok())
                }
                None => format!("No job with id {id}."),
            },
            ScheduleInput::Update {
                id,
                name,
                cron,
                prompt,
                agent_id,
                enabled,
            } => {
                let patch = JobPatch {
                    name,
                    cron_expression: cron,
                    prompt,
                    agent_id,
                    enabled,
                };
                match scheduler.update_job(&id, patch).await? {
                    Some(job) => format!(
                        "Updated job '{}' ({})\nSchedule: {}\nEnabled: {}",
                        job.name, job.id, job.cron_expression, job.enabled
                    ),
                    None => format!("No job with id {id}."),
                }
            }
            ScheduleInput::Delete { id } => {
                if scheduler.delete_job(&id).await? {
                    format!("Deleted job {id}.")
                } else {
                    format!("No job with id {id}.")
                }
            }
        };

        Ok(ToolResult::text(output))
    }
}

fn format_job_line(job: &ScheduledJob) -> String {
    let state = if job.enabled { "enabled" } else { "disabled" };
    let last = match (&job.last_run_status, &job.last_run_summary) {
        (Some(status), Some(summary)) => format!("last run {status}: {}", first_line(summary)),
        (Some(status), None) => format!("last run {status}"),
        _ => "never run".to_string(),
    };
    format!(
        "{} [{}] '{}' {} -- {}",
        job.id, state, job.name, job.cron_expression, last
    )
}

fn format_job_detail(job: &ScheduledJob, runs: &[JobRun], phrase: Option<String>) -> String {
    let mut lines = vec![
        format!("Job '{}' ({})", job.name, job.id),
        format!(
            "Schedule: {}{}",
            job.cron_expression,
            phrase.map(|p| format!(" -- {p}")).unwrap_or_default()
        ),
        format!("Agent: {}", job.agent_id),
        format!("Enabled: {}", job.enabled),
        format!("Prompt: {}", job.prompt),
        format!("Created: {}  Updated: {}", job.created_at, job.updated_at),
    ];
    if let Some(at) = &job.last_run_at {
        lines.push(format!(
            "Last run: {} ({})",
            at,
            job.last_run_status.as_deref().unwrap_or("unknown")
        ));
    }
    if runs.is_empty() {
        lines.push("No runs yet.".to_string());
    } else {
        lines.push(format!("Recent runs ({}):", runs.len()));
        for run in runs {
            let outcome = match run.status.as_str() {
                "error" => run.error.clone().unwrap_or_else(|| "error".into()),
                _ => run.summary.clone().map(|s| first_line(&s)).unwrap_or_default(),
            };
            lines.push(format!("  {} {} {}", run.started_at, run.status, outcome));
        }
    }
    lines.join("\n")
}

fn first_line(text: &str) -> String {
    text.lines().next().unwrap_or_default().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::approval::ApprovalCoordinator;
    use crate::tool::ToolContext;
    use hearth_security::{AuditLog, SecretFilter};
    use std::sync::{Arc, Mutex};

    /// In-memory scheduler standing in for the engine.
    #[derive(Default)]
    struct FakeScheduler {
        jobs: Mutex<Vec<ScheduledJob>>,
    }

    #[async_trait]
    impl JobScheduler for FakeScheduler {
        async fn create_job(&self, new: NewJob) -> Result<ScheduledJob, HearthError> {
            if new.cron_expression.split_whitespace().count() != 5 {
                return Err(HearthError::Scheduler("invalid cron expression".into()));
            }
            let job = ScheduledJob {
                id: format!("job-{}", self.jobs.lock().unwrap().len() + 1),
                name: new.name,
                cron_expression: new.cron_expression,
                prompt: new.prompt,
                agent_id: new.agent_id.unwrap_or_else(|| "assistant".into()),
                enabled: new.enabled,
                created_at: "2026-01-01T00:00:00Z".into(),
                updated_at: "2026-01-01T00:00:00Z".into(),
                last_run_at: None,
                last_run_status: None,
                last_run_summary: None,
            };
            self.jobs.lock().unwrap().push(job.clone());
            Ok(job)
        }

        async fn list_jobs(&self, _enabled_only: bool) -> Result<Vec<ScheduledJob>, HearthError> {
            Ok(self.jobs.lock().unwrap().clone())
        }

        async fn get_job(&self, id: &str) -> Result<Option<ScheduledJob>, HearthError> {
            Ok(self.jobs.lock().unwrap().iter().find(|j| j.id == id).cloned())
        }

        async fn update_job(
            &self,
            id: &str,
            patch: JobPatch,
        ) -> Result<Option<ScheduledJob>, HearthError> {
            let mut jobs = self.jobs.lock().unwrap();
            let Some(job) = jobs.iter_mut().find(|j| j.id == id) else {
                return Ok(None);
            };
            if let Some(name) = patch.name {
                job.name = name;
            }
            if let Some(enabled) = patch.enabled {
                job.enabled = enabled;
            }
            Ok(Some(job.clone()))
        }

        async fn delete_job(&self, id: &str) -> Result<bool, HearthError> {
            let mut jobs = self.jobs.lock().unwrap();
            let before = jobs.len();
            jobs.retain(|j| j.id != id);
            Ok(jobs.len() < before)
        }

        async fn recent_runs(
            &self,
            _job_id: &str,
            _limit: usize,
        ) -> Result<Vec<JobRun>, HearthError> {
            Ok(Vec::new())
        }

        fn describe_cron(&self, _expr: &str) -> Result<String, HearthError> {
            Ok("every so often".into())
        }
    }

    fn context(scheduler: Arc<FakeScheduler>) -> ToolContext {
        ToolContext::new(
            Arc::new(ApprovalCoordinator::new()),
            Arc::new(AuditLog::disabled()),
            Arc::new(SecretFilter::disabled()),
        )
        .with_scheduler(scheduler)
    }

    #[tokio::test]
    async fn create_then_list_and_get() {
        let scheduler = Arc::new(FakeScheduler::default());
        let ctx = context(scheduler);

        let result = ScheduleTool
            .execute(
                serde_json::json!({
                    "action": "create",
                    "name": "morning brief",
                    "cron": "0 8 * * *",
                    "prompt": "Summarize my day."
                }),
                &ctx,
            )
            .await
            .unwrap();
        assert!(result.output.contains("Created job 'morning brief'"));
        assert!(result.output.contains("0 8 * * *"));

        let result = ScheduleTool
            .execute(serde_json::json!({"action": "list"}), &ctx)
            .await
            .unwrap();
        assert!(result.output.contains("morning brief"));
        assert!(result.output.contains("never run"));

        let result = ScheduleTool
            .execute(serde_json::json!({"action": "get", "id": "job-1"}), &ctx)
            .await
            .unwrap();
        assert!(result.output.contains("Prompt: Summarize my day."));
        assert!(result.output.contains("No runs yet."));
    }

    #[tokio::test]
    async fn invalid_cron_surfaces_as_error() {
        let ctx = context(Arc::new(FakeScheduler::default()));
        let err = ScheduleTool
            .execute(
                serde_json::json!({
                    "action": "create",
                    "name": "bad",
                    "cron": "not a cron",
                    "prompt": "x"
                }),
                &ctx,
            )
            .await
            .unwrap_err();
        assert!(err.to_string().contains("invalid cron"));
    }

    #[tokio::test]
    async fn update_and_delete_report_unknown_ids() {
        let ctx = context(Arc::new(FakeScheduler::default()));

        let result = ScheduleTool
            .execute(
                serde_json::json!({"action": "update", "id": "ghost", "enabled": false}),
                &ctx,
            )
            .await
            .unwrap();
        assert!(result.output.contains("No job with id ghost"));

        let result = ScheduleTool
            .execute(serde_json::json!({"action": "delete", "id": "ghost"}), &ctx)
            .await
            .unwrap();
        assert!(result.output.contains("No job with id ghost"));
    }

    #[tokio::test]
    async fn delete_removes_the_job() {
        let scheduler = Arc::new(FakeScheduler::default());
        let ctx = context(scheduler.clone());
        ScheduleTool
            .execute(
                serde_json::json!({
                    "action": "create", "name": "j", "cron": "* * * * *", "prompt": "p"
                }),
                &ctx,
            )
            .await
            .unwrap();

        let result = ScheduleTool
            .execute(serde_json::json!({"action": "delete", "id": "job-1"}), &ctx)
            .await
            .unwrap();
        assert!(result.output.contains("Deleted job job-1"));
        assert!(scheduler.jobs.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn missing_scheduler_is_a_tool_error() {
        let ctx = ToolContext::new(
            Arc::new(ApprovalCoordinator::new()),
            Arc::new(AuditLog::disabled()),
            Arc::new(SecretFilter::disabled()),
        );
        let err = ScheduleTool
            .execute(serde_json::json!({"action": "list"}), &ctx)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("scheduler is not available"));
    }

    #[test]
    fn schedule_tool_does_not_require_approval() {
        assert!(!ScheduleTool.requires_approval());
    }
}
