// SPDX-FileCopyrightText: 2026 Hearth Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Scheduler engine: a timer pool that replays the agent pipeline unattended.
//!
//! One tokio timer exists per enabled job. When it fires, the engine creates
//! a fresh session, resolves the job's agent to a provider and model, runs a
//! full agent turn with approvals pre-granted, records the run row and the
//! job's last-run fields, broadcasts `scheduler.run_completed`, and
//! reschedules. Per-job singleflight guarantees at most one execution per
//! job at any instant; a second fire logs a skip and reschedules without a
//! run row.
//!
//! Missed occurrences while the process is down are skipped: on restart only
//! the next future instant is scheduled. Tokio timers carry no ~24.8-day cap,
//! so delays are scheduled directly; no relay timer is needed.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, RwLock, Weak};

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use hearth_agent::{ToolDispatcher, TurnOptions, run_turn};
use hearth_config::HearthConfig;
use hearth_core::{ChatEvent, ChatMessage, ChatProvider, HearthError, ToolDefinition};
use hearth_security::{AuditEvent, AuditKind, AuditLog, SecretFilter};
use hearth_session::{SessionStore, TranscriptEvent, TranscriptRole};
use hearth_storage::{Database, JobPatch, JobRun, NewJob, ScheduledJob, queries};
use hearth_tools::{JobScheduler, ToolContext, ToolRegistry};

use crate::cron::CronExpr;

/// Broadcast callback for `scheduler.run_completed` events; wired to the
/// gateway's connection fan-out after startup.
pub type BroadcastFn = Arc<dyn Fn(&str, serde_json::Value) + Send + Sync>;

/// Preamble prepended to the system prompt of every scheduled run.
const PREAPPROVAL_PREAMBLE: &str = "This is an automated scheduled run. All tool invocations \
     are pre-approved; execute the task directly and never ask for confirmation or permission.";

/// Retry message appended when the model asks for approval anyway.
const RETRY_MESSAGE: &str = "All tools are pre-approved for this scheduled run. Do not ask for \
     confirmation or permission; invoke the tools you need and complete the task now.";

/// Lowercased substrings that make a toolless reply look like an approval
/// request.
const APPROVAL_PHRASES: [&str; 5] = ["approve", "approval", "proceed", "permission", "confirm"];

/// The scheduler engine. Construct with [`SchedulerEngine::new`]; it is
/// always handled through an `Arc` so timers can re-enter it.
pub struct SchedulerEngine {
    me: Weak<SchedulerEngine>,
    db: Database,
    providers: Arc<HashMap<String, Arc<dyn ChatProvider>>>,
    sessions: Arc<SessionStore>,
    tools: Arc<ToolRegistry>,
    audit: Arc<AuditLog>,
    filter: Arc<SecretFilter>,
    config: HearthConfig,
    workspace: PathBuf,
    timers: Mutex<HashMap<String, JoinHandle<()>>>,
    active_executions: Mutex<HashSet<String>>,
    running: AtomicBool,
    broadcast: RwLock<Option<BroadcastFn>>,
}

impl SchedulerEngine {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        db: Database,
        providers: Arc<HashMap<String, Arc<dyn ChatProvider>>>,
        sessions: Arc<SessionStore>,
        tools: Arc<ToolRegistry>,
        audit: Arc<AuditLog>,
        filter: Arc<SecretFilter>,
        config: HearthConfig,
        workspace: PathBuf,
    ) -> Arc<Self> {
        Arc::new_cyclic(|me| Self {
            me: me.clone(),
            db,
            providers,
            sessions,
            tools,
            audit,
            filter,
            config,
            workspace,
            timers: Mutex::new(HashMap::new()),
            active_executions: Mutex::new(HashSet::new()),
            running: AtomicBool::new(false),
            broadcast: RwLock::new(None),
        })
    }

    /// Wires the broadcast callback (gateway fan-out).
    pub fn set_broadcast(&self, broadcast: BroadcastFn) {
        if let Ok(mut slot) = self.broadcast.write() {
            *slot = Some(broadcast);
        }
    }

    /// Reads all enabled jobs and schedules each one's next run.
    pub async fn start(&self) -> Result<(), HearthError> {
        self.running.store(true, Ordering::SeqCst);
        let jobs = queries::jobs::list_jobs(&self.db, true).await?;
        let count = jobs.len();
        for job in jobs {
            self.schedule_job(job);
        }
        info!(jobs = count, "scheduler started");
        Ok(())
    }

    /// Cancels every timer and stops accepting fires.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        let mut timers = match self.timers.lock() {
            Ok(timers) => timers,
            Err(poisoned) => poisoned.into_inner(),
        };
        for (_, handle) in timers.drain() {
            handle.abort();
        }
        info!("scheduler stopped");
    }

    /// Number of armed timers (for tests).
    pub fn active_timer_count(&self) -> usize {
        self.timers.lock().map(|t| t.len()).unwrap_or(0)
    }

    /// (Re)schedules a job's next run, cancelling any existing timer first.
    /// Disabled jobs and a stopped engine leave no timer behind.
    pub fn schedule_job(&self, job: ScheduledJob) {
        let mut timers = match self.timers.lock() {
            Ok(timers) => timers,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(handle) = timers.remove(&job.id) {
            handle.abort();
        }
        if !job.enabled || !self.running.load(Ordering::SeqCst) {
            return;
        }

        let expr = match CronExpr::parse(&job.cron_expression) {
            Ok(expr) => expr,
            Err(e) => {
                // The expression was validated on create/update; a stored
                // job failing here means the database was edited by hand.
                error!(job = job.id.as_str(), error = %e, "stored cron expression no longer parses");
                return;
            }
        };
        let now = chrono::Local::now().naive_local();
        let next = match expr.next_run(now) {
            Ok(next) => next,
            Err(e) => {
                error!(job = job.id.as_str(), error = %e, "no future run for job");
                return;
            }
        };
        let delay = (next - now).to_std().unwrap_or_default();

        let Some(engine) = self.me.upgrade() else {
            return;
        };
        debug!(
            job = job.id.as_str(),
            delay_secs = delay.as_secs(),
            "job timer armed"
        );
        let job_id = job.id.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            engine.execute_job(job).await;
        });
        timers.insert(job_id, handle);
    }

    /// Runs one job to completion, maintaining the run row, the job's
    /// last-run fields, the broadcast, and the follow-up timer.
    pub async fn execute_job(&self, job: ScheduledJob) {
        if !self.running.load(Ordering::SeqCst) {
            return;
        }

        // Singleflight: at most one execution per job id at any instant.
        {
            let mut active = match self.active_executions.lock() {
                Ok(active) => active,
                Err(poisoned) => poisoned.into_inner(),
            };
            if active.contains(&job.id) {
                warn!(job = job.id.as_str(), "job still executing, skipping this fire");
                drop(active);
                self.schedule_job(job);
                return;
            }
            active.insert(job.id.clone());
        }

        let run_id = Uuid::new_v4().to_string();
        let started_at = chrono::Utc::now().to_rfc3339();
        let run_row = JobRun {
            id: run_id.clone(),
            job_id: job.id.clone(),
            started_at,
            finished_at: None,
            status: "running".into(),
            summary: None,
            session_key: None,
            error: None,
        };
        if let Err(e) = queries::runs::insert_run(&self.db, &run_row).await {
            error!(job = job.id.as_str(), error = %e, "failed to insert run row");
        }

        let outcome = self.run_job(&job, &run_id).await;
        let now = chrono::Utc::now().to_rfc3339();
        match outcome {
            Ok(RunOutcome { summary, session_key }) => {
                if let Err(e) =
                    queries::runs::finish_run(&self.db, &run_id, "success", Some(&summary), None)
                        .await
                {
                    error!(run = run_id.as_str(), error = %e, "failed to finish run row");
                }
                if let Err(e) = queries::jobs::update_job_last_run(
                    &self.db,
                    &job.id,
                    &now,
                    "success",
                    Some(&summary),
                )
                .await
                {
                    error!(job = job.id.as_str(), error = %e, "failed to update last-run fields");
                }
                self.emit_run_completed(&job, &run_id, Some(&session_key), "success", Some(&summary), None);
                info!(job = job.id.as_str(), run = run_id.as_str(), "scheduled run succeeded");
            }
            Err(e) => {
                let message = e.to_string();
                if let Err(e) =
                    queries::runs::finish_run(&self.db, &run_id, "error", None, Some(&message))
                        .await
                {
                    error!(run = run_id.as_str(), error = %e, "failed to finish run row");
                }
                if let Err(e) = queries::jobs::update_job_last_run(
                    &self.db,
                    &job.id,
                    &now,
                    "error",
                    Some(&message),
                )
                .await
                {
                    error!(job = job.id.as_str(), error = %e, "failed to update last-run fields");
                }
                self.emit_run_completed(&job, &run_id, None, "error", None, Some(&message));
                warn!(job = job.id.as_str(), run = run_id.as_str(), error = %message, "scheduled run failed");
            }
        }

        // Always clear singleflight and arm the next timer if the job still
        // exists and is enabled.
        {
            let mut active = match self.active_executions.lock() {
                Ok(active) => active,
                Err(poisoned) => poisoned.into_inner(),
            };
            active.remove(&job.id);
        }
        match queries::jobs::get_job(&self.db, &job.id).await {
            Ok(Some(job)) => self.schedule_job(job),
            Ok(None) => {}
            Err(e) => error!(job = job.id.as_str(), error = %e, "failed to reload job for reschedule"),
        }
    }

    async fn run_job(&self, job: &ScheduledJob, run_id: &str) -> Result<RunOutcome, HearthError> {
        // Fresh session owned by the job's agent.
        let session = self.sessions.create(&job.agent_id).await?;
        queries::runs::set_run_session(&self.db, run_id, &session.session_key).await?;
        self.sessions
            .append_event(
                &session.session_key,
                &TranscriptEvent::now(TranscriptRole::User, &job.prompt).with_run_id(run_id),
            )
            .await?;

        // Resolve provider and model through the configured fallback order.
        let binding = hearth_agent::resolve_agent(&self.workspace, &job.agent_id).await;
        let (provider, model) = hearth_agent::select_provider(
            binding.as_ref(),
            &self.providers,
            &self.config.agents.provider_fallback,
        )?;

        let base_prompt =
            hearth_agent::compose_system_prompt(&self.workspace, &job.agent_id, true).await;
        let system_prompt = format!("{PREAPPROVAL_PREAMBLE}\n\n{base_prompt}");

        // Approval-requiring tools advertise pre-approval so the model does
        // not stall asking for it.
        let tools: Vec<ToolDefinition> = self
            .tools
            .all()
            .iter()
            .map(|tool| {
                let mut description = tool.description().to_string();
                if tool.requires_approval() {
                    description.push_str(" (Approval is pre-granted for this scheduled run.)");
                }
                ToolDefinition {
                    name: tool.name().to_string(),
                    description,
                    input_schema: tool.input_schema(),
                }
            })
            .collect();

        let scheduler: Option<Arc<dyn JobScheduler>> =
            self.me.upgrade().map(|engine| engine as Arc<dyn JobScheduler>);
        let mut ctx = ToolContext::new(self.approvals_stub(), self.audit.clone(), self.filter.clone())
            .with_session(&session.session_key)
            .with_run(run_id)
            .with_job(&job.id)
            .with_auto_approve(true)
            .with_workspace(&self.workspace)
            .with_limits(
                std::time::Duration::from_millis(self.config.tools.timeout),
                self.config.tools.max_output_bytes,
            );
        if let Some(scheduler) = scheduler {
            ctx = ctx.with_scheduler(scheduler);
        }

        let dispatcher = ScheduledDispatcher {
            tools: self.tools.clone(),
            ctx,
            filter: self.filter.clone(),
            audit: self.audit.clone(),
            job_id: job.id.clone(),
            run_id: run_id.to_string(),
            session_key: session.session_key.clone(),
            calls: AtomicUsize::new(0),
        };

        let text = Arc::new(Mutex::new(String::new()));
        let sink_text = text.clone();
        let sink = move |event: ChatEvent| {
            if let ChatEvent::Delta { text } = event {
                if let Ok(mut buffer) = sink_text.lock() {
                    buffer.push_str(&text);
                }
            }
        };

        let mut messages = vec![ChatMessage::user(job.prompt.clone())];
        run_turn(
            provider.as_ref(),
            TurnOptions {
                model: model.clone(),
                system_prompt: Some(system_prompt.clone()),
                messages: messages.clone(),
                tools: tools.clone(),
                cancel: CancellationToken::new(),
            },
            &sink,
            &dispatcher,
        )
        .await?;

        let mut assistant_text = text.lock().map(|t| t.clone()).unwrap_or_default();

        // A toolless reply that reads like an approval request gets one
        // retry with pre-approval reasserted.
        if dispatcher.calls.load(Ordering::SeqCst) == 0
            && looks_like_approval_request(&assistant_text)
        {
            debug!(job = job.id.as_str(), "retrying run with pre-approval reasserted");
            messages.push(ChatMessage::assistant(assistant_text.clone()));
            messages.push(ChatMessage::user(RETRY_MESSAGE));
            if let Ok(mut buffer) = text.lock() {
                buffer.clear();
            }
            run_turn(
                provider.as_ref(),
                TurnOptions {
                    model,
                    system_prompt: Some(system_prompt),
                    messages,
                    tools,
                    cancel: CancellationToken::new(),
                },
                &sink,
                &dispatcher,
            )
            .await?;
            assistant_text = text.lock().map(|t| t.clone()).unwrap_or_default();
        }

        self.sessions
            .append_event(
                &session.session_key,
                &TranscriptEvent::now(TranscriptRole::Assistant, &assistant_text)
                    .with_run_id(run_id),
            )
            .await?;

        let summary = if assistant_text.trim().is_empty() {
            "(no output)".to_string()
        } else {
            assistant_text
        };
        Ok(RunOutcome {
            summary,
            session_key: session.session_key,
        })
    }

    /// Scheduled contexts never await approvals, but the context type
    /// requires a coordinator.
    fn approvals_stub(&self) -> Arc<hearth_tools::ApprovalCoordinator> {
        Arc::new(hearth_tools::ApprovalCoordinator::new())
    }

    #[allow(clippy::too_many_arguments)]
    fn emit_run_completed(
        &self,
        job: &ScheduledJob,
        run_id: &str,
        session_key: Option<&str>,
        status: &str,
        summary: Option<&str>,
        error: Option<&str>,
    ) {
        let broadcast = match self.broadcast.read() {
            Ok(slot) => slot.clone(),
            Err(_) => None,
        };
        if let Some(broadcast) = broadcast {
            broadcast.as_ref()(
                "scheduler.run_completed",
                serde_json::json!({
                    "jobId": job.id,
                    "jobName": job.name,
                    "runId": run_id,
                    "sessionKey": session_key,
                    "status": status,
                    "summary": summary,
                    "error": error,
                }),
            );
        }
    }
}

struct RunOutcome {
    summary: String,
    session_key: String,
}

/// Dispatcher for scheduled runs: validates through the tool's own parsing,
/// redacts output, and audits each call as `scheduler_run`.
struct ScheduledDispatcher {
    tools: Arc<ToolRegistry>,
    ctx: ToolContext,
    filter: Arc<SecretFilter>,
    audit: Arc<AuditLog>,
    job_id: String,
    run_id: String,
    session_key: String,
    calls: AtomicUsize,
}

#[async_trait]
impl ToolDispatcher for ScheduledDispatcher {
    async fn dispatch(&self, name: &str, input: serde_json::Value, _call_id: &str) -> String {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let Some(tool) = self.tools.get(name) else {
            return format!("Unknown tool: {name}");
        };
        let detail = self.filter.filter(&truncate(&input.to_string(), 200));
        let output = match tool.execute(input, &self.ctx).await {
            Ok(result) => result.output,
            Err(e) => format!("Tool {name} failed: {e}"),
        };
        let redacted = self.filter.filter(&output);
        self.audit
            .record(
                AuditEvent::new(AuditKind::SchedulerRun, detail)
                    .with_tool(name)
                    .with_job(&self.job_id)
                    .with_run(&self.run_id)
                    .with_session(&self.session_key),
            )
            .await;
        redacted
    }
}

fn truncate(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        text.to_string()
    } else {
        text.chars().take(limit).collect()
    }
}

fn looks_like_approval_request(text: &str) -> bool {
    let lower = text.to_lowercase();
    APPROVAL_PHRASES.iter().any(|phrase| lower.contains(phrase))
}

#[async_trait]
impl JobScheduler for SchedulerEngine {
    async fn create_job(&self, new: NewJob) -> Result<ScheduledJob, HearthError> {
        CronExpr::parse(&new.cron_expression)?;
        let now = chrono::Utc::now().to_rfc3339();
        let job = ScheduledJob {
            id: Uuid::new_v4().to_string(),
            name: new.name,
            cron_expression: new.cron_expression,
            prompt: new.prompt,
            agent_id: new
                .agent_id
                .unwrap_or_else(|| self.config.agents.default.clone()),
            enabled: new.enabled,
            created_at: now.clone(),
            updated_at: now,
            last_run_at: None,
            last_run_status: None,
            last_run_summary: None,
        };
        queries::jobs::create_job(&self.db, &job).await?;
        self.schedule_job(job.clone());
        info!(job = job.id.as_str(), name = job.name.as_str(), "job created");
        Ok(job)
    }

    async fn list_jobs(&self, enabled_only: bool) -> Result<Vec<ScheduledJob>, HearthError> {
        queries::jobs::list_jobs(&self.db, enabled_only).await
    }

    async fn get_job(&self, id: &str) -> Result<Option<ScheduledJob>, HearthError> {
        queries::jobs::get_job(&self.db, id).await
    }

    async fn update_job(
        &self,
        id: &str,
        patch: JobPatch,
    ) -> Result<Option<ScheduledJob>, HearthError> {
        let Some(mut job) = queries::jobs::get_job(&self.db, id).await? else {
            return Ok(None);
        };
        if let Some(name) = patch.name {
            job.name = name;
        }
        if let Some(cron_expression) = patch.cron_expression {
            job.cron_expression = cron_expression;
        }
        if let Some(prompt) = patch.prompt {
            job.prompt = prompt;
        }
        if let Some(agent_id) = patch.agent_id {
            job.agent_id = agent_id;
        }
        if let Some(enabled) = patch.enabled {
            job.enabled = enabled;
        }
        CronExpr::parse(&job.cron_expression)?;
        job.updated_at = chrono::Utc::now().to_rfc3339();
        queries::jobs::update_job(&self.db, &job).await?;
        // Enabled transitions synchronously add/remove the timer.
        self.schedule_job(job.clone());
        Ok(Some(job))
    }

    async fn delete_job(&self, id: &str) -> Result<bool, HearthError> {
        {
            let mut timers = match self.timers.lock() {
                Ok(timers) => timers,
                Err(poisoned) => poisoned.into_inner(),
            };
            if let Some(handle) = timers.remove(id) {
                handle.abort();
            }
        }
        queries::jobs::delete_job(&self.db, id).await
    }

    async fn recent_runs(&self, job_id: &str, limit: usize) -> Result<Vec<JobRun>, HearthError> {
        queries::runs::list_runs(&self.db, job_id, limit).await
    }

    fn describe_cron(&self, expr: &str) -> Result<String, HearthError> {
        Ok(CronExpr::parse(expr)?.describe())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hearth_test_utils::MockProvider;

    struct Harness {
        engine: Arc<SchedulerEngine>,
        provider: Arc<MockProvider>,
        sessions: Arc<SessionStore>,
        events: Arc<Mutex<Vec<(String, serde_json::Value)>>>,
        _dir: tempfile::TempDir,
    }

    async fn harness() -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open(dir.path().join("memory.db").to_str().unwrap())
            .await
            .unwrap();
        let sessions = Arc::new(SessionStore::open(dir.path().join("sessions")).unwrap());
        let provider = Arc::new(MockProvider::new());
        let mut providers: HashMap<String, Arc<dyn ChatProvider>> = HashMap::new();
        providers.insert("mock".into(), provider.clone());

        let mut config = HearthConfig::default();
        config.agents.provider_fallback = vec!["mock".into()];

        let engine = SchedulerEngine::new(
            db.clone(),
            Arc::new(providers),
            sessions.clone(),
            Arc::new(ToolRegistry::new()),
            Arc::new(AuditLog::disabled()),
            Arc::new(SecretFilter::disabled()),
            config,
            dir.path().join("workspace"),
        );

        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        engine.set_broadcast(Arc::new(move |event, data| {
            sink.lock().unwrap().push((event.to_string(), data));
        }));

        Harness {
            engine,
            provider,
            sessions,
            events,
            _dir: dir,
        }
    }

    fn new_job(cron: &str) -> NewJob {
        NewJob {
            name: "test job".into(),
            cron_expression: cron.into(),
            prompt: "say ok".into(),
            agent_id: None,
            enabled: true,
        }
    }

    #[tokio::test]
    async fn create_rejects_invalid_cron() {
        let h = harness().await;
        let err = h.engine.create_job(new_job("not cron")).await.unwrap_err();
        assert!(err.to_string().contains("cron"));
    }

    #[tokio::test]
    async fn enabled_job_gets_a_timer_while_running() {
        let h = harness().await;
        h.engine.start().await.unwrap();
        let job = h.engine.create_job(new_job("* * * * *")).await.unwrap();
        assert_eq!(h.engine.active_timer_count(), 1);

        // Disabling removes the timer synchronously.
        let patch = JobPatch {
            enabled: Some(false),
            ..JobPatch::default()
        };
        h.engine.update_job(&job.id, patch).await.unwrap().unwrap();
        assert_eq!(h.engine.active_timer_count(), 0);

        // Re-enabling re-creates it.
        let patch = JobPatch {
            enabled: Some(true),
            ..JobPatch::default()
        };
        h.engine.update_job(&job.id, patch).await.unwrap().unwrap();
        assert_eq!(h.engine.active_timer_count(), 1);
    }

    #[tokio::test]
    async fn stopped_engine_schedules_nothing() {
        let h = harness().await;
        let _job = h.engine.create_job(new_job("* * * * *")).await.unwrap();
        assert_eq!(h.engine.active_timer_count(), 0);
    }

    #[tokio::test]
    async fn execute_job_records_success_and_broadcasts() {
        let h = harness().await;
        h.engine.start().await.unwrap();
        h.provider.push_text_response("all done");
        let job = h.engine.create_job(new_job("* * * * *")).await.unwrap();

        h.engine.execute_job(job.clone()).await;

        let stored = h.engine.get_job(&job.id).await.unwrap().unwrap();
        assert_eq!(stored.last_run_status.as_deref(), Some("success"));
        assert_eq!(stored.last_run_summary.as_deref(), Some("all done"));

        let runs = h.engine.recent_runs(&job.id, 10).await.unwrap();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].status, "success");
        assert!(runs[0].finished_at.is_some());
        let session_key = runs[0].session_key.clone().unwrap();

        // Transcript carries the prompt and the assistant reply.
        let transcript = h.sessions.read_events(&session_key, None).await.unwrap();
        assert_eq!(transcript.len(), 2);
        assert_eq!(transcript[0].content, "say ok");
        assert_eq!(transcript[1].content, "all done");

        let events = h.events.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].0, "scheduler.run_completed");
        assert_eq!(events[0].1["status"], "success");
        assert_eq!(events[0].1["jobId"], job.id);

        // The follow-up timer is armed.
        assert_eq!(h.engine.active_timer_count(), 1);
    }

    #[tokio::test]
    async fn missing_provider_records_error_run() {
        // An engine with an empty provider map fails inside run_job; the run
        // row, the job's last-run fields, and the broadcast all go to error.
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open(dir.path().join("memory.db").to_str().unwrap())
            .await
            .unwrap();
        let sessions = Arc::new(SessionStore::open(dir.path().join("sessions")).unwrap());
        let engine = SchedulerEngine::new(
            db.clone(),
            Arc::new(HashMap::new()),
            sessions,
            Arc::new(ToolRegistry::new()),
            Arc::new(AuditLog::disabled()),
            Arc::new(SecretFilter::disabled()),
            HearthConfig::default(),
            dir.path().join("workspace"),
        );
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        engine.set_broadcast(Arc::new(move |event, data| {
            sink.lock().unwrap().push((event.to_string(), data));
        }));
        engine.start().await.unwrap();

        let job = engine.create_job(new_job("* * * * *")).await.unwrap();
        engine.execute_job(job.clone()).await;

        let stored = engine.get_job(&job.id).await.unwrap().unwrap();
        assert_eq!(stored.last_run_status.as_deref(), Some("error"));

        let runs = engine.recent_runs(&job.id, 10).await.unwrap();
        assert_eq!(runs[0].status, "error");
        assert!(runs[0].error.as_deref().unwrap().contains("no providers"));

        let events = events.lock().unwrap();
        assert_eq!(events[0].1["status"], "error");
    }

    #[tokio::test]
    async fn singleflight_skips_second_fire_without_a_run_row() {
        let h = harness().await;
        h.engine.start().await.unwrap();
        let job = h.engine.create_job(new_job("* * * * *")).await.unwrap();

        // Simulate an in-progress execution.
        h.engine
            .active_executions
            .lock()
            .unwrap()
            .insert(job.id.clone());

        h.engine.execute_job(job.clone()).await;

        let runs = h.engine.recent_runs(&job.id, 10).await.unwrap();
        assert!(runs.is_empty(), "skipped fire must not create a run row");
        // The skip rescheduled the job.
        assert_eq!(h.engine.active_timer_count(), 1);
    }

    #[tokio::test]
    async fn approval_phrase_without_tool_calls_triggers_one_retry() {
        let h = harness().await;
        h.engine.start().await.unwrap();
        h.provider
            .push_text_response("I need your approval before I can proceed.");
        h.provider.push_text_response("Done without asking.");

        let job = h.engine.create_job(new_job("* * * * *")).await.unwrap();
        h.engine.execute_job(job.clone()).await;

        assert_eq!(h.provider.request_count(), 2);
        let retry_request = &h.provider.requests()[1];
        let last = retry_request.messages.last().unwrap();
        match &last.content {
            hearth_core::MessageContent::Text(text) => {
                assert!(text.contains("pre-approved"));
            }
            other => panic!("expected text retry message, got {other:?}"),
        }

        let stored = h.engine.get_job(&job.id).await.unwrap().unwrap();
        assert_eq!(stored.last_run_summary.as_deref(), Some("Done without asking."));
    }

    #[tokio::test]
    async fn tool_definitions_note_preapproval() {
        // The shared harness has an empty registry; this engine carries the
        // built-in tool set so definition rewriting is observable.
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open(dir.path().join("memory.db").to_str().unwrap())
            .await
            .unwrap();
        let sessions = Arc::new(SessionStore::open(dir.path().join("sessions")).unwrap());
        let provider = Arc::new(MockProvider::new());
        provider.push_text_response("ok");
        let mut providers: HashMap<String, Arc<dyn ChatProvider>> = HashMap::new();
        providers.insert("mock".into(), provider.clone());
        let mut registry = ToolRegistry::new();
        hearth_tools::register_builtins(&mut registry, Arc::new(hearth_tools::BrowserManager::new()));
        let mut config = HearthConfig::default();
        config.agents.provider_fallback = vec!["mock".into()];
        let engine = SchedulerEngine::new(
            db,
            Arc::new(providers),
            sessions,
            Arc::new(registry),
            Arc::new(AuditLog::disabled()),
            Arc::new(SecretFilter::disabled()),
            config,
            dir.path().join("workspace"),
        );
        engine.start().await.unwrap();

        let job = engine.create_job(new_job("* * * * *")).await.unwrap();
        engine.execute_job(job).await;

        let request = &provider.requests()[0];
        let bash = request.tools.iter().find(|t| t.name == "bash").unwrap();
        assert!(bash.description.contains("pre-granted"));
        let schedule = request.tools.iter().find(|t| t.name == "schedule").unwrap();
        assert!(!schedule.description.contains("pre-granted"));
        assert!(request.system_prompt.as_deref().unwrap().contains("pre-approved"));
    }

    #[tokio::test]
    async fn delete_clears_timer_and_cascades() {
        let h = harness().await;
        h.engine.start().await.unwrap();
        let job = h.engine.create_job(new_job("* * * * *")).await.unwrap();
        assert_eq!(h.engine.active_timer_count(), 1);

        assert!(h.engine.delete_job(&job.id).await.unwrap());
        assert_eq!(h.engine.active_timer_count(), 0);
        assert!(h.engine.get_job(&job.id).await.unwrap().is_none());
        assert!(!h.engine.delete_job(&job.id).await.unwrap());
    }

    #[test]
    fn approval_phrase_detection() {
        assert!(looks_like_approval_request("May I have your APPROVAL?"));
        assert!(looks_like_approval_request("shall I proceed?"));
        assert!(looks_like_approval_request("I need permission to run this"));
        assert!(looks_like_approval_request("please confirm"));
        assert!(!looks_like_approval_request("task complete, nothing to do"));
    }

    #[tokio::test]
    async fn stop_cancels_all_timers() {
        let h = harness().await;
        h.engine.start().await.unwrap();
        h.engine.create_job(new_job("* * * * *")).await.unwrap();
        h.engine.create_job(new_job("0 8 * * *")).await.unwrap();
        assert_eq!(h.engine.active_timer_count(), 2);

        h.engine.stop();
        assert_eq!(h.engine.active_timer_count(), 0);
    }
}
