// SPDX-FileCopyrightText: 2026 Hearth Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The scheduler surface tools and the gateway talk to.
//!
//! The engine lives in its own crate and depends on this one for the tool
//! registry, so the dependency is inverted through this trait: the schedule
//! tool and the `scheduler.*` RPC handlers only ever see `dyn JobScheduler`.

use async_trait::async_trait;

use hearth_core::HearthError;
use hearth_storage::{JobPatch, JobRun, NewJob, ScheduledJob};

/// CRUD and run-history surface of the scheduler engine.
#[async_trait]
pub trait JobScheduler: Send + Sync {
    /// Validates the cron expression and creates the job; an enabled job gets
    /// its timer immediately.
    async fn create_job(&self, new: NewJob) -> Result<ScheduledJob, HearthError>;

    /// Lists jobs, newest first.
    async fn list_jobs(&self, enabled_only: bool) -> Result<Vec<ScheduledJob>, HearthError>;

    async fn get_job(&self, id: &str) -> Result<Option<ScheduledJob>, HearthError>;

    /// Applies a partial update, re-validating the cron and synchronously
    /// adding/removing the timer on enabled transitions. Returns the updated
    /// job, or `None` when the id is unknown.
    async fn update_job(&self, id: &str, patch: JobPatch)
    -> Result<Option<ScheduledJob>, HearthError>;

    /// Deletes the job (runs cascade) and clears its timer. Returns false
    /// when the id is unknown.
    async fn delete_job(&self, id: &str) -> Result<bool, HearthError>;

    /// The most recent runs of a job, newest first.
    async fn recent_runs(&self, job_id: &str, limit: usize)
    -> Result<Vec<JobRun>, HearthError>;

    /// Human-readable phrase for a cron expression ("At 08:00, Monday through
    /// Friday"). Informational only.
    fn describe_cron(&self, expr: &str) -> Result<String, HearthError>;
}
