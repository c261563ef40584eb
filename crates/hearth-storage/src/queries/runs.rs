// SPDX-FileCopyrightText: 2026 Hearth Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Operations for the `job_runs` table.
//!
//! One `running` row is inserted when a timer fires; it transitions to a
//! terminal state ("success" or "error") exactly once.

use hearth_core::HearthError;
use rusqlite::params;

use crate::database::{Database, map_tr_err};
use crate::models::JobRun;

fn row_to_run(row: &rusqlite::Row<'_>) -> Result<JobRun, rusqlite::Error> {
    Ok(JobRun {
        id: row.get(0)?,
        job_id: row.get(1)?,
        started_at: row.get(2)?,
        finished_at: row.get(3)?,
        status: row.get(4)?,
        summary: row.get(5)?,
        session_key: row.get(6)?,
        error: row.get(7)?,
    })
}

const RUN_COLUMNS: &str =
    "id, job_id, started_at, finished_at, status, summary, session_key, error";

/// Insert a `running` row for a fresh execution.
pub async fn insert_run(db: &Database, run: &JobRun) -> Result<(), HearthError> {
    let run = run.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO job_runs (id, job_id, started_at, status, session_key)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![run.id, run.job_id, run.started_at, run.status, run.session_key],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Attach the session key created for this run.
pub async fn set_run_session(
    db: &Database,
    run_id: &str,
    session_key: &str,
) -> Result<(), HearthError> {
    let run_id = run_id.to_string();
    let session_key = session_key.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE job_runs SET session_key = ?2 WHERE id = ?1",
                params![run_id, session_key],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Move a run to its terminal state, stamping `finished_at`.
pub async fn finish_run(
    db: &Database,
    run_id: &str,
    status: &str,
    summary: Option<&str>,
    error: Option<&str>,
) -> Result<(), HearthError> {
    let run_id = run_id.to_string();
    let status = status.to_string();
    let summary = summary.map(|s| s.to_string());
    let error = error.map(|s| s.to_string());
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE job_runs
                 SET finished_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now'),
                     status = ?2, summary = ?3, error = ?4
                 WHERE id = ?1",
                params![run_id, status, summary, error],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// List the most recent runs of a job, newest first.
pub async fn list_runs(
    db: &Database,
    job_id: &str,
    limit: usize,
) -> Result<Vec<JobRun>, HearthError> {
    let job_id = job_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {RUN_COLUMNS} FROM job_runs WHERE job_id = ?1
                 ORDER BY started_at DESC LIMIT ?2"
            ))?;
            let rows = stmt.query_map(params![job_id, limit as i64], row_to_run)?;
            let mut runs = Vec::new();
            for row in rows {
                runs.push(row?);
            }
            Ok(runs)
        })
        .await
        .map_err(map_tr_err)
}
