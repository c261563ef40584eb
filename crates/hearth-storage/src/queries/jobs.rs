// SPDX-FileCopyrightText: 2026 Hearth Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! CRUD operations for the `scheduled_jobs` table.

use hearth_core::HearthError;
use rusqlite::params;

use crate::database::{Database, map_tr_err};
use crate::models::ScheduledJob;

fn row_to_job(row: &rusqlite::Row<'_>) -> Result<ScheduledJob, rusqlite::Error> {
    Ok(ScheduledJob {
        id: row.get(0)?,
        name: row.get(1)?,
        cron_expression: row.get(2)?,
        prompt: row.get(3)?,
        agent_id: row.get(4)?,
        enabled: row.get::<_, i64>(5)? != 0,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
        last_run_at: row.get(8)?,
        last_run_status: row.get(9)?,
        last_run_summary: row.get(10)?,
    })
}

const JOB_COLUMNS: &str = "id, name, cron_expression, prompt, agent_id, enabled, \
     created_at, updated_at, last_run_at, last_run_status, last_run_summary";

/// Insert a new job row.
pub async fn create_job(db: &Database, job: &ScheduledJob) -> Result<(), HearthError> {
    let job = job.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO scheduled_jobs (id, name, cron_expression, prompt, agent_id,
                     enabled, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    job.id,
                    job.name,
                    job.cron_expression,
                    job.prompt,
                    job.agent_id,
                    job.enabled as i64,
                    job.created_at,
                    job.updated_at,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Get a job by id.
pub async fn get_job(db: &Database, id: &str) -> Result<Option<ScheduledJob>, HearthError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {JOB_COLUMNS} FROM scheduled_jobs WHERE id = ?1"
            ))?;
            let result = stmt.query_row(params![id], row_to_job);
            match result {
                Ok(job) => Ok(Some(job)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e.into()),
            }
        })
        .await
        .map_err(map_tr_err)
}

/// List jobs, newest first, optionally restricted to enabled jobs.
pub async fn list_jobs(db: &Database, enabled_only: bool) -> Result<Vec<ScheduledJob>, HearthError> {
    db.connection()
        .call(move |conn| {
            let sql = if enabled_only {
                format!(
                    "SELECT {JOB_COLUMNS} FROM scheduled_jobs WHERE enabled = 1
                     ORDER BY created_at DESC"
                )
            } else {
                format!("SELECT {JOB_COLUMNS} FROM scheduled_jobs ORDER BY created_at DESC")
            };
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map([], row_to_job)?;
            let mut jobs = Vec::new();
            for row in rows {
                jobs.push(row?);
            }
            Ok(jobs)
        })
        .await
        .map_err(map_tr_err)
}

/// Replace the mutable fields of a job row.
pub async fn update_job(db: &Database, job: &ScheduledJob) -> Result<(), HearthError> {
    let job = job.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE scheduled_jobs
                 SET name = ?2, cron_expression = ?3, prompt = ?4, agent_id = ?5,
                     enabled = ?6, updated_at = ?7
                 WHERE id = ?1",
                params![
                    job.id,
                    job.name,
                    job.cron_expression,
                    job.prompt,
                    job.agent_id,
                    job.enabled as i64,
                    job.updated_at,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Record the outcome of the most recent run on the job row.
pub async fn update_job_last_run(
    db: &Database,
    id: &str,
    at: &str,
    status: &str,
    summary: Option<&str>,
) -> Result<(), HearthError> {
    let id = id.to_string();
    let at = at.to_string();
    let status = status.to_string();
    let summary = summary.map(|s| s.to_string());
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE scheduled_jobs
                 SET last_run_at = ?2, last_run_status = ?3, last_run_summary = ?4
                 WHERE id = ?1",
                params![id, at, status, summary],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Delete a job. Returns true when a row was removed. Runs cascade via the
/// foreign-key constraint.
pub async fn delete_job(db: &Database, id: &str) -> Result<bool, HearthError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            let n = conn.execute("DELETE FROM scheduled_jobs WHERE id = ?1", params![id])?;
            Ok(n > 0)
        })
        .await
        .map_err(map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;

    pub(crate) async fn setup_db() -> (Database, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.db");
        let db = Database::open(path.to_str().unwrap()).await.unwrap();
        (db, dir)
    }

    pub(crate) fn make_job(id: &str) -> ScheduledJob {
        ScheduledJob {
            id: id.to_string(),
            name: "nightly".into(),
            cron_expression: "0 2 * * *".into(),
            prompt: "tidy up".into(),
            agent_id: "assistant".into(),
            enabled: true,
            created_at: "2026-01-01T00:00:00Z".into(),
            updated_at: "2026-01-01T00:00:00Z".into(),
            last_run_at: None,
            last_run_status: None,
            last_run_summary: None,
        }
    }

    #[tokio::test]
    async fn create_and_get_roundtrips() {
        let (db, _dir) = setup_db().await;
        create_job(&db, &make_job("j1")).await.unwrap();
        let job = get_job(&db, "j1").await.unwrap().unwrap();
        assert_eq!(job.name, "nightly");
        assert!(job.enabled);
        assert!(job.last_run_status.is_none());
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn get_unknown_returns_none() {
        let (db, _dir) = setup_db().await;
        assert!(get_job(&db, "nope").await.unwrap().is_none());
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn list_orders_newest_first_and_filters() {
        let (db, _dir) = setup_db().await;
        let mut a = make_job("a");
        a.created_at = "2026-01-01T00:00:00Z".into();
        let mut b = make_job("b");
        b.created_at = "2026-01-02T00:00:00Z".into();
        b.enabled = false;
        create_job(&db, &a).await.unwrap();
        create_job(&db, &b).await.unwrap();

        let all = list_jobs(&db, false).await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].id, "b");

        let enabled = list_jobs(&db, true).await.unwrap();
        assert_eq!(enabled.len(), 1);
        assert_eq!(enabled[0].id, "a");
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn update_replaces_fields() {
        let (db, _dir) = setup_db().await;
        create_job(&db, &make_job("j1")).await.unwrap();
        let mut job = get_job(&db, "j1").await.unwrap().unwrap();
        job.cron_expression = "*/5 * * * *".into();
        job.enabled = false;
        update_job(&db, &job).await.unwrap();

        let job = get_job(&db, "j1").await.unwrap().unwrap();
        assert_eq!(job.cron_expression, "*/5 * * * *");
        assert!(!job.enabled);
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn last_run_fields_update() {
        let (db, _dir) = setup_db().await;
        create_job(&db, &make_job("j1")).await.unwrap();
        update_job_last_run(&db, "j1", "2026-02-01T00:00:00Z", "success", Some("done"))
            .await
            .unwrap();
        let job = get_job(&db, "j1").await.unwrap().unwrap();
        assert_eq!(job.last_run_status.as_deref(), Some("success"));
        assert_eq!(job.last_run_summary.as_deref(), Some("done"));
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn delete_reports_row_count() {
        let (db, _dir) = setup_db().await;
        create_job(&db, &make_job("j1")).await.unwrap();
        assert!(delete_job(&db, "j1").await.unwrap());
        assert!(!delete_job(&db, "j1").await.unwrap());
        db.close().await.unwrap();
    }
}
