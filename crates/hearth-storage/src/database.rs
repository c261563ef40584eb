// SPDX-FileCopyrightText: 2026 Hearth Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Database connection management with PRAGMA setup, WAL mode, and embedded
//! migrations.
//!
//! All access goes through tokio-rusqlite's single background thread, which
//! serializes writes. The scheduler writes job rows concurrently with RPC
//! reads; do NOT open additional write connections.

use hearth_core::HearthError;

use crate::migrations;

/// Handle to the `memory.db` SQLite database.
#[derive(Clone)]
pub struct Database {
    conn: tokio_rusqlite::Connection,
}

impl Database {
    /// Opens (creating if needed) the database at `path`, runs pending
    /// migrations, and applies PRAGMAs.
    pub async fn open(path: &str) -> Result<Self, HearthError> {
        // Migrations need a synchronous connection; run them to completion
        // before the async handle exists.
        let migration_path = path.to_string();
        tokio::task::spawn_blocking(move || -> Result<(), HearthError> {
            let mut conn = rusqlite::Connection::open(&migration_path)
                .map_err(|e| HearthError::Storage { source: Box::new(e) })?;
            migrations::run_migrations(&mut conn)
        })
        .await
        .map_err(|e| HearthError::Internal(format!("migration task panicked: {e}")))??;

        let conn = tokio_rusqlite::Connection::open(path)
            .await
            .map_err(|e| HearthError::Storage { source: Box::new(e) })?;

        conn.call(|conn| {
            conn.pragma_update(None, "journal_mode", "WAL")?;
            conn.pragma_update(None, "foreign_keys", "ON")?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)?;

        Ok(Self { conn })
    }

    /// The underlying tokio-rusqlite connection.
    pub fn connection(&self) -> &tokio_rusqlite::Connection {
        &self.conn
    }

    /// Closes the background connection thread.
    pub async fn close(self) -> Result<(), HearthError> {
        self.conn
            .close()
            .await
            .map_err(|e| HearthError::Storage { source: Box::new(e) })
    }
}

/// Maps a tokio-rusqlite error into the storage error kind.
pub(crate) fn map_tr_err(e: tokio_rusqlite::Error) -> HearthError {
    HearthError::Storage { source: Box::new(e) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn open_runs_migrations() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("memory.db");
        let db = Database::open(path.to_str().unwrap()).await.unwrap();

        let count: i64 = db
            .connection()
            .call(|conn| {
                let n = conn.query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table'
                     AND name IN ('scheduled_jobs', 'job_runs')",
                    [],
                    |row| row.get(0),
                )?;
                Ok(n)
            })
            .await
            .unwrap();
        assert_eq!(count, 2);
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn reopen_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("memory.db");
        let db = Database::open(path.to_str().unwrap()).await.unwrap();
        db.close().await.unwrap();
        let db = Database::open(path.to_str().unwrap()).await.unwrap();
        db.close().await.unwrap();
    }
}
