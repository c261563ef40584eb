// SPDX-FileCopyrightText: 2026 Hearth Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Read-only search surface over the external memory indexer's table.
//!
//! The indexer is a separate process that reads transcripts after the fact
//! and maintains `memory_entries` inside the same `memory.db`. The core never
//! writes that table; when the indexer has not run yet the table is absent
//! and search returns no results.

use hearth_core::HearthError;
use rusqlite::params;

use crate::database::{Database, map_tr_err};
use crate::models::MemoryHit;

/// Keyword search over indexed memory entries, most recent first.
///
/// Returns an empty list when the indexer's table does not exist yet.
pub async fn search_memory(
    db: &Database,
    query: &str,
    k: usize,
) -> Result<Vec<MemoryHit>, HearthError> {
    let pattern = format!("%{}%", query.replace('%', "").replace('_', ""));
    db.connection()
        .call(move |conn| {
            let mut stmt = match conn.prepare(
                "SELECT session_key, ts, content FROM memory_entries
                 WHERE content LIKE ?1 ORDER BY ts DESC LIMIT ?2",
            ) {
                Ok(stmt) => stmt,
                Err(e) if is_missing_table(&e) => return Ok(Vec::new()),
                Err(e) => return Err(e.into()),
            };
            let rows = stmt.query_map(params![pattern, k as i64], |row| {
                Ok(MemoryHit {
                    session_key: row.get(0)?,
                    ts: row.get(1)?,
                    content: row.get(2)?,
                })
            })?;
            let mut hits = Vec::new();
            for row in rows {
                hits.push(row?);
            }
            Ok(hits)
        })
        .await
        .map_err(map_tr_err)
}

fn is_missing_table(e: &rusqlite::Error) -> bool {
    matches!(
        e,
        rusqlite::Error::SqliteFailure(_, Some(msg)) if msg.contains("no such table")
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn setup() -> (Database, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.db");
        let db = Database::open(path.to_str().unwrap()).await.unwrap();
        (db, dir)
    }

    #[tokio::test]
    async fn missing_table_yields_empty_results() {
        let (db, _dir) = setup().await;
        let hits = search_memory(&db, "anything", 10).await.unwrap();
        assert!(hits.is_empty());
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn matches_are_returned_newest_first() {
        let (db, _dir) = setup().await;
        // Simulate the external indexer creating and filling its table.
        db.connection()
            .call(|conn| {
                conn.execute_batch(
                    "CREATE TABLE memory_entries (
                         id INTEGER PRIMARY KEY,
                         session_key TEXT,
                         ts TEXT,
                         content TEXT NOT NULL
                     );
                     INSERT INTO memory_entries (session_key, ts, content) VALUES
                       ('s1', '2026-01-01T00:00:00Z', 'bought groceries'),
                       ('s2', '2026-01-02T00:00:00Z', 'groceries list updated'),
                       ('s3', '2026-01-03T00:00:00Z', 'unrelated note');",
                )?;
                Ok(())
            })
            .await
            .unwrap();

        let hits = search_memory(&db, "groceries", 10).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].session_key.as_deref(), Some("s2"));
        assert_eq!(hits[1].session_key.as_deref(), Some("s1"));

        let limited = search_memory(&db, "groceries", 1).await.unwrap();
        assert_eq!(limited.len(), 1);
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn like_wildcards_in_query_are_stripped() {
        let (db, _dir) = setup().await;
        db.connection()
            .call(|conn| {
                conn.execute_batch(
                    "CREATE TABLE memory_entries (
                         id INTEGER PRIMARY KEY,
                         session_key TEXT, ts TEXT, content TEXT NOT NULL
                     );
                     INSERT INTO memory_entries (session_key, ts, content)
                     VALUES ('s1', '2026-01-01T00:00:00Z', 'plain text');",
                )?;
                Ok(())
            })
            .await
            .unwrap();

        // "%" alone would match everything if passed through.
        let hits = search_memory(&db, "nomatch%", 10).await.unwrap();
        assert!(hits.is_empty());
        db.close().await.unwrap();
    }
}
