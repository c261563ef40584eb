// SPDX-FileCopyrightText: 2026 Hearth Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! File-backed session store.
//!
//! Each session is two files under the sessions directory: an append-only
//! JSONL transcript and a metadata sidecar. Writes are not cross-file
//! atomic; readers discard partial trailing lines and skip malformed
//! metadata files.

use std::path::{Path, PathBuf};

use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};
use uuid::Uuid;

use hearth_core::HearthError;

use crate::types::{SessionMeta, TranscriptEvent};

/// UUID-keyed session store rooted at a `sessions/` directory.
pub struct SessionStore {
    root: PathBuf,
}

impl SessionStore {
    /// Opens the store, creating the sessions directory if needed.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, HearthError> {
        let root = root.into();
        std::fs::create_dir_all(&root).map_err(|e| HearthError::Session {
            message: format!("failed to create sessions directory {}: {e}", root.display()),
            source: Some(Box::new(e)),
        })?;
        Ok(Self { root })
    }

    /// Creates a new session bound to the given agent id.
    pub async fn create(&self, agent_id: &str) -> Result<SessionMeta, HearthError> {
        let now = chrono::Utc::now().to_rfc3339();
        let meta = SessionMeta {
            session_key: Uuid::new_v4().to_string(),
            agent_id: agent_id.to_string(),
            created_at: now.clone(),
            updated_at: now,
            label: None,
        };
        self.write_meta(&meta).await?;
        debug!(session_key = meta.session_key.as_str(), agent_id, "session created");
        Ok(meta)
    }

    /// Looks up a session by key. Unknown or malformed keys return `None`.
    pub async fn get(&self, key: &str) -> Result<Option<SessionMeta>, HearthError> {
        // Keys become path components; anything that is not a UUID is unknown.
        if Uuid::parse_str(key).is_err() {
            return Ok(None);
        }
        let path = self.meta_path(key);
        let raw = match tokio::fs::read_to_string(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(HearthError::Session {
                    message: format!("failed to read {}: {e}", path.display()),
                    source: Some(Box::new(e)),
                });
            }
        };
        match serde_json::from_str(&raw) {
            Ok(meta) => Ok(Some(meta)),
            Err(e) => {
                warn!(key, error = %e, "malformed session metadata");
                Ok(None)
            }
        }
    }

    /// Lists all session metadata, newest-first by creation time.
    /// Malformed metadata files are skipped.
    pub async fn list(&self) -> Result<Vec<SessionMeta>, HearthError> {
        let mut entries = tokio::fs::read_dir(&self.root)
            .await
            .map_err(|e| HearthError::Session {
                message: format!("failed to list {}: {e}", self.root.display()),
                source: Some(Box::new(e)),
            })?;

        let mut sessions = Vec::new();
        while let Ok(Some(entry)) = entries.next_entry().await.map_err(|e| {
            warn!(error = %e, "error while scanning sessions directory");
            e
        }) {
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            let Some(key) = name.strip_suffix(".meta.json") else {
                continue;
            };
            if let Some(meta) = self.get(key).await? {
                sessions.push(meta);
            }
        }

        sessions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(sessions)
    }

    /// Updates the session's `updated_at` timestamp.
    pub async fn touch(&self, key: &str) -> Result<(), HearthError> {
        if let Some(mut meta) = self.get(key).await? {
            meta.updated_at = chrono::Utc::now().to_rfc3339();
            self.write_meta(&meta).await?;
        }
        Ok(())
    }

    /// Sets the session's human label.
    pub async fn set_label(&self, key: &str, label: &str) -> Result<(), HearthError> {
        if let Some(mut meta) = self.get(key).await? {
            meta.label = Some(label.to_string());
            meta.updated_at = chrono::Utc::now().to_rfc3339();
            self.write_meta(&meta).await?;
        }
        Ok(())
    }

    /// Appends one record to the session's transcript and touches the
    /// metadata. The transcript is strictly append-only.
    pub async fn append_event(
        &self,
        key: &str,
        event: &TranscriptEvent,
    ) -> Result<(), HearthError> {
        let mut line = serde_json::to_string(event).map_err(|e| HearthError::Session {
            message: format!("failed to serialize transcript event: {e}"),
            source: Some(Box::new(e)),
        })?;
        line.push('\n');

        let path = self.transcript_path(key);
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|e| HearthError::Session {
                message: format!("failed to open {}: {e}", path.display()),
                source: Some(Box::new(e)),
            })?;
        file.write_all(line.as_bytes())
            .await
            .map_err(|e| HearthError::Session {
                message: format!("failed to append to {}: {e}", path.display()),
                source: Some(Box::new(e)),
            })?;

        self.touch(key).await
    }

    /// Reads the transcript in append order. A partial or malformed trailing
    /// line (torn write) is discarded silently. When `limit` is set, only the
    /// most recent `limit` records are returned.
    pub async fn read_events(
        &self,
        key: &str,
        limit: Option<usize>,
    ) -> Result<Vec<TranscriptEvent>, HearthError> {
        let path = self.transcript_path(key);
        let raw = match tokio::fs::read_to_string(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(HearthError::Session {
                    message: format!("failed to read {}: {e}", path.display()),
                    source: Some(Box::new(e)),
                });
            }
        };

        let mut events: Vec<TranscriptEvent> = Vec::new();
        for line in raw.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match serde_json::from_str(line) {
                Ok(event) => events.push(event),
                Err(_) => {
                    // Torn or malformed record, most likely a partial trailing
                    // line after a crash.
                    debug!(key, "discarding malformed transcript line");
                }
            }
        }

        if let Some(limit) = limit {
            if events.len() > limit {
                events.drain(..events.len() - limit);
            }
        }
        Ok(events)
    }

    fn meta_path(&self, key: &str) -> PathBuf {
        self.root.join(format!("{key}.meta.json"))
    }

    fn transcript_path(&self, key: &str) -> PathBuf {
        self.root.join(format!("{key}.jsonl"))
    }

    /// The sessions directory this store is rooted at.
    pub fn root(&self) -> &Path {
        &self.root
    }

    async fn write_meta(&self, meta: &SessionMeta) -> Result<(), HearthError> {
        let path = self.meta_path(&meta.session_key);
        let raw = serde_json::to_string_pretty(meta).map_err(|e| HearthError::Session {
            message: format!("failed to serialize session metadata: {e}"),
            source: Some(Box::new(e)),
        })?;
        tokio::fs::write(&path, raw)
            .await
            .map_err(|e| HearthError::Session {
                message: format!("failed to write {}: {e}", path.display()),
                source: Some(Box::new(e)),
            })
    }
}
