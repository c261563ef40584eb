// SPDX-FileCopyrightText: 2026 Hearth Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Registry of live chat runs and their cancellation handles.
//!
//! One entry exists per accepted `chat.send`; the runner removes it on the
//! terminal event, and `chat.abort` signals the handle out-of-band.

use dashmap::DashMap;
use tokio_util::sync::CancellationToken;

/// runId -> cancellation handle for every in-flight chat turn.
#[derive(Default)]
pub struct ActiveRuns {
    runs: DashMap<String, CancellationToken>,
}

impl ActiveRuns {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a run and returns its cancellation token.
    pub fn insert(&self, run_id: &str) -> CancellationToken {
        let token = CancellationToken::new();
        self.runs.insert(run_id.to_string(), token.clone());
        token
    }

    /// Signals the run's token and removes the entry. Returns false when the
    /// run is unknown (already terminal or never existed).
    pub fn abort(&self, run_id: &str) -> bool {
        match self.runs.remove(run_id) {
            Some((_, token)) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Removes a run that reached a terminal event.
    pub fn remove(&self, run_id: &str) {
        self.runs.remove(run_id);
    }

    /// Number of in-flight runs.
    pub fn len(&self) -> usize {
        self.runs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }
}
