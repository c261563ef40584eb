// SPDX-FileCopyrightText: 2026 Hearth Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite storage (`memory.db`) for scheduled jobs, job runs, and the memory
//! search surface.
//!
//! All writes are serialized through tokio-rusqlite's single background
//! thread; the scheduler writes job rows concurrently with RPC reads.

pub mod database;
pub mod migrations;
pub mod models;
pub mod queries;

pub use database::Database;
pub use models::{JobPatch, JobRun, MemoryHit, NewJob, ScheduledJob};
