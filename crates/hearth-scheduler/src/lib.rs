// SPDX-FileCopyrightText: 2026 Hearth Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Cron scheduling for the Hearth gateway.
//!
//! [`cron::CronExpr`] parses 5-field expressions and solves next-run
//! instants; [`engine::SchedulerEngine`] owns the timer pool and replays the
//! agent pipeline unattended with approvals pre-granted.

pub mod cron;
pub mod engine;

pub use cron::CronExpr;
pub use engine::{BroadcastFn, SchedulerEngine};
