// SPDX-FileCopyrightText: 2026 Hearth Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Tool contract, approval coordination, and built-in tools for the Hearth
//! gateway.
//!
//! A [`Tool`] is a named side-effecting capability with a JSON-schema input;
//! side-effecting tools are gated behind the [`ApprovalCoordinator`]'s
//! human-in-the-loop flow unless the invoking context carries pre-granted
//! approval (scheduled runs).

pub mod approval;
pub mod builtin;
pub mod jobs;
pub mod tool;

pub use approval::{ApprovalCoordinator, ApprovalTicket, Decision};
pub use builtin::{BrowserManager, BrowserTool, ScheduleTool, ShellTool, register_builtins};
pub use jobs::JobScheduler;
pub use tool::{PushFn, Tool, ToolContext, ToolRegistry};
