// SPDX-FileCopyrightText: 2026 Hearth Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Built-in tools: shell execution, headless browser, schedule management.

pub mod browser;
pub mod schedule;
pub mod shell;

use std::sync::Arc;

pub use browser::{BrowserManager, BrowserTool};
pub use schedule::ScheduleTool;
pub use shell::ShellTool;

use crate::tool::ToolRegistry;

/// Registers the built-in tool set in its canonical order.
pub fn register_builtins(registry: &mut ToolRegistry, browser: Arc<BrowserManager>) {
    registry.register(Arc::new(ShellTool));
    registry.register(Arc::new(BrowserTool::new(browser)));
    registry.register(Arc::new(ScheduleTool));
}
