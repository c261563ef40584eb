// SPDX-FileCopyrightText: 2026 Hearth Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `hearth status` command implementation.
//!
//! Prints the resolved configuration, data-dir paths, and whether each
//! credential is present in the environment. Values are never printed.

use std::path::PathBuf;

use hearth_core::HearthError;
use hearth_security::CREDENTIAL_ENV_VARS;

use crate::serve::resolve_data_dir;

pub async fn run_status(data_dir: Option<PathBuf>) -> Result<(), HearthError> {
    let data_dir = resolve_data_dir(data_dir)?;
    let config = hearth_config::load_config(&data_dir)
        .map_err(|e| HearthError::Config(format!("failed to load config: {e}")))?;

    println!("hearth status");
    println!("  data dir:      {}", data_dir.display());
    println!("  config file:   {}", data_dir.join("config.json").display());
    println!("  database:      {}", data_dir.join("memory.db").display());
    println!("  sessions:      {}", data_dir.join("sessions").display());
    println!("  audit log:     {}", describe_toggle(config.security.audit_log));
    println!("  secret filter: {}", describe_toggle(config.security.secrets_filter));
    println!(
        "  gateway:       {}:{}",
        config.gateway.host, config.gateway.port
    );
    println!("  default agent: {}", config.agents.default);

    println!("credentials (from environment):");
    for name in CREDENTIAL_ENV_VARS {
        let present = std::env::var(name).map(|v| !v.is_empty()).unwrap_or(false);
        println!("  {name}: {}", if present { "set" } else { "not set" });
    }

    Ok(())
}

fn describe_toggle(enabled: bool) -> &'static str {
    if enabled { "enabled" } else { "disabled" }
}
