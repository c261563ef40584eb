// SPDX-FileCopyrightText: 2026 Hearth Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered merging.
//!
//! Merge order (later overrides earlier): compiled defaults, then
//! `config.json` in the data directory, then the two recognized environment
//! overrides `HEARTH_GATEWAY_HOST` and `HEARTH_GATEWAY_PORT`. Credentials
//! (`HEARTH_GATEWAY_TOKEN`, provider API keys) are read elsewhere and are
//! never part of the config model.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without a wrapper

use std::path::Path;

use figment::{
    Figment,
    providers::{Format, Json, Serialized},
};

use crate::model::HearthConfig;

/// Environment variable overriding `gateway.host`.
pub const GATEWAY_HOST_ENV: &str = "HEARTH_GATEWAY_HOST";

/// Environment variable overriding `gateway.port`.
pub const GATEWAY_PORT_ENV: &str = "HEARTH_GATEWAY_PORT";

/// Load configuration from `<data_dir>/config.json` with env var overrides.
///
/// A missing config file is not an error; defaults apply.
pub fn load_config(data_dir: &Path) -> Result<HearthConfig, figment::Error> {
    let mut config: HearthConfig = Figment::new()
        .merge(Serialized::defaults(HearthConfig::default()))
        .merge(Json::file(data_dir.join("config.json")))
        .extract()?;
    apply_env_overrides(&mut config);
    Ok(config)
}

/// Load configuration from a JSON string only (tests and tooling).
pub fn load_config_from_str(json: &str) -> Result<HearthConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(HearthConfig::default()))
        .merge(Json::string(json))
        .extract()
}

/// The recognized environment overrides: gateway host and port. Scoped
/// explicitly so credential variables sharing the prefix never reach the
/// config model.
fn apply_env_overrides(config: &mut HearthConfig) {
    if let Ok(host) = std::env::var(GATEWAY_HOST_ENV) {
        if !host.is_empty() {
            config.gateway.host = host;
        }
    }
    if let Ok(port) = std::env::var(GATEWAY_PORT_ENV) {
        match port.parse() {
            Ok(port) => config.gateway.port = port,
            Err(_) => tracing::warn!(value = port.as_str(), "ignoring non-numeric {GATEWAY_PORT_ENV}"),
        }
    }
}
