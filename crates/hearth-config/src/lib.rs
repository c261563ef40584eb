// SPDX-FileCopyrightText: 2026 Hearth Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model and loader for the Hearth gateway.

pub mod loader;
pub mod model;

pub use loader::{GATEWAY_HOST_ENV, GATEWAY_PORT_ENV, load_config, load_config_from_str};
pub use model::{
    AgentsConfig, GatewayConfig, HearthConfig, MemoryConfig, SecurityConfig, ToolsConfig,
};

/// Environment variable holding the gateway auth token. Read only from the
/// environment, never from `config.json`.
pub const GATEWAY_TOKEN_ENV: &str = "HEARTH_GATEWAY_TOKEN";

/// Returns the gateway auth token from the environment, if set and non-empty.
pub fn gateway_token() -> Option<String> {
    std::env::var(GATEWAY_TOKEN_ENV)
        .ok()
        .filter(|t| !t.is_empty())
}
