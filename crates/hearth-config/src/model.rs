// SPDX-FileCopyrightText: 2026 Hearth Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Hearth gateway.
//!
//! Serialized as camelCase JSON (`config.json` in the data directory). All
//! sections are optional and default to sensible values. API keys and the
//! gateway auth token are never part of this model; they are read only from
//! the environment.

use serde::{Deserialize, Serialize};

/// Top-level Hearth configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct HearthConfig {
    /// Loopback bind address for the gateway.
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Agent defaults and workspace location.
    #[serde(default)]
    pub agents: AgentsConfig,

    /// Built-in tool limits.
    #[serde(default)]
    pub tools: ToolsConfig,

    /// External memory indexer toggle; not consumed by the core.
    #[serde(default)]
    pub memory: MemoryConfig,

    /// Audit log and secret redaction toggles.
    #[serde(default)]
    pub security: SecurityConfig,
}

/// Gateway bind configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct GatewayConfig {
    /// Host address to bind. Must resolve to loopback.
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to bind.
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    18789
}

/// Agent defaults and workspace location.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct AgentsConfig {
    /// Agent id used when none is specified on session creation.
    #[serde(default = "default_agent")]
    pub default: String,

    /// Override for the workspace directory holding `AGENTS.md` and friends.
    /// `None` means the data directory's `workspace/` subdirectory.
    #[serde(default)]
    pub workspace_path: Option<String>,

    /// Provider preference order when an agent names a provider that is not
    /// configured. The first present provider wins; its default model is used.
    #[serde(default = "default_provider_fallback")]
    pub provider_fallback: Vec<String>,
}

impl Default for AgentsConfig {
    fn default() -> Self {
        Self {
            default: default_agent(),
            workspace_path: None,
            provider_fallback: default_provider_fallback(),
        }
    }
}

fn default_agent() -> String {
    "assistant".to_string()
}

fn default_provider_fallback() -> Vec<String> {
    vec!["openai".to_string(), "anthropic".to_string()]
}

/// Built-in tool limits.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ToolsConfig {
    /// Shell tool wall-clock cap in milliseconds.
    #[serde(default = "default_tool_timeout_ms")]
    pub timeout: u64,

    /// Shell tool merged stdout+stderr cap in bytes.
    #[serde(default = "default_max_output_bytes")]
    pub max_output_bytes: usize,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            timeout: default_tool_timeout_ms(),
            max_output_bytes: default_max_output_bytes(),
        }
    }
}

fn default_tool_timeout_ms() -> u64 {
    120_000
}

fn default_max_output_bytes() -> usize {
    100 * 1024
}

/// External memory indexer configuration (interface only).
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct MemoryConfig {
    /// Whether the external indexer is expected to run.
    #[serde(default = "default_memory_enabled")]
    pub enabled: bool,

    /// Embedding model name handed to the external indexer.
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            enabled: default_memory_enabled(),
            embedding_model: default_embedding_model(),
        }
    }
}

fn default_memory_enabled() -> bool {
    true
}

fn default_embedding_model() -> String {
    "nomic-embed-text".to_string()
}

/// Audit log and secret redaction toggles.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SecurityConfig {
    /// Append-only audit log (default on).
    #[serde(default = "default_on")]
    pub audit_log: bool,

    /// Secret redaction of tool output (default on).
    #[serde(default = "default_on")]
    pub secrets_filter: bool,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            audit_log: default_on(),
            secrets_filter: default_on(),
        }
    }
}

fn default_on() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sensible() {
        let config = HearthConfig::default();
        assert_eq!(config.gateway.host, "127.0.0.1");
        assert_eq!(config.gateway.port, 18789);
        assert_eq!(config.agents.default, "assistant");
        assert_eq!(config.tools.timeout, 120_000);
        assert_eq!(config.tools.max_output_bytes, 102_400);
        assert!(config.security.audit_log);
        assert!(config.security.secrets_filter);
    }

    #[test]
    fn deserializes_camel_case_keys() {
        let json = r#"{
            "gateway": {"port": 9000},
            "agents": {"workspacePath": "/tmp/ws", "providerFallback": ["anthropic"]},
            "tools": {"maxOutputBytes": 4096},
            "security": {"auditLog": false}
        }"#;
        let config: HearthConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.gateway.port, 9000);
        assert_eq!(config.gateway.host, "127.0.0.1");
        assert_eq!(config.agents.workspace_path.as_deref(), Some("/tmp/ws"));
        assert_eq!(config.agents.provider_fallback, vec!["anthropic"]);
        assert_eq!(config.tools.max_output_bytes, 4096);
        assert!(!config.security.audit_log);
        assert!(config.security.secrets_filter);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let json = r#"{"gateway": {"prot": 9000}}"#;
        let result = serde_json::from_str::<HearthConfig>(json);
        assert!(result.is_err());
    }

    #[test]
    fn serializes_camel_case() {
        let config = HearthConfig::default();
        let json = serde_json::to_value(&config).unwrap();
        assert!(json["tools"]["maxOutputBytes"].is_number());
        assert!(json["security"]["secretsFilter"].is_boolean());
        assert!(json["agents"]["providerFallback"].is_array());
    }
}
