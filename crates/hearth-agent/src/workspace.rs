// SPDX-FileCopyrightText: 2026 Hearth Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Workspace file parsing: `AGENTS.md`, `SOUL.md`, `TOOLS.md`, `SCHEDULER.md`.
//!
//! The workspace is user-editable markdown consulted at every turn. In
//! `AGENTS.md`, each second-level heading names an agent; a
//! `Model: <provider>/<model>` line under it binds the provider. The parser
//! tolerates arbitrary surrounding prose.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use tracing::{debug, warn};

use hearth_core::{ChatProvider, HearthError};

/// One agent parsed from `AGENTS.md`.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentBinding {
    pub id: String,
    /// Provider name from the `Model:` line ("anthropic", "openai", ...).
    /// Empty when the agent has no `Model:` line.
    pub provider: String,
    /// Model identifier from the `Model:` line; empty to use the provider's
    /// default.
    pub model: String,
    /// First prose line under the heading.
    pub description: Option<String>,
}

/// Parses `AGENTS.md` into the ordered list of agents it declares.
/// A missing or unreadable file yields an empty list.
pub async fn list_agents(workspace: &Path) -> Vec<AgentBinding> {
    let path = workspace.join("AGENTS.md");
    let raw = match tokio::fs::read_to_string(&path).await {
        Ok(raw) => raw,
        Err(_) => return Vec::new(),
    };
    parse_agents(&raw)
}

/// Looks up one agent by id.
pub async fn resolve_agent(workspace: &Path, agent_id: &str) -> Option<AgentBinding> {
    list_agents(workspace)
        .await
        .into_iter()
        .find(|agent| agent.id == agent_id)
}

fn parse_agents(raw: &str) -> Vec<AgentBinding> {
    let mut agents: Vec<AgentBinding> = Vec::new();
    for line in raw.lines() {
        let trimmed = line.trim();
        if let Some(heading) = trimmed.strip_prefix("## ") {
            let id = heading.trim().to_string();
            if !id.is_empty() {
                agents.push(AgentBinding {
                    id,
                    provider: String::new(),
                    model: String::new(),
                    description: None,
                });
            }
            continue;
        }
        let Some(current) = agents.last_mut() else {
            continue;
        };
        // The first `Model:` line under a heading binds the provider.
        let lower = trimmed.to_ascii_lowercase();
        if let Some(rest) = lower.strip_prefix("model:") {
            if current.provider.is_empty() && current.model.is_empty() {
                let value = trimmed[trimmed.len() - rest.len()..].trim();
                match value.split_once('/') {
                    Some((provider, model)) => {
                        current.provider = provider.trim().to_string();
                        current.model = model.trim().to_string();
                    }
                    None => {
                        current.provider = value.to_string();
                    }
                }
            }
            continue;
        }
        if current.description.is_none() && !trimmed.is_empty() && !trimmed.starts_with('#') {
            current.description = Some(trimmed.to_string());
        }
    }
    agents
}

/// Selects the provider and model for an agent binding.
///
/// The bound provider wins when configured. Otherwise the configured
/// fallback order is walked; as a last resort the first configured provider
/// (by name) is used with its default model.
pub fn select_provider(
    binding: Option<&AgentBinding>,
    providers: &HashMap<String, Arc<dyn ChatProvider>>,
    fallback_order: &[String],
) -> Result<(Arc<dyn ChatProvider>, String), HearthError> {
    if let Some(binding) = binding {
        if let Some(provider) = providers.get(&binding.provider) {
            let model = if binding.model.is_empty() {
                provider.default_model().to_string()
            } else {
                binding.model.clone()
            };
            return Ok((provider.clone(), model));
        }
        if !binding.provider.is_empty() {
            debug!(
                agent = binding.id.as_str(),
                provider = binding.provider.as_str(),
                "bound provider unavailable, applying fallback order"
            );
        }
    }

    for name in fallback_order {
        if let Some(provider) = providers.get(name) {
            return Ok((provider.clone(), provider.default_model().to_string()));
        }
    }

    let mut names: Vec<&String> = providers.keys().collect();
    names.sort();
    match names.first() {
        Some(name) => {
            let provider = providers[name.as_str()].clone();
            let model = provider.default_model().to_string();
            Ok((provider, model))
        }
        None => Err(HearthError::Internal("no providers configured".into())),
    }
}

/// Builds the system prompt for a turn: the base prompt plus `SOUL.md` and
/// `TOOLS.md`, plus the `SCHEDULER.md` overlay for scheduled runs.
pub async fn compose_system_prompt(
    workspace: &Path,
    agent_id: &str,
    scheduler_overlay: bool,
) -> String {
    let mut parts = vec![format!(
        "You are {agent_id}, a local-first personal assistant running on the user's machine."
    )];

    for name in ["SOUL.md", "TOOLS.md"] {
        if let Some(content) = read_overlay(workspace, name).await {
            parts.push(content);
        }
    }
    if scheduler_overlay {
        if let Some(content) = read_overlay(workspace, "SCHEDULER.md").await {
            parts.push(content);
        }
    }

    parts.join("\n\n")
}

async fn read_overlay(workspace: &Path, name: &str) -> Option<String> {
    let path = workspace.join(name);
    match tokio::fs::read_to_string(&path).await {
        Ok(content) => {
            let trimmed = content.trim().to_string();
            (!trimmed.is_empty()).then_some(trimmed)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "failed to read workspace overlay");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use hearth_core::{ChatEventStream, ChatRequest};

    const SAMPLE: &str = "\
# My agents

Some prose the parser must tolerate.

## assistant
The default helper for everyday questions.
Model: anthropic/claude-sonnet-4-20250514

More prose here.

## researcher
Careful long-form researcher.
Model: openai/gpt-4o

## plain
An agent with no model line.
";

    #[test]
    fn parses_headings_models_and_descriptions() {
        let agents = parse_agents(SAMPLE);
        assert_eq!(agents.len(), 3);

        assert_eq!(agents[0].id, "assistant");
        assert_eq!(agents[0].provider, "anthropic");
        assert_eq!(agents[0].model, "claude-sonnet-4-20250514");
        assert_eq!(
            agents[0].description.as_deref(),
            Some("The default helper for everyday questions.")
        );

        assert_eq!(agents[1].id, "researcher");
        assert_eq!(agents[1].provider, "openai");

        assert_eq!(agents[2].id, "plain");
        assert!(agents[2].provider.is_empty());
    }

    #[test]
    fn first_model_line_wins() {
        let raw = "## a\nModel: openai/gpt-4o\nModel: anthropic/claude\n";
        let agents = parse_agents(raw);
        assert_eq!(agents[0].provider, "openai");
    }

    #[test]
    fn empty_input_yields_no_agents() {
        assert!(parse_agents("").is_empty());
        assert!(parse_agents("just prose, no headings").is_empty());
    }

    #[tokio::test]
    async fn resolve_agent_finds_by_id() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::write(dir.path().join("AGENTS.md"), SAMPLE).await.unwrap();

        let agent = resolve_agent(dir.path(), "researcher").await.unwrap();
        assert_eq!(agent.provider, "openai");
        assert!(resolve_agent(dir.path(), "missing").await.is_none());
    }

    struct NamedProvider(&'static str, &'static str);

    #[async_trait]
    impl ChatProvider for NamedProvider {
        fn name(&self) -> &str {
            self.0
        }
        fn default_model(&self) -> &str {
            self.1
        }
        async fn chat(&self, _request: ChatRequest) -> Result<ChatEventStream, HearthError> {
            Err(HearthError::Internal("not used".into()))
        }
    }

    fn providers() -> HashMap<String, Arc<dyn ChatProvider>> {
        let mut map: HashMap<String, Arc<dyn ChatProvider>> = HashMap::new();
        map.insert(
            "anthropic".into(),
            Arc::new(NamedProvider("anthropic", "claude-sonnet-4-20250514")),
        );
        map.insert("openai".into(), Arc::new(NamedProvider("openai", "gpt-4o")));
        map
    }

    #[test]
    fn bound_provider_wins() {
        let binding = AgentBinding {
            id: "a".into(),
            provider: "anthropic".into(),
            model: "claude-custom".into(),
            description: None,
        };
        let (provider, model) =
            select_provider(Some(&binding), &providers(), &["openai".into()]).unwrap();
        assert_eq!(provider.name(), "anthropic");
        assert_eq!(model, "claude-custom");
    }

    #[test]
    fn unavailable_provider_falls_back_in_configured_order() {
        let binding = AgentBinding {
            id: "a".into(),
            provider: "mistral".into(),
            model: "misty".into(),
            description: None,
        };
        let order = vec!["openai".to_string(), "anthropic".to_string()];
        let (provider, model) = select_provider(Some(&binding), &providers(), &order).unwrap();
        assert_eq!(provider.name(), "openai");
        assert_eq!(model, "gpt-4o");
    }

    #[test]
    fn exhausted_fallback_uses_first_present_by_name() {
        let mut map: HashMap<String, Arc<dyn ChatProvider>> = HashMap::new();
        map.insert(
            "anthropic".into(),
            Arc::new(NamedProvider("anthropic", "claude-sonnet-4-20250514")),
        );
        let order = vec!["openai".to_string()];
        let (provider, _) = select_provider(None, &map, &order).unwrap();
        assert_eq!(provider.name(), "anthropic");
    }

    #[test]
    fn no_providers_is_an_error() {
        let map: HashMap<String, Arc<dyn ChatProvider>> = HashMap::new();
        assert!(select_provider(None, &map, &[]).is_err());
    }

    #[tokio::test]
    async fn system_prompt_appends_soul_and_tools() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::write(dir.path().join("SOUL.md"), "Be warm.").await.unwrap();
        tokio::fs::write(dir.path().join("TOOLS.md"), "Prefer bash.").await.unwrap();
        tokio::fs::write(dir.path().join("SCHEDULER.md"), "Nightly rules.").await.unwrap();

        let prompt = compose_system_prompt(dir.path(), "assistant", false).await;
        assert!(prompt.starts_with("You are assistant"));
        assert!(prompt.contains("Be warm."));
        assert!(prompt.contains("Prefer bash."));
        assert!(!prompt.contains("Nightly rules."));

        let scheduled = compose_system_prompt(dir.path(), "assistant", true).await;
        assert!(scheduled.contains("Nightly rules."));
    }

    #[tokio::test]
    async fn system_prompt_without_workspace_files_is_base_only() {
        let dir = tempfile::tempdir().unwrap();
        let prompt = compose_system_prompt(dir.path(), "helper", false).await;
        assert!(prompt.starts_with("You are helper"));
        assert!(!prompt.contains("\n\n"));
    }
}
