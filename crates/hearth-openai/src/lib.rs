// SPDX-FileCopyrightText: 2026 Hearth Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! OpenAI provider adapter for the Hearth gateway.
//!
//! Implements [`ChatProvider`] over the chat-completions streaming API,
//! mapping delta/tool-call-index streaming onto the neutral [`ChatEvent`]
//! sequence. Tool-call argument fragments are accumulated per index and
//! surfaced as one `ToolCall` each; malformed accumulated JSON degrades to an
//! empty input object.

pub mod client;
pub mod types;

use std::collections::BTreeMap;

use async_trait::async_trait;
use futures::StreamExt;
use hearth_core::{
    ChatEvent, ChatEventStream, ChatProvider, ChatRequest, ContentBlock, HearthError,
    MessageContent, Role, TokenUsage, ToolDefinition,
};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::client::OpenAiClient;
use crate::types::{
    ChatChunk, ChatCompletionRequest, OaiFunction, OaiFunctionCall, OaiMessage, OaiTool,
    OaiToolCall, StreamOptions,
};

/// Model used when an agent binding does not name one.
const DEFAULT_MODEL: &str = "gpt-4o";

/// The adapter decides the completion cap; the runner never supplies one.
const DEFAULT_MAX_COMPLETION_TOKENS: u32 = 4096;

/// OpenAI provider implementing [`ChatProvider`].
pub struct OpenAiProvider {
    client: OpenAiClient,
}

impl OpenAiProvider {
    /// Creates a provider from the `OPENAI_API_KEY` environment variable.
    pub fn from_env() -> Result<Option<Self>, HearthError> {
        match std::env::var("OPENAI_API_KEY") {
            Ok(key) if !key.is_empty() => Ok(Some(Self {
                client: OpenAiClient::new(&key)?,
            })),
            _ => Ok(None),
        }
    }

    /// Creates a provider with an existing client (tests).
    pub fn with_client(client: OpenAiClient) -> Self {
        Self { client }
    }

    /// Converts a neutral [`ChatRequest`] into the OpenAI wire format.
    fn to_completion_request(request: &ChatRequest) -> ChatCompletionRequest {
        let mut messages = Vec::new();
        if let Some(system) = &request.system_prompt {
            messages.push(OaiMessage {
                role: "system".into(),
                content: Some(system.clone()),
                tool_calls: None,
                tool_call_id: None,
            });
        }
        for message in &request.messages {
            convert_message(message, &mut messages);
        }

        let tools = if request.tools.is_empty() {
            None
        } else {
            Some(request.tools.iter().map(convert_tool).collect())
        };

        ChatCompletionRequest {
            model: request.model.clone(),
            messages,
            stream: true,
            stream_options: StreamOptions { include_usage: true },
            tools,
            max_completion_tokens: Some(DEFAULT_MAX_COMPLETION_TOKENS),
        }
    }
}

#[async_trait]
impl ChatProvider for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
    }

    fn default_model(&self) -> &str {
        DEFAULT_MODEL
    }

    async fn chat(&self, request: ChatRequest) -> Result<ChatEventStream, HearthError> {
        let api_request = Self::to_completion_request(&request);
        let sse_stream = self.client.stream_completion(&api_request).await?;

        let (tx, rx) = mpsc::channel::<ChatEvent>(32);
        tokio::spawn(pump_events(sse_stream, tx));

        let stream = futures::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|event| (event, rx))
        });
        Ok(Box::pin(stream))
    }
}

/// Tool-call fragments being assembled, keyed by stream index.
#[derive(Default)]
struct PendingToolCall {
    id: String,
    name: String,
    arguments: String,
}

/// Consumes the vendor SSE stream and re-emits the neutral event sequence.
async fn pump_events(
    mut sse_stream: std::pin::Pin<
        Box<dyn futures::Stream<Item = Result<eventsource_stream::Event, HearthError>> + Send>,
    >,
    tx: mpsc::Sender<ChatEvent>,
) {
    let mut usage = TokenUsage::default();
    // BTreeMap keeps flushed tool calls in index order.
    let mut pending: BTreeMap<usize, PendingToolCall> = BTreeMap::new();

    while let Some(item) = sse_stream.next().await {
        match item {
            Ok(event) if event.data.trim() == "[DONE]" => {
                if flush_tool_calls(&mut pending, &tx).await.is_err() {
                    return;
                }
                let _ = tx.send(ChatEvent::Final { usage }).await;
                return;
            }
            Ok(event) => {
                let chunk: ChatChunk = match serde_json::from_str(&event.data) {
                    Ok(chunk) => chunk,
                    Err(e) => {
                        debug!(error = %e, "skipping unparseable chunk");
                        continue;
                    }
                };
                if let Some(u) = chunk.usage {
                    usage.input_tokens = u.prompt_tokens;
                    usage.output_tokens = u.completion_tokens;
                }
                for choice in chunk.choices {
                    if let Some(text) = choice.delta.content {
                        if !text.is_empty()
                            && tx.send(ChatEvent::Delta { text }).await.is_err()
                        {
                            debug!("chat event receiver dropped, cancelling stream");
                            return;
                        }
                    }
                    for fragment in choice.delta.tool_calls.unwrap_or_default() {
                        let entry = pending.entry(fragment.index).or_default();
                        if let Some(id) = fragment.id {
                            entry.id = id;
                        }
                        if let Some(function) = fragment.function {
                            if let Some(name) = function.name {
                                entry.name = name;
                            }
                            if let Some(arguments) = function.arguments {
                                entry.arguments.push_str(&arguments);
                            }
                        }
                    }
                    if choice.finish_reason.as_deref() == Some("tool_calls")
                        && flush_tool_calls(&mut pending, &tx).await.is_err()
                    {
                        return;
                    }
                }
            }
            Err(e) => {
                let _ = tx.send(ChatEvent::Error { message: e.to_string() }).await;
                return;
            }
        }
    }

    let _ = tx
        .send(ChatEvent::Error {
            message: "provider stream ended without a terminal event".into(),
        })
        .await;
}

/// Emits all assembled tool calls in index order.
async fn flush_tool_calls(
    pending: &mut BTreeMap<usize, PendingToolCall>,
    tx: &mpsc::Sender<ChatEvent>,
) -> Result<(), ()> {
    for (_, call) in std::mem::take(pending) {
        let input = parse_tool_arguments(&call.name, &call.arguments);
        let event = ChatEvent::ToolCall {
            name: call.name,
            input,
            call_id: call.id,
        };
        if tx.send(event).await.is_err() {
            return Err(());
        }
    }
    Ok(())
}

/// Parses accumulated tool arguments, degrading to an empty object on
/// malformed JSON.
fn parse_tool_arguments(name: &str, arguments: &str) -> serde_json::Value {
    if arguments.trim().is_empty() {
        return serde_json::json!({});
    }
    match serde_json::from_str(arguments) {
        Ok(value) => value,
        Err(e) => {
            warn!(tool = name, error = %e, "malformed tool arguments, substituting empty object");
            serde_json::json!({})
        }
    }
}

/// Converts one neutral message into OpenAI-format messages.
///
/// The neutral protocol carries tool results inside the next user message;
/// OpenAI expects one "tool" role message per result instead.
fn convert_message(message: &hearth_core::ChatMessage, out: &mut Vec<OaiMessage>) {
    let role = match message.role {
        Role::User => "user",
        Role::Assistant => "assistant",
    };
    match &message.content {
        MessageContent::Text(text) => out.push(OaiMessage {
            role: role.into(),
            content: Some(text.clone()),
            tool_calls: None,
            tool_call_id: None,
        }),
        MessageContent::Blocks(blocks) => {
            let mut text = String::new();
            let mut tool_calls = Vec::new();
            for block in blocks {
                match block {
                    ContentBlock::Text { text: t } => text.push_str(t),
                    ContentBlock::ToolUse { id, name, input } => tool_calls.push(OaiToolCall {
                        id: id.clone(),
                        kind: "function".into(),
                        function: OaiFunctionCall {
                            name: name.clone(),
                            arguments: input.to_string(),
                        },
                    }),
                    ContentBlock::ToolResult { tool_use_id, content } => out.push(OaiMessage {
                        role: "tool".into(),
                        content: Some(content.clone()),
                        tool_calls: None,
                        tool_call_id: Some(tool_use_id.clone()),
                    }),
                }
            }
            if !text.is_empty() || !tool_calls.is_empty() {
                out.push(OaiMessage {
                    role: role.into(),
                    content: if text.is_empty() { None } else { Some(text) },
                    tool_calls: if tool_calls.is_empty() {
                        None
                    } else {
                        Some(tool_calls)
                    },
                    tool_call_id: None,
                });
            }
        }
    }
}

fn convert_tool(tool: &ToolDefinition) -> OaiTool {
    OaiTool {
        kind: "function".into(),
        function: OaiFunction {
            name: tool.name.clone(),
            description: tool.description.clone(),
            parameters: tool.input_schema.clone(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hearth_core::ChatMessage;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn request() -> ChatRequest {
        ChatRequest {
            model: DEFAULT_MODEL.into(),
            system_prompt: Some("Be brief.".into()),
            messages: vec![ChatMessage::user("hi")],
            tools: vec![],
        }
    }

    async fn provider_for(sse: &str) -> (MockServer, OpenAiProvider) {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/event-stream")
                    .set_body_string(sse.to_string()),
            )
            .mount(&server)
            .await;
        let client = OpenAiClient::new("test-key")
            .unwrap()
            .with_base_url(server.uri());
        (server, OpenAiProvider::with_client(client))
    }

    async fn collect(provider: &OpenAiProvider) -> Vec<ChatEvent> {
        let mut stream = provider.chat(request()).await.unwrap();
        let mut events = Vec::new();
        while let Some(event) = stream.next().await {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn text_deltas_and_usage_map_to_neutral_events() {
        let sse = "data: {\"choices\":[{\"delta\":{\"content\":\"Hel\"},\"finish_reason\":null}]}\n\n\
                   data: {\"choices\":[{\"delta\":{\"content\":\"lo\"},\"finish_reason\":null}]}\n\n\
                   data: {\"choices\":[{\"delta\":{},\"finish_reason\":\"stop\"}]}\n\n\
                   data: {\"choices\":[],\"usage\":{\"prompt_tokens\":9,\"completion_tokens\":2}}\n\n\
                   data: [DONE]\n\n";
        let (_server, provider) = provider_for(sse).await;
        let events = collect(&provider).await;

        assert_eq!(events.len(), 3);
        assert!(matches!(&events[0], ChatEvent::Delta { text } if text == "Hel"));
        assert!(matches!(&events[1], ChatEvent::Delta { text } if text == "lo"));
        match &events[2] {
            ChatEvent::Final { usage } => {
                assert_eq!(usage.input_tokens, 9);
                assert_eq!(usage.output_tokens, 2);
            }
            other => panic!("expected Final, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn tool_call_fragments_are_assembled_by_index() {
        let sse = "data: {\"choices\":[{\"delta\":{\"tool_calls\":[{\"index\":0,\"id\":\"call_1\",\"function\":{\"name\":\"bash\",\"arguments\":\"\"}}]},\"finish_reason\":null}]}\n\n\
                   data: {\"choices\":[{\"delta\":{\"tool_calls\":[{\"index\":0,\"function\":{\"arguments\":\"{\\\"command\\\": \"}}]},\"finish_reason\":null}]}\n\n\
                   data: {\"choices\":[{\"delta\":{\"tool_calls\":[{\"index\":0,\"function\":{\"arguments\":\"\\\"echo hello\\\"}\"}}]},\"finish_reason\":null}]}\n\n\
                   data: {\"choices\":[{\"delta\":{},\"finish_reason\":\"tool_calls\"}]}\n\n\
                   data: [DONE]\n\n";
        let (_server, provider) = provider_for(sse).await;
        let events = collect(&provider).await;

        assert_eq!(events.len(), 2);
        match &events[0] {
            ChatEvent::ToolCall { name, input, call_id } => {
                assert_eq!(name, "bash");
                assert_eq!(call_id, "call_1");
                assert_eq!(input["command"], "echo hello");
            }
            other => panic!("expected ToolCall, got {other:?}"),
        }
        assert!(matches!(&events[1], ChatEvent::Final { .. }));
    }

    #[tokio::test]
    async fn malformed_arguments_become_empty_object() {
        let sse = "data: {\"choices\":[{\"delta\":{\"tool_calls\":[{\"index\":0,\"id\":\"call_2\",\"function\":{\"name\":\"bash\",\"arguments\":\"{oops\"}}]},\"finish_reason\":null}]}\n\n\
                   data: {\"choices\":[{\"delta\":{},\"finish_reason\":\"tool_calls\"}]}\n\n\
                   data: [DONE]\n\n";
        let (_server, provider) = provider_for(sse).await;
        let events = collect(&provider).await;

        match &events[0] {
            ChatEvent::ToolCall { input, .. } => assert_eq!(*input, serde_json::json!({})),
            other => panic!("expected ToolCall, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn truncated_stream_yields_terminal_error() {
        let sse = "data: {\"choices\":[{\"delta\":{\"content\":\"partial\"},\"finish_reason\":null}]}\n\n";
        let (_server, provider) = provider_for(sse).await;
        let events = collect(&provider).await;

        assert_eq!(events.len(), 2);
        assert!(matches!(&events[1], ChatEvent::Error { .. }));
    }

    #[test]
    fn conversion_splits_tool_results_into_tool_messages() {
        let req = ChatRequest {
            model: DEFAULT_MODEL.into(),
            system_prompt: Some("sys".into()),
            messages: vec![
                ChatMessage::user("run it"),
                hearth_core::ChatMessage {
                    role: Role::Assistant,
                    content: MessageContent::Blocks(vec![
                        ContentBlock::Text {
                            text: "ok".into(),
                        },
                        ContentBlock::ToolUse {
                            id: "call_1".into(),
                            name: "bash".into(),
                            input: serde_json::json!({"command": "ls"}),
                        },
                    ]),
                },
                hearth_core::ChatMessage {
                    role: Role::User,
                    content: MessageContent::Blocks(vec![ContentBlock::ToolResult {
                        tool_use_id: "call_1".into(),
                        content: "files\n".into(),
                    }]),
                },
            ],
            tools: vec![],
        };
        let api = OpenAiProvider::to_completion_request(&req);

        assert_eq!(api.messages.len(), 4);
        assert_eq!(api.messages[0].role, "system");
        assert_eq!(api.messages[1].role, "user");
        assert_eq!(api.messages[2].role, "assistant");
        assert_eq!(api.messages[2].tool_calls.as_ref().unwrap().len(), 1);
        assert_eq!(api.messages[3].role, "tool");
        assert_eq!(api.messages[3].tool_call_id.as_deref(), Some("call_1"));
    }

    #[test]
    fn conversion_sets_adapter_policy() {
        let api = OpenAiProvider::to_completion_request(&request());
        assert!(api.stream);
        assert!(api.stream_options.include_usage);
        assert_eq!(api.max_completion_tokens, Some(DEFAULT_MAX_COMPLETION_TOKENS));
    }
}
