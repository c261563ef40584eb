// SPDX-FileCopyrightText: 2026 Hearth Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Anthropic Claude provider adapter for the Hearth gateway.
//!
//! Implements [`ChatProvider`] over the Anthropic Messages API, mapping
//! content-block SSE streaming onto the neutral [`ChatEvent`] sequence.
//! Streaming fragments of a tool's JSON input are concatenated per block
//! index and yielded as one `ToolCall` event; a malformed accumulated JSON is
//! delivered as an empty input object rather than dropped.

pub mod client;
pub mod sse;
pub mod types;

use std::collections::HashMap;

use async_trait::async_trait;
use futures::StreamExt;
use hearth_core::{
    ChatEvent, ChatEventStream, ChatProvider, ChatRequest, ContentBlock, HearthError,
    MessageContent, Role, TokenUsage, ToolDefinition,
};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::client::AnthropicClient;
use crate::sse::StreamEvent;
use crate::types::{ApiContent, ApiContentBlock, ApiMessage, ApiToolDefinition, MessageRequest};

/// Model used when an agent binding does not name one.
const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";

/// The adapter decides max_tokens; the runner never supplies one.
const DEFAULT_MAX_TOKENS: u32 = 4096;

/// Anthropic Claude provider implementing [`ChatProvider`].
pub struct AnthropicProvider {
    client: AnthropicClient,
}

impl AnthropicProvider {
    /// Creates a provider from the `ANTHROPIC_API_KEY` environment variable.
    ///
    /// API keys are read only from the environment, never from the config
    /// file.
    pub fn from_env() -> Result<Option<Self>, HearthError> {
        match std::env::var("ANTHROPIC_API_KEY") {
            Ok(key) if !key.is_empty() => Ok(Some(Self {
                client: AnthropicClient::new(&key)?,
            })),
            _ => Ok(None),
        }
    }

    /// Creates a provider with an existing client (tests).
    pub fn with_client(client: AnthropicClient) -> Self {
        Self { client }
    }

    /// Converts a neutral [`ChatRequest`] into the Anthropic wire format.
    fn to_message_request(request: &ChatRequest) -> MessageRequest {
        let messages = request.messages.iter().map(convert_message).collect();
        let tools = if request.tools.is_empty() {
            None
        } else {
            Some(request.tools.iter().map(convert_tool).collect())
        };

        MessageRequest {
            model: request.model.clone(),
            messages,
            system: request.system_prompt.clone(),
            max_tokens: DEFAULT_MAX_TOKENS,
            stream: true,
            tools,
        }
    }
}

#[async_trait]
impl ChatProvider for AnthropicProvider {
    fn name(&self) -> &str {
        "anthropic"
    }

    fn default_model(&self) -> &str {
        DEFAULT_MODEL
    }

    async fn chat(&self, request: ChatRequest) -> Result<ChatEventStream, HearthError> {
        let api_request = Self::to_message_request(&request);
        let sse_stream = self.client.stream_message(&api_request).await?;

        // The pump task owns the SSE stream and the tool-call assembly state.
        // Dropping the returned stream closes the channel, which ends the
        // pump and releases the connection.
        let (tx, rx) = mpsc::channel::<ChatEvent>(32);
        tokio::spawn(pump_events(sse_stream, tx));

        let stream = futures::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|event| (event, rx))
        });
        Ok(Box::pin(stream))
    }
}

/// Tool-call input being assembled from streamed JSON fragments.
struct PendingToolCall {
    id: String,
    name: String,
    input_json: String,
}

/// Consumes the vendor SSE stream and re-emits the neutral event sequence.
async fn pump_events(
    mut sse_stream: std::pin::Pin<
        Box<dyn futures::Stream<Item = Result<StreamEvent, HearthError>> + Send>,
    >,
    tx: mpsc::Sender<ChatEvent>,
) {
    let mut usage = TokenUsage::default();
    let mut pending: HashMap<usize, PendingToolCall> = HashMap::new();

    while let Some(item) = sse_stream.next().await {
        let out = match item {
            Ok(StreamEvent::MessageStart(start)) => {
                usage.input_tokens = start.message.usage.input_tokens;
                usage.output_tokens = start.message.usage.output_tokens;
                None
            }
            Ok(StreamEvent::ContentBlockStart(start)) => {
                if let types::StartedBlock::ToolUse { id, name } = start.content_block {
                    pending.insert(
                        start.index,
                        PendingToolCall {
                            id,
                            name,
                            input_json: String::new(),
                        },
                    );
                }
                None
            }
            Ok(StreamEvent::ContentBlockDelta(delta)) => match delta.delta {
                types::SseDelta::TextDelta { text } => Some(ChatEvent::Delta { text }),
                types::SseDelta::InputJsonDelta { partial_json } => {
                    if let Some(call) = pending.get_mut(&delta.index) {
                        call.input_json.push_str(&partial_json);
                    }
                    None
                }
            },
            Ok(StreamEvent::ContentBlockStop(stop)) => {
                pending.remove(&stop.index).map(|call| {
                    let input = parse_tool_input(&call.name, &call.input_json);
                    ChatEvent::ToolCall {
                        name: call.name,
                        input,
                        call_id: call.id,
                    }
                })
            }
            Ok(StreamEvent::MessageDelta(md)) => {
                if let Some(u) = md.usage {
                    if u.input_tokens > 0 {
                        usage.input_tokens = u.input_tokens;
                    }
                    usage.output_tokens = u.output_tokens;
                }
                None
            }
            Ok(StreamEvent::MessageStop) => {
                let _ = tx.send(ChatEvent::Final { usage }).await;
                return;
            }
            Ok(StreamEvent::Ping) => None,
            Ok(StreamEvent::Error(err)) => {
                let _ = tx
                    .send(ChatEvent::Error {
                        message: format!("{}: {}", err.error.type_, err.error.message),
                    })
                    .await;
                return;
            }
            Err(e) => {
                let _ = tx.send(ChatEvent::Error { message: e.to_string() }).await;
                return;
            }
        };

        if let Some(event) = out {
            if tx.send(event).await.is_err() {
                debug!("chat event receiver dropped, cancelling stream");
                return;
            }
        }
    }

    // The vendor stream ended without message_stop; surface that as a
    // terminal error so the runner never hangs on this adapter.
    let _ = tx
        .send(ChatEvent::Error {
            message: "provider stream ended without a terminal event".into(),
        })
        .await;
}

/// Parses assembled tool input, degrading to an empty object on malformed
/// JSON. An empty fragment buffer means the tool takes no input.
fn parse_tool_input(name: &str, json: &str) -> serde_json::Value {
    if json.trim().is_empty() {
        return serde_json::json!({});
    }
    match serde_json::from_str(json) {
        Ok(value) => value,
        Err(e) => {
            warn!(tool = name, error = %e, "malformed tool input JSON, substituting empty object");
            serde_json::json!({})
        }
    }
}

fn convert_message(message: &hearth_core::ChatMessage) -> ApiMessage {
    let role = match message.role {
        Role::User => "user",
        Role::Assistant => "assistant",
    };
    let content = match &message.content {
        MessageContent::Text(text) => ApiContent::Text(text.clone()),
        MessageContent::Blocks(blocks) => {
            ApiContent::Blocks(blocks.iter().map(convert_block).collect())
        }
    };
    ApiMessage {
        role: role.to_string(),
        content,
    }
}

fn convert_block(block: &ContentBlock) -> ApiContentBlock {
    match block {
        ContentBlock::Text { text } => ApiContentBlock::Text { text: text.clone() },
        ContentBlock::ToolUse { id, name, input } => ApiContentBlock::ToolUse {
            id: id.clone(),
            name: name.clone(),
            input: input.clone(),
        },
        ContentBlock::ToolResult { tool_use_id, content } => ApiContentBlock::ToolResult {
            tool_use_id: tool_use_id.clone(),
            content: content.clone(),
        },
    }
}

fn convert_tool(tool: &ToolDefinition) -> ApiToolDefinition {
    ApiToolDefinition {
        name: tool.name.clone(),
        description: tool.description.clone(),
        input_schema: tool.input_schema.clone(),
    }
}
