// SPDX-FileCopyrightText: 2026 Hearth Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! OpenAI chat-completions request and streaming-chunk types.

use serde::{Deserialize, Serialize};

// --- Request types ---

/// A streaming chat-completions request.
#[derive(Debug, Clone, Serialize)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<OaiMessage>,
    pub stream: bool,
    /// Asks the API to append a final chunk carrying token usage.
    pub stream_options: StreamOptions,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<OaiTool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_completion_tokens: Option<u32>,
}

/// Stream options; `include_usage` makes usage arrive in the last chunk.
#[derive(Debug, Clone, Serialize)]
pub struct StreamOptions {
    pub include_usage: bool,
}

/// One message in the OpenAI conversation format.
#[derive(Debug, Clone, Serialize)]
pub struct OaiMessage {
    /// "system", "user", "assistant", or "tool".
    pub role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<OaiToolCall>>,
    /// Set on "tool" role messages to pair the result with its call.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

/// A completed tool call on an assistant message.
#[derive(Debug, Clone, Serialize)]
pub struct OaiToolCall {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub function: OaiFunctionCall,
}

/// The function payload of a tool call; arguments are a JSON string.
#[derive(Debug, Clone, Serialize)]
pub struct OaiFunctionCall {
    pub name: String,
    pub arguments: String,
}

/// A tool definition in the OpenAI wire format.
#[derive(Debug, Clone, Serialize)]
pub struct OaiTool {
    #[serde(rename = "type")]
    pub kind: String,
    pub function: OaiFunction,
}

/// The function schema of a tool definition.
#[derive(Debug, Clone, Serialize)]
pub struct OaiFunction {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

// --- Streaming chunk types ---

/// One streamed chunk (`data: {...}` line).
#[derive(Debug, Clone, Deserialize)]
pub struct ChatChunk {
    #[serde(default)]
    pub choices: Vec<ChunkChoice>,
    /// Present only on the final usage chunk when `include_usage` is set.
    #[serde(default)]
    pub usage: Option<OaiUsage>,
}

/// One choice inside a chunk; Hearth only ever requests one.
#[derive(Debug, Clone, Deserialize)]
pub struct ChunkChoice {
    #[serde(default)]
    pub delta: ChunkDelta,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

/// Incremental delta of the assistant message.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChunkDelta {
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub tool_calls: Option<Vec<ChunkToolCall>>,
}

/// A fragment of a tool call, correlated by `index` across chunks.
#[derive(Debug, Clone, Deserialize)]
pub struct ChunkToolCall {
    pub index: usize,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub function: Option<ChunkFunctionFragment>,
}

/// Name/argument fragments of a streamed function call.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChunkFunctionFragment {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub arguments: Option<String>,
}

/// Token usage reported in the final chunk.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OaiUsage {
    #[serde(default)]
    pub prompt_tokens: u64,
    #[serde(default)]
    pub completion_tokens: u64,
}

/// Error body returned on non-2xx responses.
#[derive(Debug, Clone, Deserialize)]
pub struct OaiErrorResponse {
    pub error: OaiErrorDetail,
}

/// Error detail inside an error response.
#[derive(Debug, Clone, Deserialize)]
pub struct OaiErrorDetail {
    pub message: String,
    #[serde(default, rename = "type")]
    pub type_: Option<String>,
}
