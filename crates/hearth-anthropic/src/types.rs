// SPDX-FileCopyrightText: 2026 Hearth Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Anthropic Messages API request/response types and SSE event types.

use serde::{Deserialize, Serialize};

// --- Request types ---

/// A streaming request to the Anthropic Messages API.
#[derive(Debug, Clone, Serialize)]
pub struct MessageRequest {
    /// Model identifier (e.g., "claude-sonnet-4-20250514").
    pub model: String,

    /// Conversation messages.
    pub messages: Vec<ApiMessage>,

    /// System prompt (optional).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,

    /// Maximum tokens to generate. The adapter chooses this; callers do not.
    pub max_tokens: u32,

    /// Whether to stream the response.
    pub stream: bool,

    /// Tool definitions available for the model to use.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<ApiToolDefinition>>,
}

/// A tool definition in the Anthropic wire format.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiToolDefinition {
    pub name: String,
    pub description: String,
    /// JSON Schema describing the tool's input parameters.
    pub input_schema: serde_json::Value,
}

/// A single message in the Anthropic conversation format.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiMessage {
    /// Role: "user" or "assistant".
    pub role: String,

    /// Content -- either a plain string or an array of content blocks.
    pub content: ApiContent,
}

/// Content within an API message.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ApiContent {
    /// Simple text content.
    Text(String),
    /// Array of typed content blocks.
    Blocks(Vec<ApiContentBlock>),
}

/// A typed content block within a message.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ApiContentBlock {
    /// Text content block.
    #[serde(rename = "text")]
    Text { text: String },
    /// Tool use content block (sent by the assistant).
    #[serde(rename = "tool_use")]
    ToolUse {
        id: String,
        name: String,
        input: serde_json::Value,
    },
    /// Tool result content block (sent by the user in response to tool_use).
    #[serde(rename = "tool_result")]
    ToolResult { tool_use_id: String, content: String },
}

// --- SSE event types ---

/// Token usage statistics from the API.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiUsage {
    #[serde(default)]
    pub input_tokens: u64,
    #[serde(default)]
    pub output_tokens: u64,
}

/// SSE event: message_start. Only the usage header is consumed.
#[derive(Debug, Clone, Deserialize)]
pub struct SseMessageStart {
    pub message: SseMessageHead,
}

/// The initial message object inside message_start.
#[derive(Debug, Clone, Deserialize)]
pub struct SseMessageHead {
    #[serde(default)]
    pub usage: ApiUsage,
}

/// SSE event: content_block_start.
#[derive(Debug, Clone, Deserialize)]
pub struct SseContentBlockStart {
    pub index: usize,
    pub content_block: StartedBlock,
}

/// The content block announced by content_block_start.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum StartedBlock {
    /// A text block begins; its content arrives as text deltas.
    #[serde(rename = "text")]
    Text {},
    /// A tool-use block begins; its input arrives as JSON deltas that must be
    /// concatenated before the call is surfaced.
    #[serde(rename = "tool_use")]
    ToolUse { id: String, name: String },
    /// Anything the API adds later.
    #[serde(other)]
    Other,
}

/// SSE event: content_block_delta.
#[derive(Debug, Clone, Deserialize)]
pub struct SseContentBlockDelta {
    pub index: usize,
    pub delta: SseDelta,
}

/// A delta update within a content block.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum SseDelta {
    /// Text delta -- appends text to the current block.
    #[serde(rename = "text_delta")]
    TextDelta { text: String },
    /// JSON delta for tool use -- appends partial JSON.
    #[serde(rename = "input_json_delta")]
    InputJsonDelta { partial_json: String },
}

/// SSE event: content_block_stop.
#[derive(Debug, Clone, Deserialize)]
pub struct SseContentBlockStop {
    pub index: usize,
}

/// SSE event: message_delta.
#[derive(Debug, Clone, Deserialize)]
pub struct SseMessageDelta {
    pub usage: Option<ApiUsage>,
}

/// SSE event: error.
#[derive(Debug, Clone, Deserialize)]
pub struct SseError {
    pub error: ApiErrorDetail,
}

/// API error response (non-streaming).
#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorResponse {
    pub error: ApiErrorDetail,
}

/// Error detail shared by SSE and HTTP error shapes.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorDetail {
    #[serde(rename = "type")]
    pub type_: String,
    pub message: String,
}
