// SPDX-FileCopyrightText: 2026 Hearth Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Provider-neutral chat types shared by the agent runner, the provider
//! adapters, and the gateway.
//!
//! The wire contract between a provider adapter and the turn runner is a
//! stream of [`ChatEvent`]s; the contract in the other direction is a list of
//! [`ChatMessage`]s whose content is either plain text or an ordered list of
//! tagged [`ContentBlock`]s.

use serde::{Deserialize, Serialize};

/// Token usage reported by a provider at the end of a stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

/// One event emitted by a provider adapter while streaming a chat turn.
///
/// A well-behaved stream ends with exactly one terminal event: `Final` on
/// success or `Error` on provider-side failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatEvent {
    /// A chunk of assistant text.
    Delta { text: String },
    /// The model asks to invoke a tool. Adapters assemble streamed input
    /// fragments into one JSON object before yielding this event.
    ToolCall {
        name: String,
        input: serde_json::Value,
        call_id: String,
    },
    /// The provider stream concluded for this call.
    Final { usage: TokenUsage },
    /// Provider-side failure, terminal for this stream.
    Error { message: String },
}

/// Message role in the provider conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// A single message in the runner-to-provider conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: MessageContent,
}

impl ChatMessage {
    /// A plain-text user message.
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: MessageContent::Text(text.into()),
        }
    }

    /// A plain-text assistant message.
    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: MessageContent::Text(text.into()),
        }
    }
}

/// Message content: a plain string or an ordered list of content blocks.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Blocks(Vec<ContentBlock>),
}

/// One typed element inside a message.
///
/// Every `tool_use` id appearing in an assistant message must appear exactly
/// once as a `tool_result` in the very next user message before another
/// assistant turn is requested; the turn runner maintains this pairing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        input: serde_json::Value,
    },
    ToolResult {
        tool_use_id: String,
        content: String,
    },
}

/// A tool definition passed to the provider so the model can request calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: serde_json::Value,
}

/// A neutral chat request handed to a provider adapter.
///
/// The adapter decides a reasonable `max_tokens`; the runner does not supply
/// one.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub model: String,
    pub system_prompt: Option<String>,
    pub messages: Vec<ChatMessage>,
    pub tools: Vec<ToolDefinition>,
}

/// An attachment produced by a tool (screenshots, files).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    #[serde(rename = "type")]
    pub kind: AttachmentKind,
    pub mime_type: String,
    /// Base64-encoded payload. Attachment binary data is never scanned by the
    /// secret filter.
    pub data: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Attachment payload kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttachmentKind {
    Image,
    File,
}

/// The result of one tool invocation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolResult {
    pub output: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub truncated: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,
    /// Set when the user denied the invocation. Never serialized; the
    /// dispatcher uses it to classify the audit entry.
    #[serde(skip)]
    pub denied: bool,
}

impl ToolResult {
    /// A plain-text result with no exit code or attachments.
    pub fn text(output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            ..Self::default()
        }
    }
}
