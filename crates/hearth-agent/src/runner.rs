// SPDX-FileCopyrightText: 2026 Hearth Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The agent turn runner: drives the provider -> tool -> provider loop.
//!
//! One call to [`run_turn`] owns the message list for the turn. It streams
//! provider events to the caller's sink, collects tool calls, feeds their
//! results back as a paired user message, and repeats up to a fixed cap.
//! Tool failures are reported to the model as tool output and never cross
//! this boundary as errors.

use async_trait::async_trait;
use futures::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use hearth_core::{
    ChatEvent, ChatMessage, ChatProvider, ChatRequest, ContentBlock, HearthError,
    MessageContent, Role, ToolDefinition,
};

/// Upper bound on provider calls within one turn. Prevents a model from
/// driving tool invocations indefinitely.
pub const MAX_TOOL_TURNS: usize = 10;

/// Synthetic error message emitted when the cap is reached.
pub const TURN_CAP_MESSAGE: &str = "Maximum tool call turns exceeded";

/// Sink receiving every event the provider emits, in emission order.
pub type EventSink = dyn Fn(ChatEvent) + Send + Sync;

/// Executes one tool call and returns its output as a string.
///
/// Implementations must report failures in the returned string rather than
/// panicking; the runner feeds whatever comes back to the model verbatim.
#[async_trait]
pub trait ToolDispatcher: Send + Sync {
    async fn dispatch(&self, name: &str, input: serde_json::Value, call_id: &str) -> String;
}

/// Options for one agent turn.
pub struct TurnOptions {
    pub model: String,
    pub system_prompt: Option<String>,
    /// Initial message list. Read-only; the runner extends a local copy.
    pub messages: Vec<ChatMessage>,
    pub tools: Vec<ToolDefinition>,
    /// Checked before forwarding each event; once cancelled, further events
    /// are dropped and no terminal event is sent.
    pub cancel: CancellationToken,
}

struct PendingCall {
    name: String,
    input: serde_json::Value,
    call_id: String,
}

/// Runs one chat turn to completion.
///
/// Provider stream errors stop the loop for this turn but leave the session
/// intact; the error has already been forwarded to the sink. The runner
/// returns `Ok` in every case that reached a terminal condition.
pub async fn run_turn(
    provider: &dyn ChatProvider,
    options: TurnOptions,
    on_event: &EventSink,
    dispatcher: &dyn ToolDispatcher,
) -> Result<(), HearthError> {
    let mut messages = options.messages;

    for round in 0..MAX_TOOL_TURNS {
        if options.cancel.is_cancelled() {
            return Ok(());
        }
        let request = ChatRequest {
            model: options.model.clone(),
            system_prompt: options.system_prompt.clone(),
            messages: messages.clone(),
            tools: options.tools.clone(),
        };

        let mut stream = match provider.chat(request).await {
            Ok(stream) => stream,
            Err(e) => {
                if !options.cancel.is_cancelled() {
                    on_event(ChatEvent::Error {
                        message: e.to_string(),
                    });
                }
                return Ok(());
            }
        };

        let mut text = String::new();
        let mut calls: Vec<PendingCall> = Vec::new();
        let mut errored = false;
        let mut finished = false;

        while let Some(event) = stream.next().await {
            if options.cancel.is_cancelled() {
                debug!(round, "turn aborted, dropping remaining events");
                return Ok(());
            }
            match &event {
                ChatEvent::Delta { text: chunk } => text.push_str(chunk),
                ChatEvent::ToolCall { name, input, call_id } => calls.push(PendingCall {
                    name: name.clone(),
                    input: input.clone(),
                    call_id: call_id.clone(),
                }),
                ChatEvent::Error { message } => {
                    warn!(round, message = message.as_str(), "provider stream error");
                    errored = true;
                }
                ChatEvent::Final { .. } => finished = true,
            }
            on_event(event);
            if errored || finished {
                break;
            }
        }

        if errored {
            return Ok(());
        }
        if calls.is_empty() {
            return Ok(());
        }

        // Assistant message: optional text block, then one tool_use block per
        // pending call, preserving order.
        let mut blocks = Vec::with_capacity(calls.len() + 1);
        if !text.is_empty() {
            blocks.push(ContentBlock::Text { text });
        }
        for call in &calls {
            blocks.push(ContentBlock::ToolUse {
                id: call.call_id.clone(),
                name: call.name.clone(),
                input: call.input.clone(),
            });
        }
        messages.push(ChatMessage {
            role: Role::Assistant,
            content: MessageContent::Blocks(blocks),
        });

        // One user message pairing every tool_use with its tool_result.
        let mut results = Vec::with_capacity(calls.len());
        for call in calls {
            if options.cancel.is_cancelled() {
                return Ok(());
            }
            let output = dispatcher
                .dispatch(&call.name, call.input, &call.call_id)
                .await;
            results.push(ContentBlock::ToolResult {
                tool_use_id: call.call_id,
                content: output,
            });
        }
        messages.push(ChatMessage {
            role: Role::User,
            content: MessageContent::Blocks(results),
        });
    }

    if !options.cancel.is_cancelled() {
        on_event(ChatEvent::Error {
            message: TURN_CAP_MESSAGE.to_string(),
        });
    }
    Ok(())
}
