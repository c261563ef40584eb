// SPDX-FileCopyrightText: 2026 Hearth Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SSE stream parser for Anthropic Messages API streaming responses.
//!
//! Converts a reqwest response byte stream into typed [`StreamEvent`] variants
//! using the `eventsource-stream` crate for SSE protocol compliance.

use std::pin::Pin;

use eventsource_stream::Eventsource;
use futures::stream::{Stream, StreamExt};
use hearth_core::HearthError;

use crate::types::{
    SseContentBlockDelta, SseContentBlockStart, SseContentBlockStop, SseError, SseMessageDelta,
    SseMessageStart,
};

/// Typed SSE events from the Anthropic streaming protocol.
#[derive(Debug, Clone)]
pub enum StreamEvent {
    /// Initial message metadata (usage).
    MessageStart(SseMessageStart),
    /// A new content block begins.
    ContentBlockStart(SseContentBlockStart),
    /// Incremental update to a content block (text delta, JSON delta).
    ContentBlockDelta(SseContentBlockDelta),
    /// A content block has finished.
    ContentBlockStop(SseContentBlockStop),
    /// Message-level delta (stop_reason, usage update).
    MessageDelta(SseMessageDelta),
    /// The message is complete.
    MessageStop,
    /// Keep-alive ping.
    Ping,
    /// API error during streaming.
    Error(SseError),
}

/// Parses a reqwest streaming response into a stream of typed [`StreamEvent`]s.
///
/// Unknown event types are silently skipped per Anthropic's API versioning
/// policy.
pub fn parse_sse_stream(
    response: reqwest::Response,
) -> Pin<Box<dyn Stream<Item = Result<StreamEvent, HearthError>> + Send>> {
    let event_stream = response.bytes_stream().eventsource();

    let mapped = event_stream.filter_map(|result| async move {
        match result {
            Ok(event) => {
                let parsed = match event.event.as_str() {
                    "message_start" => serde_json::from_str::<SseMessageStart>(&event.data)
                        .map(StreamEvent::MessageStart)
                        .map_err(|e| parse_error("message_start", e)),
                    "content_block_start" => {
                        serde_json::from_str::<SseContentBlockStart>(&event.data)
                            .map(StreamEvent::ContentBlockStart)
                            .map_err(|e| parse_error("content_block_start", e))
                    }
                    "content_block_delta" => {
                        serde_json::from_str::<SseContentBlockDelta>(&event.data)
                            .map(StreamEvent::ContentBlockDelta)
                            .map_err(|e| parse_error("content_block_delta", e))
                    }
                    "content_block_stop" => {
                        serde_json::from_str::<SseContentBlockStop>(&event.data)
                            .map(StreamEvent::ContentBlockStop)
                            .map_err(|e| parse_error("content_block_stop", e))
                    }
                    "message_delta" => serde_json::from_str::<SseMessageDelta>(&event.data)
                        .map(StreamEvent::MessageDelta)
                        .map_err(|e| parse_error("message_delta", e)),
                    "message_stop" => Ok(StreamEvent::MessageStop),
                    "ping" => Ok(StreamEvent::Ping),
                    "error" => serde_json::from_str::<SseError>(&event.data)
                        .map(StreamEvent::Error)
                        .map_err(|e| parse_error("error", e)),
                    // Unknown event types are ignored.
                    _ => return None,
                };
                Some(parsed)
            }
            Err(e) => Some(Err(HearthError::provider(format!("SSE stream error: {e}")))),
        }
    });

    Box::pin(mapped)
}

fn parse_error(event: &str, e: serde_json::Error) -> HearthError {
    HearthError::Provider {
        message: format!("failed to parse {event}: {e}"),
        source: Some(Box::new(e)),
    }
}
