// SPDX-FileCopyrightText: 2026 Hearth Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock LLM provider for deterministic testing.
//!
//! `MockProvider` implements [`ChatProvider`] with pre-scripted event
//! sequences, enabling fast, CI-runnable tests of the turn runner, the
//! scheduler, and the gateway without external API calls.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use hearth_core::{
    ChatEvent, ChatEventStream, ChatProvider, ChatRequest, HearthError, TokenUsage,
};

/// A mock provider that replays scripted [`ChatEvent`] sequences.
///
/// Scripts are popped from a FIFO queue, one per `chat` call. When the queue
/// is empty, a default text-plus-final script is replayed. Every request is
/// recorded for assertions.
pub struct MockProvider {
    scripts: Arc<Mutex<VecDeque<Vec<ChatEvent>>>>,
    requests: Arc<Mutex<Vec<ChatRequest>>>,
}

impl MockProvider {
    /// Creates a mock provider with an empty script queue.
    pub fn new() -> Self {
        Self {
            scripts: Arc::new(Mutex::new(VecDeque::new())),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Creates a mock provider pre-loaded with the given scripts.
    pub fn with_scripts(scripts: Vec<Vec<ChatEvent>>) -> Self {
        let provider = Self::new();
        for script in scripts {
            provider.push_script(script);
        }
        provider
    }

    /// Queues one event script for the next `chat` call.
    pub fn push_script(&self, events: Vec<ChatEvent>) {
        self.scripts.lock().unwrap().push_back(events);
    }

    /// Convenience: queues a script that streams `text` and concludes.
    pub fn push_text_response(&self, text: &str) {
        self.push_script(vec![
            ChatEvent::Delta { text: text.to_string() },
            ChatEvent::Final {
                usage: TokenUsage {
                    input_tokens: 1,
                    output_tokens: 1,
                },
            },
        ]);
    }

    /// All requests received so far, in call order.
    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Number of `chat` calls received so far.
    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    fn next_script(&self) -> Vec<ChatEvent> {
        self.scripts.lock().unwrap().pop_front().unwrap_or_else(|| {
            vec![
                ChatEvent::Delta {
                    text: "mock response".into(),
                },
                ChatEvent::Final {
                    usage: TokenUsage::default(),
                },
            ]
        })
    }
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChatProvider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    fn default_model(&self) -> &str {
        "mock-model"
    }

    async fn chat(&self, request: ChatRequest) -> Result<ChatEventStream, HearthError> {
        self.requests.lock().unwrap().push(request);
        let events = self.next_script();
        Ok(Box::pin(futures::stream::iter(events)))
    }
}
