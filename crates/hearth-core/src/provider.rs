// SPDX-FileCopyrightText: 2026 Hearth Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The provider contract: a lazy, cancellable stream of [`ChatEvent`]s.

use std::pin::Pin;

use async_trait::async_trait;
use futures_core::Stream;

use crate::error::HearthError;
use crate::types::{ChatEvent, ChatRequest};

/// A pinned, boxed stream of chat events.
pub type ChatEventStream = Pin<Box<dyn Stream<Item = ChatEvent> + Send>>;

/// Adapter for one LLM vendor.
///
/// The returned stream is single-turn (exactly one terminal `Final` or
/// `Error` event), restartable (`chat` may be invoked again with an extended
/// message list), and cancellable (dropping the stream must release the
/// underlying connection).
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Stable provider name used in `AGENTS.md` model references
    /// (e.g. "anthropic", "openai").
    fn name(&self) -> &str;

    /// Model used when an agent binding names this provider without a model,
    /// or when this provider is selected by fallback.
    fn default_model(&self) -> &str;

    /// Starts a streaming chat call.
    async fn chat(&self, request: ChatRequest) -> Result<ChatEventStream, HearthError>;
}
