// SPDX-FileCopyrightText: 2026 Hearth Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core types, errors, and the provider contract for the Hearth gateway.
//!
//! Everything that crosses a crate boundary lives here: the [`HearthError`]
//! enum, the provider-neutral chat types, and the [`ChatProvider`] trait.

pub mod error;
pub mod provider;
pub mod types;

pub use error::HearthError;
pub use provider::{ChatEventStream, ChatProvider};
pub use types::{
    Attachment, AttachmentKind, ChatEvent, ChatMessage, ChatRequest, ContentBlock,
    MessageContent, Role, TokenUsage, ToolDefinition, ToolResult,
};
