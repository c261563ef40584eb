// SPDX-FileCopyrightText: 2026 Hearth Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Loopback WebSocket gateway: auth handshake, JSON-RPC dispatch, push
//! events.
//!
//! The transport is a bidirectional frame multiplexer over one WebSocket per
//! client. Requests are answered synchronously; streaming results arrive as
//! push events correlated by `runId`. Nothing reaches the dispatcher before
//! a successful constant-time token handshake.

mod chat;
pub mod proto;
pub mod rpc;
pub mod server;
mod ws;

pub use proto::{PushFrame, RpcError, RpcRequest, RpcResponse};
pub use server::{GatewayState, start_server};
