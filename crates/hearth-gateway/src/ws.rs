// SPDX-FileCopyrightText: 2026 Hearth Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! WebSocket transport: origin check, token handshake, RPC frame loop.
//!
//! All writes to one socket are serialized through a single writer task fed
//! by an mpsc channel; the dispatcher and every runner share clones of the
//! sender. The first frame after upgrade must be the auth frame; nothing
//! reaches the dispatcher before a successful handshake.

use axum::{
    extract::{
        State, WebSocketUpgrade,
        ws::{CloseFrame, Message, WebSocket},
    },
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use hearth_tools::PushFn;

use crate::proto::{RpcError, RpcRequest, RpcResponse};
use crate::rpc;
use crate::server::GatewayState;

/// Close code sent on auth failure.
const POLICY_VIOLATION: u16 = 4401;

/// WebSocket upgrade handler with browser-origin enforcement.
///
/// A present Origin header whose host is not a loopback name refuses the
/// upgrade before any socket exists.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    headers: HeaderMap,
    State(state): State<GatewayState>,
) -> Response {
    if let Some(origin) = headers.get("origin").and_then(|v| v.to_str().ok()) {
        if !is_loopback_origin(origin) {
            warn!(origin, "rejecting WebSocket upgrade from non-loopback origin");
            return StatusCode::FORBIDDEN.into_response();
        }
    }
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

/// Whether an Origin header value names a loopback host over http(s).
fn is_loopback_origin(origin: &str) -> bool {
    let rest = match origin.split_once("://") {
        Some(("http" | "https", rest)) => rest,
        _ => return false,
    };
    // Strip any port; bracketed IPv6 keeps its brackets for the host check.
    let host = if let Some(end) = rest.find(']') {
        &rest[..=end]
    } else {
        rest.split(':').next().unwrap_or(rest)
    };
    matches!(host, "localhost" | "127.0.0.1" | "[::1]")
}

/// Constant-time token comparison. Unequal lengths still pay for a full
/// compare before failing.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        let _ = xor_fold(b, b);
        return false;
    }
    xor_fold(a, b) == 0
}

fn xor_fold(a: &[u8], b: &[u8]) -> u8 {
    a.iter().zip(b.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y))
}

/// Validates the first frame of a connection against the expected token.
/// A missing configured token rejects everything (fail-closed).
fn check_auth(frame: &str, expected: Option<&str>) -> bool {
    let Ok(value) = serde_json::from_str::<serde_json::Value>(frame) else {
        return false;
    };
    if value.get("type").and_then(|t| t.as_str()) != Some("auth") {
        return false;
    }
    let Some(token) = value.get("token").and_then(|t| t.as_str()) else {
        return false;
    };
    let Some(expected) = expected else {
        // Still burn a compare so the failure mode is timing-uniform.
        let _ = constant_time_eq(token.as_bytes(), token.as_bytes());
        return false;
    };
    constant_time_eq(token.as_bytes(), expected.as_bytes())
}

async fn handle_socket(socket: WebSocket, state: GatewayState) {
    let (mut ws_sender, mut ws_receiver) = socket.split();
    let conn_id = uuid::Uuid::new_v4().to_string();

    // Single writer task; every producer on this connection goes through tx.
    let (tx, mut rx) = mpsc::channel::<Message>(256);
    let writer = tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            if ws_sender.send(message).await.is_err() {
                break;
            }
        }
        let _ = ws_sender.close().await;
    });

    // Handshake: the first frame must be {"type":"auth","token":...}. Any
    // other frame shape fails the handshake the same way a bad token does.
    let first = match ws_receiver.next().await {
        Some(Ok(Message::Text(text))) => text.to_string(),
        Some(Ok(_)) => String::new(),
        _ => {
            drop(tx);
            writer.abort();
            return;
        }
    };

    if !check_auth(&first, state.token.as_deref()) {
        let reject = serde_json::json!({
            "type": "auth", "ok": false, "error": "invalid token"
        });
        let _ = tx.send(Message::Text(reject.to_string().into())).await;
        let _ = tx.send(auth_close_frame()).await;
        // The writer owns the sink, so the close frame rides the same
        // channel ordering guarantee as the rejection.
        drop(tx);
        let _ = writer.await;
        debug!(conn = conn_id.as_str(), "auth rejected");
        return;
    }

    let accept = serde_json::json!({"type": "auth", "ok": true});
    if tx
        .send(Message::Text(accept.to_string().into()))
        .await
        .is_err()
    {
        writer.abort();
        return;
    }

    state.ws_senders.insert(conn_id.clone(), tx.clone());
    debug!(conn = conn_id.as_str(), "connection authenticated");

    // Best-effort push emitter shared with runners and tools.
    let push_tx = tx.clone();
    let push: PushFn = std::sync::Arc::new(move |event, data| {
        let frame = serde_json::json!({"event": event, "data": data});
        if push_tx
            .try_send(Message::Text(frame.to_string().into()))
            .is_err()
        {
            debug!(event, "push event dropped (socket closed or backlogged)");
        }
    });

    // RPC loop.
    while let Some(Ok(message)) = ws_receiver.next().await {
        match message {
            Message::Text(text) => {
                let response = handle_frame(&state, &push, text.as_str()).await;
                let Ok(frame) = serde_json::to_string(&response) else {
                    continue;
                };
                if tx.send(Message::Text(frame.into())).await.is_err() {
                    break;
                }
            }
            Message::Close(_) => break,
            // Binary frames are not part of the protocol; ping/pong is
            // handled by the tungstenite layer.
            _ => {}
        }
    }

    state.ws_senders.remove(&conn_id);
    drop(tx);
    let _ = writer.await;
    debug!(conn = conn_id.as_str(), "connection closed");
}

/// Parses one frame and dispatches it. Never panics; every malformed input
/// maps to a JSON-RPC error response.
async fn handle_frame(state: &GatewayState, push: &PushFn, text: &str) -> RpcResponse {
    let value: serde_json::Value = match serde_json::from_str(text) {
        Ok(value) => value,
        Err(_) => return RpcResponse::err(None, RpcError::parse_error()),
    };
    let request: RpcRequest = match serde_json::from_value(value) {
        Ok(request) => request,
        Err(_) => return RpcResponse::err(None, RpcError::invalid_request()),
    };
    rpc::dispatch(state, push, request).await
}

/// Builds the auth-failure close frame.
fn auth_close_frame() -> Message {
    Message::Close(Some(CloseFrame {
        code: POLICY_VIOLATION,
        reason: "invalid token".into(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constant_time_eq_semantics() {
        assert!(constant_time_eq(b"secret", b"secret"));
        assert!(!constant_time_eq(b"secret", b"secreT"));
        assert!(!constant_time_eq(b"secret", b"secret2"));
        assert!(!constant_time_eq(b"", b"x"));
        assert!(constant_time_eq(b"", b""));
    }

    #[test]
    fn check_auth_accepts_matching_token() {
        assert!(check_auth(
            r#"{"type": "auth", "token": "tok-1"}"#,
            Some("tok-1")
        ));
    }

    #[test]
    fn check_auth_rejects_wrong_token_and_shapes() {
        assert!(!check_auth(r#"{"type": "auth", "token": "wrong"}"#, Some("tok-1")));
        assert!(!check_auth(r#"{"type": "chat", "token": "tok-1"}"#, Some("tok-1")));
        assert!(!check_auth(r#"{"token": "tok-1"}"#, Some("tok-1")));
        assert!(!check_auth(r#"{"type": "auth"}"#, Some("tok-1")));
        assert!(!check_auth("not json", Some("tok-1")));
    }

    #[test]
    fn check_auth_fails_closed_without_configured_token() {
        assert!(!check_auth(r#"{"type": "auth", "token": "anything"}"#, None));
    }

    #[test]
    fn origin_check_allows_loopback_any_port() {
        assert!(is_loopback_origin("http://localhost"));
        assert!(is_loopback_origin("http://localhost:5173"));
        assert!(is_loopback_origin("https://127.0.0.1:8443"));
        assert!(is_loopback_origin("http://[::1]:3000"));
    }

    #[test]
    fn origin_check_rejects_everything_else() {
        assert!(!is_loopback_origin("http://evil.example.com"));
        assert!(!is_loopback_origin("https://localhost.evil.com"));
        assert!(!is_loopback_origin("file://localhost"));
        assert!(!is_loopback_origin("chrome-extension://abcdef"));
        assert!(!is_loopback_origin("localhost:3000"));
    }

    #[test]
    fn close_frame_uses_policy_code() {
        match auth_close_frame() {
            Message::Close(Some(frame)) => {
                assert_eq!(frame.code, POLICY_VIOLATION);
                assert_eq!(frame.reason.as_str(), "invalid token");
            }
            other => panic!("expected close frame, got {other:?}"),
        }
    }
}
