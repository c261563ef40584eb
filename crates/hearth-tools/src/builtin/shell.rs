// SPDX-FileCopyrightText: 2026 Hearth Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Built-in shell execution tool ("bash").
//!
//! Runs the model's command through `sh -c` after explicit user approval.
//! The command string is never synthesized server-side: the entire string is
//! what the model produced and the user just approved, passed as one `-c`
//! argument. Credential environment variables are stripped from the child.

use std::process::Stdio;
use std::sync::{Arc, LazyLock, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use tokio::io::AsyncReadExt;
use uuid::Uuid;

use hearth_core::{HearthError, ToolResult};
use hearth_security::CREDENTIAL_ENV_VARS;

use crate::approval::Decision;
use crate::tool::{Tool, ToolContext};

/// Grace period between the polite termination signal and the forced kill.
const KILL_GRACE: Duration = Duration::from_secs(2);

/// Environment keys with credential-shaped suffixes are withheld from
/// children regardless of the explicit denylist.
static CREDENTIAL_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)_(KEY|SECRET|TOKEN|PASSWORD|CREDENTIAL)$").unwrap());

/// Shell command execution behind the approval gate.
pub struct ShellTool;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct ShellInput {
    command: String,
    #[serde(default)]
    working_dir: Option<String>,
}

#[async_trait]
impl Tool for ShellTool {
    fn name(&self) -> &str {
        "bash"
    }

    fn description(&self) -> &str {
        "Execute a shell command on the user's machine and return its merged \
         stdout/stderr and exit code. Requires user approval."
    }

    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "command": {
                    "type": "string",
                    "description": "The shell command to execute"
                },
                "workingDir": {
                    "type": "string",
                    "description": "Working directory for the command (defaults to the server's cwd)"
                }
            },
            "required": ["command"]
        })
    }

    fn requires_approval(&self) -> bool {
        true
    }

    async fn execute(
        &self,
        input: serde_json::Value,
        ctx: &ToolContext,
    ) -> Result<ToolResult, HearthError> {
        let input: ShellInput = serde_json::from_value(input)
            .map_err(|e| HearthError::tool(format!("invalid bash input: {e}")))?;
        if input.command.trim().is_empty() {
            return Err(HearthError::tool("command must not be empty"));
        }

        if !ctx.auto_approve {
            let approval_id = Uuid::new_v4().to_string();
            // The pending entry must exist before the event goes out so a
            // fast exec.approve can never miss it.
            let ticket = ctx.approvals.request(&approval_id);
            ctx.send_event(
                "exec.approval_request",
                serde_json::json!({
                    "approvalId": approval_id,
                    "toolName": self.name(),
                    "summary": summarize(&input.command),
                    "details": {
                        "command": &input.command,
                        "workingDir": &input.working_dir,
                    },
                }),
            );

            if let Decision::Denied { reason } = ticket.decision().await {
                let output = match reason.as_deref() {
                    Some(reason) if !reason.is_empty() => {
                        format!("Command denied by user: {reason}")
                    }
                    _ => "Command denied by user".to_string(),
                };
                return Ok(ToolResult {
                    output,
                    exit_code: Some(1),
                    denied: true,
                    ..ToolResult::default()
                });
            }
        }

        run_command(&input, ctx).await
    }
}

async fn run_command(input: &ShellInput, ctx: &ToolContext) -> Result<ToolResult, HearthError> {
    let mut command = tokio::process::Command::new("sh");
    command.arg("-c").arg(&input.command);
    if let Some(dir) = &input.working_dir {
        command.current_dir(dir);
    }
    command.env_clear();
    for (key, value) in std::env::vars() {
        if !is_credential_key(&key) {
            command.env(key, value);
        }
    }
    command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = match command.spawn() {
        Ok(child) => child,
        Err(e) => {
            return Ok(ToolResult {
                output: format!("Failed to spawn process: {e}"),
                exit_code: Some(1),
                ..ToolResult::default()
            });
        }
    };

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| HearthError::tool("child stdout was not captured"))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| HearthError::tool("child stderr was not captured"))?;

    // stdout and stderr are merged into one bounded buffer; past the cap the
    // readers keep draining so the child never blocks on a full pipe.
    let buffer = Arc::new(Mutex::new(CappedBuffer::new(ctx.max_output_bytes)));
    let reader = {
        let out_buf = buffer.clone();
        let err_buf = buffer.clone();
        tokio::spawn(async move {
            tokio::join!(drain_into(stdout, out_buf), drain_into(stderr, err_buf));
        })
    };

    let mut timed_out = false;
    eprintln!("DEBUG before timeout, tool_timeout={:?}", ctx.tool_timeout);
    let waited = tokio::time::timeout(ctx.tool_timeout, child.wait()).await;
    eprintln!("DEBUG after timeout wait, is_err={}", waited.is_err());
    let status = match waited {
        Ok(status) => status.map_err(|e| HearthError::Tool {
            message: format!("failed waiting for child: {e}"),
            source: Some(Box::new(e)),
        })?,
        Err(_) => {
            timed_out = true;
            eprintln!("DEBUG calling terminate");
            let s = terminate(&mut child).await?;
            eprintln!("DEBUG terminate returned {:?}", s);
            s
        }
    };

    let _ = reader.await;
    let (bytes, truncated) = {
        let buffer = buffer.lock().map_err(|_| HearthError::Internal("output buffer poisoned".into()))?;
        (buffer.bytes.clone(), buffer.truncated)
    };

    let mut output = String::from_utf8_lossy(&bytes).into_owned();
    if timed_out {
        if !output.is_empty() && !output.ends_with('\n') {
            output.push('\n');
        }
        output.push_str(&format!(
            "[command terminated after {}s timeout]",
            ctx.tool_timeout.as_secs()
        ));
    }

    Ok(ToolResult {
        output,
        exit_code: Some(status.code().unwrap_or(-1)),
        truncated,
        ..ToolResult::default()
    })
}

/// SIGTERM first; SIGKILL after the grace period.
async fn terminate(child: &mut tokio::process::Child) -> Result<std::process::ExitStatus, HearthError> {
    if let Some(pid) = child.id() {
        let _ = nix::sys::signal::kill(
            nix::unistd::Pid::from_raw(pid as i32),
            nix::sys::signal::Signal::SIGTERM,
        );
    }
    let waited = tokio::time::timeout(KILL_GRACE, child.wait()).await;
    match waited {
        Ok(status) => status.map_err(|e| HearthError::Tool {
            message: format!("failed waiting for terminated child: {e}"),
            source: Some(Box::new(e)),
        }),
        Err(_) => {
            let _ = child.start_kill();
            child.wait().await.map_err(|e| HearthError::Tool {
                message: format!("failed waiting for killed child: {e}"),
                source: Some(Box::new(e)),
            })
        }
    }
}

struct CappedBuffer {
    bytes: Vec<u8>,
    cap: usize,
    truncated: bool,
}

impl CappedBuffer {
    fn new(cap: usize) -> Self {
        Self {
            bytes: Vec::new(),
            cap,
            truncated: false,
        }
    }

    fn push(&mut self, chunk: &[u8]) {
        let remaining = self.cap.saturating_sub(self.bytes.len());
        if remaining >= chunk.len() {
            self.bytes.extend_from_slice(chunk);
        } else {
            self.bytes.extend_from_slice(&chunk[..remaining]);
            self.truncated = true;
        }
    }
}

async fn drain_into(mut reader: impl AsyncReadExt + Unpin, buffer: Arc<Mutex<CappedBuffer>>) {
    let mut chunk = [0u8; 8192];
    loop {
        match reader.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(n) => {
                if let Ok(mut buffer) = buffer.lock() {
                    buffer.push(&chunk[..n]);
                }
            }
        }
    }
}

/// One-line preview shown in the approval prompt.
fn summarize(command: &str) -> String {
    let first_line = command.lines().next().unwrap_or_default();
    if first_line.chars().count() > 120 {
        let prefix: String = first_line.chars().take(120).collect();
        format!("{prefix}…")
    } else {
        first_line.to_string()
    }
}

/// Whether an environment key is withheld from spawned children.
fn is_credential_key(key: &str) -> bool {
    CREDENTIAL_ENV_VARS.contains(&key) || CREDENTIAL_SUFFIX.is_match(key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::approval::ApprovalCoordinator;
    use hearth_security::{AuditLog, SecretFilter};
    use std::sync::Arc;

    fn context() -> ToolContext {
        ToolContext::new(
            Arc::new(ApprovalCoordinator::new()),
            Arc::new(AuditLog::disabled()),
            Arc::new(SecretFilter::disabled()),
        )
        .with_auto_approve(true)
    }

    #[tokio::test]
    async fn echo_returns_output_and_zero_exit() {
        let result = ShellTool
            .execute(serde_json::json!({"command": "echo hello"}), &context())
            .await
            .unwrap();
        assert_eq!(result.output.trim(), "hello");
        assert_eq!(result.exit_code, Some(0));
        assert!(!result.truncated);
    }

    #[tokio::test]
    async fn stderr_is_merged_into_output() {
        let result = ShellTool
            .execute(
                serde_json::json!({"command": "echo oops 1>&2; exit 3"}),
                &context(),
            )
            .await
            .unwrap();
        assert!(result.output.contains("oops"));
        assert_eq!(result.exit_code, Some(3));
    }

    #[tokio::test]
    async fn output_is_truncated_at_the_cap() {
        let ctx = context().with_limits(Duration::from_secs(30), 1024);
        let result = ShellTool
            .execute(
                serde_json::json!({"command": "head -c 10000 /dev/zero | tr '\\0' 'x'"}),
                &ctx,
            )
            .await
            .unwrap();
        assert!(result.truncated);
        assert!(result.output.len() <= 1024);
    }

    #[tokio::test]
    async fn timeout_terminates_the_child() {
        let ctx = context().with_limits(Duration::from_millis(200), 100 * 1024);
        let start = std::time::Instant::now();
        let result = ShellTool
            .execute(serde_json::json!({"command": "sleep 30"}), &ctx)
            .await
            .unwrap();
        assert!(start.elapsed() < Duration::from_secs(10));
        assert!(result.output.contains("timeout"));
        assert_ne!(result.exit_code, Some(0));
    }

    #[tokio::test]
    async fn working_dir_is_respected() {
        let dir = tempfile::tempdir().unwrap();
        let result = ShellTool
            .execute(
                serde_json::json!({
                    "command": "pwd",
                    "workingDir": dir.path().to_str().unwrap(),
                }),
                &context(),
            )
            .await
            .unwrap();
        // Canonicalize both sides: /tmp may be a symlink (macOS).
        let reported = std::fs::canonicalize(result.output.trim()).unwrap();
        let expected = std::fs::canonicalize(dir.path()).unwrap();
        assert_eq!(reported, expected);
    }

    #[tokio::test]
    async fn empty_command_is_rejected() {
        let err = ShellTool
            .execute(serde_json::json!({"command": "  "}), &context())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("empty"));
    }

    #[tokio::test]
    async fn unknown_input_field_is_rejected() {
        let err = ShellTool
            .execute(
                serde_json::json!({"command": "echo hi", "shell": "zsh"}),
                &context(),
            )
            .await
            .unwrap_err();
        assert!(err.to_string().contains("invalid bash input"));
    }

    #[tokio::test]
    async fn denial_returns_message_without_spawning() {
        let approvals = Arc::new(ApprovalCoordinator::new());
        let ctx = ToolContext::new(
            approvals.clone(),
            Arc::new(AuditLog::disabled()),
            Arc::new(SecretFilter::disabled()),
        );

        // Deny as soon as the approval request event is emitted.
        let marker = tempfile::NamedTempFile::new().unwrap();
        let marker_path = marker.path().to_path_buf();
        std::fs::remove_file(&marker_path).unwrap();

        let deny_approvals = approvals.clone();
        let ctx = ctx.with_push(Arc::new(move |event, data| {
            if event == "exec.approval_request" {
                let id = data["approvalId"].as_str().unwrap().to_string();
                deny_approvals.reject(&id, Some("nope".into()));
            }
        }));

        let command = format!("touch {}", marker_path.display());
        let result = ShellTool
            .execute(serde_json::json!({"command": command}), &ctx)
            .await
            .unwrap();

        assert_eq!(result.output, "Command denied by user: nope");
        assert_eq!(result.exit_code, Some(1));
        assert!(result.denied);
        assert!(!marker_path.exists(), "denied command must not spawn");
    }

    #[tokio::test]
    async fn approval_event_carries_summary_and_details() {
        use std::sync::Mutex;

        let approvals = Arc::new(ApprovalCoordinator::new());
        let seen: Arc<Mutex<Vec<serde_json::Value>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let approve = approvals.clone();
        let ctx = ToolContext::new(
            approvals,
            Arc::new(AuditLog::disabled()),
            Arc::new(SecretFilter::disabled()),
        )
        .with_push(Arc::new(move |event, data| {
            if event == "exec.approval_request" {
                sink.lock().unwrap().push(data.clone());
                approve.resolve(data["approvalId"].as_str().unwrap());
            }
        }));

        let result = ShellTool
            .execute(serde_json::json!({"command": "echo hello"}), &ctx)
            .await
            .unwrap();
        assert_eq!(result.output.trim(), "hello");

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0]["toolName"], "bash");
        assert_eq!(seen[0]["summary"], "echo hello");
        assert_eq!(seen[0]["details"]["command"], "echo hello");
    }

    #[test]
    fn credential_keys_are_stripped() {
        assert!(is_credential_key("ANTHROPIC_API_KEY"));
        assert!(is_credential_key("OPENAI_API_KEY"));
        assert!(is_credential_key("HEARTH_GATEWAY_TOKEN"));
        assert!(is_credential_key("MY_APP_SECRET"));
        assert!(is_credential_key("db_password"));
        assert!(is_credential_key("aws_credential"));
        assert!(!is_credential_key("PATH"));
        assert!(!is_credential_key("HOME"));
        assert!(!is_credential_key("TOKENIZER")); // suffix must be terminal
    }

    #[test]
    fn summary_is_first_line_capped() {
        assert_eq!(summarize("echo hello"), "echo hello");
        assert_eq!(summarize("line one\nline two"), "line one");
        let long = "x".repeat(500);
        assert!(summarize(&long).chars().count() <= 121);
    }
}
