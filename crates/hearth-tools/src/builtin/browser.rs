// SPDX-FileCopyrightText: 2026 Hearth Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Built-in headless browser tool.
//!
//! Drives a single shared headless Chromium instance over CDP. Pages are
//! isolated per caller-supplied session id (one is minted if absent). Every
//! action reports progress so the UI can render per-step status; the first
//! failing action stops the rest. When no Chromium is installed the tool
//! degrades to an error result instead of failing the turn.

use std::sync::Arc;

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::page::CaptureScreenshotFormat;
use chromiumoxide::page::{Page, ScreenshotParams};
use dashmap::DashMap;
use futures::StreamExt;
use serde::Deserialize;
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use uuid::Uuid;

use hearth_core::{Attachment, AttachmentKind, HearthError, ToolResult};

use crate::approval::Decision;
use crate::tool::{Tool, ToolContext};

/// Maximum actions per invocation.
const MAX_ACTIONS: usize = 20;

/// Navigation commit cap.
const NAV_COMMIT_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(20);

/// Best-effort DOM-content-loaded cap after commit.
const NAV_SETTLE_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(3);

/// Extracted-text cap per action.
const EXTRACT_CHAR_LIMIT: usize = 10_000;

/// One browser action in the model's action list.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case", deny_unknown_fields)]
enum BrowserAction {
    Navigate {
        url: String,
    },
    Click {
        selector: String,
    },
    Type {
        selector: String,
        text: String,
    },
    Screenshot {},
    Extract {
        #[serde(default)]
        selector: Option<String>,
    },
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct BrowserInput {
    actions: Vec<BrowserAction>,
    #[serde(default)]
    session_id: Option<String>,
}

/// Lazily started shared Chromium instance with per-session pages.
///
/// `close_all` must drain before process exit.
#[derive(Default)]
pub struct BrowserManager {
    instance: tokio::sync::Mutex<Option<BrowserInstance>>,
    pages: DashMap<String, Page>,
}

struct BrowserInstance {
    browser: Browser,
    handler_task: JoinHandle<()>,
}

impl BrowserManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Gets or creates the page for one browsing session, launching the
    /// shared instance on first use.
    async fn page_for(&self, session_id: &str) -> Result<Page, HearthError> {
        if let Some(page) = self.pages.get(session_id) {
            return Ok(page.clone());
        }

        let mut guard = self.instance.lock().await;
        if guard.is_none() {
            *guard = Some(launch_browser().await?);
        }
        let instance = guard
            .as_ref()
            .ok_or_else(|| HearthError::Internal("browser instance vanished".into()))?;

        let page = instance
            .browser
            .new_page("about:blank")
            .await
            .map_err(|e| HearthError::Tool {
                message: format!("failed to open browser page: {e}"),
                source: Some(Box::new(e)),
            })?;
        self.pages.insert(session_id.to_string(), page.clone());
        debug!(session_id, "browser session page created");
        Ok(page)
    }

    /// Closes every page and the shared instance.
    pub async fn close_all(&self) {
        self.pages.clear();
        let mut guard = self.instance.lock().await;
        if let Some(mut instance) = guard.take() {
            if let Err(e) = instance.browser.close().await {
                warn!(error = %e, "failed to close headless browser");
            }
            let _ = instance.browser.wait().await;
            instance.handler_task.abort();
        }
    }
}

async fn launch_browser() -> Result<BrowserInstance, HearthError> {
    let config = BrowserConfig::builder()
        .build()
        .map_err(|e| HearthError::tool(format!("failed to configure headless browser: {e}")))?;
    let (browser, mut handler) = Browser::launch(config).await.map_err(|e| HearthError::Tool {
        message: format!("failed to start headless browser: {e}"),
        source: Some(Box::new(e)),
    })?;

    // The handler stream must be polled for the CDP connection to make
    // progress.
    let handler_task = tokio::spawn(async move {
        while let Some(event) = handler.next().await {
            if event.is_err() {
                break;
            }
        }
    });

    Ok(BrowserInstance {
        browser,
        handler_task,
    })
}

/// Headless browser automation behind the approval gate.
pub struct BrowserTool {
    manager: Arc<BrowserManager>,
}

impl BrowserTool {
    pub fn new(manager: Arc<BrowserManager>) -> Self {
        Self { manager }
    }
}

#[async_trait]
impl Tool for BrowserTool {
    fn name(&self) -> &str {
        "browser"
    }

    fn description(&self) -> &str {
        "Drive a headless browser: navigate, click, type, screenshot, and \
         extract visible text. Actions run in order within an isolated \
         browsing session. Requires user approval."
    }

    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "actions": {
                    "type": "array",
                    "minItems": 1,
                    "maxItems": MAX_ACTIONS,
                    "items": {
                        "type": "object",
                        "properties": {
                            "action": {
                                "type": "string",
                                "enum": ["navigate", "click", "type", "screenshot", "extract"]
                            },
                            "url": {"type": "string"},
                            "selector": {"type": "string"},
                            "text": {"type": "string"}
                        },
                        "required": ["action"]
                    }
                },
                "sessionId": {
                    "type": "string",
                    "description": "Reuse an existing browsing session"
                }
            },
            "required": ["actions"]
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
        let input: BrowserInput = serde_json::from_value(input)
            .map_err(|e| HearthError::tool(format!("invalid browser input: {e}")))?;
        if input.actions.is_empty() || input.actions.len() > MAX_ACTIONS {
            return Err(HearthError::tool(format!(
                "actions must contain between 1 and {MAX_ACTIONS} entries"
            )));
        }

        if !ctx.auto_approve {
            let approval_id = Uuid::new_v4().to_string();
            let ticket = ctx.approvals.request(&approval_id);
            ctx.send_event(
                "exec.approval_request",
                serde_json::json!({
                    "approvalId": approval_id,
                    "toolName": self.name(),
                    "summary": format!("{} browser action(s)", input.actions.len()),
                    "details": {
                        "actions": input.actions.iter().map(describe_action).collect::<Vec<_>>(),
                        "sessionId": &input.session_id,
                    },
                }),
            );

            if let Decision::Denied { reason } = ticket.decision().await {
                let output = match reason.as_deref() {
                    Some(reason) if !reason.is_empty() => {
                        format!("Browser actions denied by user: {reason}")
                    }
                    _ => "Browser actions denied by user".to_string(),
                };
                return Ok(ToolResult {
                    output,
                    exit_code: Some(1),
                    denied: true,
                    ..ToolResult::default()
                });
            }
        }

        let session_id = input
            .session_id
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        let page = match self.manager.page_for(&session_id).await {
            Ok(page) => page,
            Err(e) => {
                return Ok(ToolResult {
                    output: format!("{e}"),
                    exit_code: Some(1),
                    ..ToolResult::default()
                });
            }
        };

        let mut lines = vec![format!("Browser session: {session_id}")];
        let mut attachments = Vec::new();

        for (i, action) in input.actions.iter().enumerate() {
            let step = i + 1;
            let outcome = run_action(&page, action, step, &mut attachments).await;
            ctx.report_progress(&describe_action(action));
            match outcome {
                ActionOutcome::Ok(line) => lines.push(format!("{step}. {line}")),
                ActionOutcome::Refused(line) => {
                    // Per-action refusal; later actions still run.
                    lines.push(format!("{step}. {line}"));
                }
                ActionOutcome::Blocked(line) | ActionOutcome::Failed(line) => {
                    lines.push(format!("{step}. {line}"));
                    if i + 1 < input.actions.len() {
                        lines.push(format!(
                            "Skipped {} remaining action(s).",
                            input.actions.len() - i - 1
                        ));
                    }
                    break;
                }
            }
        }

        Ok(ToolResult {
            output: lines.join("\n"),
            attachments,
            ..ToolResult::default()
        })
    }
}

enum ActionOutcome {
    Ok(String),
    /// Per-action refusal (password fields); the call continues.
    Refused(String),
    /// Disallowed navigation; the call stops.
    Blocked(String),
    /// Browser-level failure; the call stops.
    Failed(String),
}

async fn run_action(
    page: &Page,
    action: &BrowserAction,
    step: usize,
    attachments: &mut Vec<Attachment>,
) -> ActionOutcome {
    match action {
        BrowserAction::Navigate { url } => {
            if !is_allowed_url(url) {
                return ActionOutcome::Blocked(format!("Blocked navigation to {url}"));
            }
            match tokio::time::timeout(NAV_COMMIT_TIMEOUT, page.goto(url.clone())).await {
                Ok(Ok(_)) => {}
                Ok(Err(e)) => {
                    return ActionOutcome::Failed(format!("navigate {url}: failed: {e}"));
                }
                Err(_) => {
                    // Both timeouts are non-fatal; extraction continues
                    // against whatever the page currently exposes.
                    return ActionOutcome::Ok(format!(
                        "navigate {url}: still loading after {}s, continuing",
                        NAV_COMMIT_TIMEOUT.as_secs()
                    ));
                }
            }
            match tokio::time::timeout(NAV_SETTLE_TIMEOUT, page.wait_for_navigation()).await {
                Ok(_) => ActionOutcome::Ok(format!("navigated to {url}")),
                Err(_) => ActionOutcome::Ok(format!(
                    "navigated to {url} (content still loading, continuing)"
                )),
            }
        }
        BrowserAction::Click { selector } => {
            match async {
                page.find_element(selector.clone()).await?.click().await?;
                Ok::<_, chromiumoxide::error::CdpError>(())
            }
            .await
            {
                Ok(()) => ActionOutcome::Ok(format!("clicked {selector}")),
                Err(e) => ActionOutcome::Failed(format!("click {selector}: failed: {e}")),
            }
        }
        BrowserAction::Type { selector, text } => {
            let element = match page.find_element(selector.clone()).await {
                Ok(element) => element,
                Err(e) => return ActionOutcome::Failed(format!("type {selector}: failed: {e}")),
            };
            match element.attribute("type").await {
                Ok(Some(kind)) if kind.eq_ignore_ascii_case("password") => {
                    return ActionOutcome::Refused(format!(
                        "Refused to type into password field {selector}"
                    ));
                }
                Ok(_) => {}
                Err(e) => return ActionOutcome::Failed(format!("type {selector}: failed: {e}")),
            }
            match async {
                element.click().await?;
                element.type_str(text.clone()).await?;
                Ok::<_, chromiumoxide::error::CdpError>(())
            }
            .await
            {
                Ok(()) => ActionOutcome::Ok(format!("typed into {selector}")),
                Err(e) => ActionOutcome::Failed(format!("type {selector}: failed: {e}")),
            }
        }
        BrowserAction::Screenshot {} => {
            let params = ScreenshotParams::builder()
                .format(CaptureScreenshotFormat::Png)
                .build();
            match page.screenshot(params).await {
                Ok(bytes) => {
                    attachments.push(Attachment {
                        kind: AttachmentKind::Image,
                        mime_type: "image/png".into(),
                        data: BASE64.encode(&bytes),
                        name: Some(format!("screenshot-{step}")),
                    });
                    ActionOutcome::Ok(format!("captured screenshot-{step}"))
                }
                Err(e) => ActionOutcome::Failed(format!("screenshot: failed: {e}")),
            }
        }
        BrowserAction::Extract { selector } => {
            let js = match selector {
                Some(selector) => format!(
                    "(() => {{ const el = document.querySelector({}); return el ? el.innerText : ''; }})()",
                    js_string(selector)
                ),
                None => "document.body ? document.body.innerText : ''".to_string(),
            };
            match page.evaluate(js).await {
                Ok(result) => {
                    let text: String = result.into_value().unwrap_or_default();
                    let (text, truncated) = truncate_chars(&text, EXTRACT_CHAR_LIMIT);
                    let marker = if truncated { " [truncated]" } else { "" };
                    ActionOutcome::Ok(format!("extracted text:{marker}\n{text}"))
                }
                Err(e) => ActionOutcome::Failed(format!("extract: failed: {e}")),
            }
        }
    }
}

/// Only http and https navigations are allowed; `file:`, `chrome:`,
/// `chrome-extension:`, `about:`, and `javascript:` are rejected.
fn is_allowed_url(url: &str) -> bool {
    let lower = url.trim().to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

fn describe_action(action: &BrowserAction) -> String {
    match action {
        BrowserAction::Navigate { url } => format!("navigate {url}"),
        BrowserAction::Click { selector } => format!("click {selector}"),
        BrowserAction::Type { selector, .. } => format!("type into {selector}"),
        BrowserAction::Screenshot {} => "screenshot".to_string(),
        BrowserAction::Extract { selector } => match selector {
            Some(selector) => format!("extract {selector}"),
            None => "extract page text".to_string(),
        },
    }
}

fn js_string(value: &str) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "\"\"".to_string())
}

fn truncate_chars(text: &str, limit: usize) -> (String, bool) {
    if text.chars().count() <= limit {
        (text.to_string(), false)
    } else {
        (text.chars().take(limit).collect(), true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_list_deserializes_tagged_variants() {
        let json = serde_json::json!({
            "actions": [
                {"action": "navigate", "url": "https://example.com"},
                {"action": "click", "selector": "#go"},
                {"action": "type", "selector": "input[name=q]", "text": "hearth"},
                {"action": "screenshot"},
                {"action": "extract", "selector": "main"}
            ],
            "sessionId": "sess-1"
        });
        let input: BrowserInput = serde_json::from_value(json).unwrap();
        assert_eq!(input.actions.len(), 5);
        assert_eq!(input.session_id.as_deref(), Some("sess-1"));
        assert!(matches!(&input.actions[0], BrowserAction::Navigate { url } if url == "https://example.com"));
        assert!(matches!(&input.actions[3], BrowserAction::Screenshot {}));
    }

    #[test]
    fn unknown_action_is_rejected() {
        let json = serde_json::json!({"actions": [{"action": "download", "url": "x"}]});
        assert!(serde_json::from_value::<BrowserInput>(json).is_err());
    }

    #[test]
    fn scheme_blocklist() {
        assert!(is_allowed_url("https://example.com"));
        assert!(is_allowed_url("http://localhost:3000/page"));
        assert!(is_allowed_url("  HTTPS://EXAMPLE.COM  "));
        assert!(!is_allowed_url("file:///etc/passwd"));
        assert!(!is_allowed_url("chrome://settings"));
        assert!(!is_allowed_url("chrome-extension://abc/x.html"));
        assert!(!is_allowed_url("about:blank"));
        assert!(!is_allowed_url("javascript:alert(1)"));
        assert!(!is_allowed_url("ftp://example.com"));
    }

    #[test]
    fn extract_truncates_at_char_limit() {
        let long = "é".repeat(EXTRACT_CHAR_LIMIT + 5);
        let (text, truncated) = truncate_chars(&long, EXTRACT_CHAR_LIMIT);
        assert!(truncated);
        assert_eq!(text.chars().count(), EXTRACT_CHAR_LIMIT);

        let (text, truncated) = truncate_chars("short", EXTRACT_CHAR_LIMIT);
        assert!(!truncated);
        assert_eq!(text, "short");
    }

    #[test]
    fn describe_action_names_each_step() {
        assert_eq!(
            describe_action(&BrowserAction::Navigate { url: "https://a".into() }),
            "navigate https://a"
        );
        assert_eq!(
            describe_action(&BrowserAction::Extract { selector: None }),
            "extract page text"
        );
    }

    #[test]
    fn js_string_escapes_quotes() {
        assert_eq!(js_string("a\"b"), "\"a\\\"b\"");
    }

    #[tokio::test]
    async fn too_many_actions_is_rejected() {
        let manager = Arc::new(BrowserManager::new());
        let tool = BrowserTool::new(manager);
        let actions: Vec<_> = (0..MAX_ACTIONS + 1)
            .map(|_| serde_json::json!({"action": "screenshot"}))
            .collect();
        let ctx = crate::tool::ToolContext::new(
            Arc::new(crate::approval::ApprovalCoordinator::new()),
            Arc::new(hearth_security::AuditLog::disabled()),
            Arc::new(hearth_security::SecretFilter::disabled()),
        )
        .with_auto_approve(true);
        let err = tool
            .execute(serde_json::json!({"actions": actions}), &ctx)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("between 1 and"));
    }
}
