// SPDX-FileCopyrightText: 2026 Hearth Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP client for the OpenAI chat-completions API.
//!
//! Handles bearer-token authentication, streaming SSE responses, and
//! transient-error retry, mirroring the Anthropic client's policy.

use std::pin::Pin;
use std::time::Duration;

use eventsource_stream::{Event, Eventsource};
use futures::{Stream, StreamExt};
use hearth_core::HearthError;
use reqwest::header::{HeaderMap, HeaderValue};
use tracing::{debug, warn};

use crate::types::{ChatCompletionRequest, OaiErrorResponse};

/// Base URL for the OpenAI chat-completions endpoint.
const API_BASE_URL: &str = "https://api.openai.com/v1/chat/completions";

/// HTTP client for OpenAI API communication.
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    client: reqwest::Client,
    base_url: String,
}

impl OpenAiClient {
    /// Creates a new client authenticated with the given API key.
    pub fn new(api_key: &str) -> Result<Self, HearthError> {
        let mut headers = HeaderMap::new();
        let bearer = format!("Bearer {api_key}");
        headers.insert(
            "authorization",
            HeaderValue::from_str(&bearer)
                .map_err(|e| HearthError::Config(format!("invalid API key header value: {e}")))?,
        );
        headers.insert("content-type", HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(300))
            .build()
            .map_err(|e| HearthError::Provider {
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;

        Ok(Self {
            client,
            base_url: API_BASE_URL.to_string(),
        })
    }

    /// Overrides the base URL (for testing with wiremock).
    #[doc(hidden)]
    pub fn with_base_url(mut self, url: String) -> Self {
        self.base_url = url;
        self
    }

    /// Sends a streaming request and returns the raw SSE event stream.
    ///
    /// OpenAI streams data-only SSE frames, ending with a literal
    /// `data: [DONE]` sentinel that the caller must interpret.
    pub async fn stream_completion(
        &self,
        request: &ChatCompletionRequest,
    ) -> Result<Pin<Box<dyn Stream<Item = Result<Event, HearthError>> + Send>>, HearthError> {
        let mut last_error = None;

        for attempt in 0..=1u32 {
            if attempt > 0 {
                warn!(attempt, "retrying streaming request after transient error");
                tokio::time::sleep(Duration::from_secs(1)).await;
            }

            let response = self
                .client
                .post(&self.base_url)
                .json(request)
                .send()
                .await
                .map_err(|e| HearthError::Provider {
                    message: format!("HTTP request failed: {e}"),
                    source: Some(Box::new(e)),
                })?;

            let status = response.status();
            debug!(status = %status, attempt, "streaming response received");

            if status.is_success() {
                let events = response.bytes_stream().eventsource().map(|result| {
                    result.map_err(|e| {
                        HearthError::provider(format!("SSE stream error: {e}"))
                    })
                });
                return Ok(Box::pin(events));
            }

            let body = response.text().await.unwrap_or_default();
            if is_transient_error(status) && attempt == 0 {
                warn!(status = %status, body = %body, "transient error, will retry");
                last_error = Some(HearthError::provider(format!("API returned {status}: {body}")));
                continue;
            }

            let message = match serde_json::from_str::<OaiErrorResponse>(&body) {
                Ok(api_err) => format!(
                    "OpenAI API error ({}): {}",
                    api_err.error.type_.as_deref().unwrap_or("unknown"),
                    api_err.error.message
                ),
                Err(_) => format!("API returned {status}: {body}"),
            };
            return Err(HearthError::provider(message));
        }

        Err(last_error
            .unwrap_or_else(|| HearthError::provider("streaming request failed after retries")))
    }
}

/// Returns true for HTTP status codes that indicate transient errors worth
/// retrying.
fn is_transient_error(status: reqwest::StatusCode) -> bool {
    matches!(status.as_u16(), 429 | 500 | 503)
}
