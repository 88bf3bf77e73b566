//! HTTP chat-completion client.
//!
//! Wraps a provider's completion endpoint using [`reqwest`], applies the
//! per-client [`RateLimiter`], and implements [`TextGenerator`] by
//! rendering the prompt templates and splitting the completion into lines.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::StatusCode;

use crate::error::{ChatApiError, GenerationError};
use crate::generator::{parse_prompt_lines, ChunkRequest, TextGenerator};
use crate::provider::LlmSettings;
use crate::rate_limit::RateLimiter;
use crate::templates;

/// Chat-completion client for a single provider.
pub struct ChatClient {
    client: reqwest::Client,
    settings: LlmSettings,
    limiter: RateLimiter,
}

impl ChatClient {
    /// Create a client with its own connection pool and the configured
    /// request timeout.
    pub fn new(settings: LlmSettings) -> Result<Self, ChatApiError> {
        let client = reqwest::Client::builder()
            .timeout(settings.request_timeout)
            .build()?;
        Ok(Self::with_client(client, settings))
    }

    /// Create a client reusing an existing [`reqwest::Client`].
    pub fn with_client(client: reqwest::Client, settings: LlmSettings) -> Self {
        let limiter = RateLimiter::new(settings.requests_per_minute);
        Self {
            client,
            settings,
            limiter,
        }
    }

    pub fn settings(&self) -> &LlmSettings {
        &self.settings
    }

    /// Send one system + user exchange and return the completion text.
    pub async fn complete(&self, system: &str, user: &str) -> Result<String, ChatApiError> {
        self.limiter.acquire().await;

        let provider = self.settings.provider;
        let mut request = self
            .client
            .post(self.settings.endpoint())
            .json(&provider.payload(&self.settings, system, user));
        for (name, value) in provider.headers(&self.settings.api_key) {
            request = request.header(name, value);
        }

        tracing::debug!(
            provider = provider.as_str(),
            model = %self.settings.model,
            "Sending completion request",
        );

        let response = request.send().await?;
        let status = response.status();
        let retry_after = parse_retry_after(response.headers());
        let body = response.text().await?;

        if !status.is_success() {
            let err = error_for_status(provider.as_str(), status, retry_after, body);
            tracing::warn!(provider = provider.as_str(), error = %err, "Completion request failed");
            return Err(err);
        }

        let json: serde_json::Value =
            serde_json::from_str(&body).map_err(|e| ChatApiError::MalformedResponse {
                provider: provider.as_str(),
                reason: e.to_string(),
            })?;

        provider
            .extract_text(&json)
            .ok_or_else(|| ChatApiError::MalformedResponse {
                provider: provider.as_str(),
                reason: "completion text not found in response".to_string(),
            })
    }
}

#[async_trait]
impl TextGenerator for ChatClient {
    async fn generate(&self, request: &ChunkRequest) -> Result<Vec<String>, GenerationError> {
        let system = templates::system_prompt(&request.visual_style, request.dense_mode);
        let user = templates::chunk_prompt(request);

        let completion = self.complete(&system, &user).await?;
        let prompts = parse_prompt_lines(&completion);

        tracing::debug!(
            chunk_index = request.chunk_index,
            requested = request.requested_count,
            returned = prompts.len(),
            "Parsed completion into prompts",
        );
        Ok(prompts)
    }
}

// ---- private helpers ----

/// Map a non-2xx status to the matching [`ChatApiError`].
fn error_for_status(
    provider: &'static str,
    status: StatusCode,
    retry_after: Option<Duration>,
    body: String,
) -> ChatApiError {
    if status == StatusCode::TOO_MANY_REQUESTS {
        ChatApiError::RateLimited {
            provider,
            retry_after,
        }
    } else {
        ChatApiError::ApiError {
            provider,
            status: status.as_u16(),
            body,
        }
    }
}

/// `Retry-After` in delay-seconds form. HTTP-date values are ignored and
/// fall back to the caller's own backoff.
fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}
