//! Chat-completion provider wire formats.
//!
//! Each provider differs in endpoint, authentication header, request
//! payload and where the completion text sits in the response. The
//! differences are expressed as methods on [`Provider`] so the HTTP client
//! stays provider-agnostic.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde_json::{json, Value};

/// Referer sent to OpenRouter for attribution.
const OPENROUTER_REFERER: &str = "https://github.com/promptline/promptline";
/// API version header required by Anthropic.
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Default completion budget per request.
pub const DEFAULT_MAX_TOKENS: u32 = 4000;
/// Default sampling temperature.
pub const DEFAULT_TEMPERATURE: f64 = 0.7;
/// Default HTTP timeout for a single completion request.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Supported chat-completion providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Provider {
    OpenRouter,
    OpenAi,
    Gemini,
    Anthropic,
}

impl Provider {
    pub const ALL: [Provider; 4] = [
        Provider::OpenRouter,
        Provider::OpenAi,
        Provider::Gemini,
        Provider::Anthropic,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::OpenRouter => "openrouter",
            Self::OpenAi => "openai",
            Self::Gemini => "gemini",
            Self::Anthropic => "anthropic",
        }
    }

    /// Model used when none is configured.
    pub fn default_model(self) -> &'static str {
        match self {
            Self::OpenRouter => "openai/gpt-4o-mini",
            Self::OpenAi => "gpt-4o-mini",
            Self::Gemini => "gemini-1.5-flash",
            Self::Anthropic => "claude-3-5-haiku-latest",
        }
    }

    /// Published free-tier request budget, in requests per minute.
    pub fn default_requests_per_minute(self) -> u32 {
        match self {
            Self::OpenRouter => 20,
            Self::OpenAi => 50,
            Self::Gemini => 15,
            Self::Anthropic => 10,
        }
    }

    /// Public API root, used unless `LLM_BASE_URL` overrides it.
    pub fn default_base_url(self) -> &'static str {
        match self {
            Self::OpenRouter => "https://openrouter.ai/api/v1",
            Self::OpenAi => "https://api.openai.com/v1",
            Self::Gemini => "https://generativelanguage.googleapis.com/v1beta",
            Self::Anthropic => "https://api.anthropic.com/v1",
        }
    }

    /// Completion endpoint under `base_url`. Gemini carries the model in
    /// the path. No provider takes the key in the URL.
    pub fn endpoint(self, base_url: &str, model: &str) -> String {
        let base = base_url.trim_end_matches('/');
        match self {
            Self::OpenRouter | Self::OpenAi => format!("{base}/chat/completions"),
            Self::Gemini => format!("{base}/models/{model}:generateContent"),
            Self::Anthropic => format!("{base}/messages"),
        }
    }

    /// Provider-specific headers, excluding `Content-Type` which reqwest
    /// sets for JSON bodies.
    pub fn headers(self, api_key: &str) -> Vec<(&'static str, String)> {
        match self {
            Self::OpenRouter => vec![
                ("Authorization", format!("Bearer {api_key}")),
                ("HTTP-Referer", OPENROUTER_REFERER.to_string()),
            ],
            Self::OpenAi => vec![("Authorization", format!("Bearer {api_key}"))],
            Self::Gemini => vec![("x-goog-api-key", api_key.to_string())],
            Self::Anthropic => vec![
                ("x-api-key", api_key.to_string()),
                ("anthropic-version", ANTHROPIC_VERSION.to_string()),
            ],
        }
    }

    /// Request body for a single system + user exchange.
    pub fn payload(self, settings: &LlmSettings, system: &str, user: &str) -> Value {
        match self {
            Self::OpenRouter | Self::OpenAi => json!({
                "model": settings.model,
                "messages": [
                    { "role": "system", "content": system },
                    { "role": "user", "content": user },
                ],
                "max_tokens": settings.max_tokens,
                "temperature": settings.temperature,
            }),
            // Gemini has no separate system role on this endpoint.
            Self::Gemini => json!({
                "contents": [{ "parts": [{ "text": format!("{system}\n\n{user}") }] }],
                "generationConfig": {
                    "temperature": settings.temperature,
                    "maxOutputTokens": settings.max_tokens,
                },
            }),
            Self::Anthropic => json!({
                "model": settings.model,
                "max_tokens": settings.max_tokens,
                "temperature": settings.temperature,
                "system": system,
                "messages": [{ "role": "user", "content": user }],
            }),
        }
    }

    /// Pull the completion text out of a successful response body.
    pub fn extract_text(self, body: &Value) -> Option<String> {
        let text = match self {
            Self::OpenRouter | Self::OpenAi => body.pointer("/choices/0/message/content"),
            Self::Gemini => body.pointer("/candidates/0/content/parts/0/text"),
            Self::Anthropic => body.pointer("/content/0/text"),
        };
        text.and_then(Value::as_str).map(str::to_string)
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown provider name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown LLM provider '{0}' (expected openrouter, openai, gemini or anthropic)")]
pub struct UnknownProvider(pub String);

impl FromStr for Provider {
    type Err = UnknownProvider;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|p| p.as_str() == wanted)
            .ok_or_else(|| UnknownProvider(s.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

/// Connection and sampling settings for one provider.
#[derive(Clone)]
pub struct LlmSettings {
    pub provider: Provider,
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f64,
    pub requests_per_minute: u32,
    pub request_timeout: Duration,
}

impl LlmSettings {
    /// Settings with the provider's default model and rate limit.
    pub fn new(provider: Provider, api_key: impl Into<String>) -> Self {
        Self {
            provider,
            api_key: api_key.into(),
            base_url: provider.default_base_url().to_string(),
            model: provider.default_model().to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: DEFAULT_TEMPERATURE,
            requests_per_minute: provider.default_requests_per_minute(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    pub fn endpoint(&self) -> String {
        self.provider.endpoint(&self.base_url, &self.model)
    }
}

// The API key must never end up in logs.
impl fmt::Debug for LlmSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LlmSettings")
            .field("provider", &self.provider)
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("max_tokens", &self.max_tokens)
            .field("temperature", &self.temperature)
            .field("requests_per_minute", &self.requests_per_minute)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}
