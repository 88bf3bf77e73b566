//! Error types for the collaborator boundary.

use std::time::Duration;

/// Failure of a single chunk generation request, as seen by the pipeline.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GenerationError {
    /// The provider asked us to slow down.
    #[error("Rate limited by provider{}", retry_after_suffix(.retry_after))]
    RateLimited { retry_after: Option<Duration> },

    /// Timeout, connection failure, 5xx or an unreadable response body.
    #[error("Transient generation failure: {0}")]
    Transient(String),

    /// Authentication, quota or request errors that retrying cannot fix.
    #[error("Permanent generation failure: {0}")]
    Permanent(String),

    /// The run was cancelled while waiting to retry a failed request.
    #[error("Generation cancelled")]
    Cancelled,
}

impl GenerationError {
    /// Whether retrying the same request may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimited { .. } | Self::Transient(_))
    }

    /// Server-provided wait before the next attempt, if any.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }
}

fn retry_after_suffix(retry_after: &Option<Duration>) -> String {
    match retry_after {
        Some(d) => format!(" (retry after {}s)", d.as_secs()),
        None => String::new(),
    }
}

/// Errors from the HTTP chat-completion layer.
#[derive(Debug, thiserror::Error)]
pub enum ChatApiError {
    /// The HTTP request itself failed (network, DNS, TLS, timeout, etc.).
    /// The URL is stripped so it never reaches logs or snapshots.
    #[error("HTTP request failed: {0}")]
    Request(reqwest::Error),

    /// The provider returned HTTP 429.
    #[error("Rate limit exceeded for {provider}")]
    RateLimited {
        provider: &'static str,
        retry_after: Option<Duration>,
    },

    /// The provider returned a non-2xx status code.
    #[error("{provider} API error ({status}): {body}")]
    ApiError {
        provider: &'static str,
        status: u16,
        body: String,
    },

    /// The response body did not have the provider's expected shape.
    #[error("Malformed response from {provider}: {reason}")]
    MalformedResponse {
        provider: &'static str,
        reason: String,
    },
}

impl From<reqwest::Error> for ChatApiError {
    fn from(err: reqwest::Error) -> Self {
        Self::Request(err.without_url())
    }
}

impl From<ChatApiError> for GenerationError {
    fn from(err: ChatApiError) -> Self {
        match err {
            ChatApiError::RateLimited { retry_after, .. } => Self::RateLimited { retry_after },
            ChatApiError::Request(e) => Self::Transient(e.to_string()),
            ChatApiError::ApiError { status, .. } if status == 408 || status >= 500 => {
                Self::Transient(err.to_string())
            }
            ChatApiError::ApiError { .. } => Self::Permanent(err.to_string()),
            ChatApiError::MalformedResponse { .. } => Self::Transient(err.to_string()),
        }
    }
}
