//! Exponential-backoff retries around a [`TextGenerator`].
//!
//! Retryable failures (rate limits, transient transport errors) are
//! re-attempted with growing delays until either a call succeeds, the
//! attempt budget runs out, or the [`CancellationToken`] fires. The last
//! error is returned once the budget is exhausted.
//!
//! A call already in flight always runs to completion; cancellation is
//! only observed while waiting between attempts.

use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::GenerationError;
use crate::generator::{ChunkRequest, TextGenerator};

/// Tunable parameters for the backoff strategy.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Total attempts including the first one.
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Upper bound on the delay between attempts.
    pub max_delay: Duration,
    /// Factor by which the delay grows after each failure.
    pub multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            multiplier: 2.0,
        }
    }
}

/// Calculate the next backoff delay from the current delay and config.
///
/// The result is clamped to [`RetryConfig::max_delay`].
pub fn next_delay(current: Duration, config: &RetryConfig) -> Duration {
    let next_ms = (current.as_millis() as f64 * config.multiplier) as u64;
    Duration::from_millis(next_ms).min(config.max_delay)
}

/// Delay to wait after a failure: the backoff delay, raised to the
/// server's `Retry-After` hint when that is longer. Hints are still
/// bounded by `max_delay`.
pub fn wait_for(backoff: Duration, error: &GenerationError, config: &RetryConfig) -> Duration {
    match error.retry_after() {
        Some(hint) => backoff.max(hint.min(config.max_delay)),
        None => backoff,
    }
}

/// Wraps a generator with retry and backoff.
pub struct RetryingGenerator<G> {
    inner: G,
    config: RetryConfig,
    cancel: CancellationToken,
}

impl<G: TextGenerator> RetryingGenerator<G> {
    pub fn new(inner: G, config: RetryConfig, cancel: CancellationToken) -> Self {
        Self {
            inner,
            config,
            cancel,
        }
    }

    pub fn inner(&self) -> &G {
        &self.inner
    }
}

#[async_trait]
impl<G: TextGenerator> TextGenerator for RetryingGenerator<G> {
    async fn generate(&self, request: &ChunkRequest) -> Result<Vec<String>, GenerationError> {
        let max_attempts = self.config.max_attempts.max(1);
        let mut delay = self.config.initial_delay;
        let mut attempt = 0u32;

        loop {
            attempt += 1;

            let error = match self.inner.generate(request).await {
                Ok(prompts) => {
                    if attempt > 1 {
                        tracing::info!(
                            chunk_index = request.chunk_index,
                            attempt,
                            "Generation succeeded after retry",
                        );
                    }
                    return Ok(prompts);
                }
                Err(e) if !e.is_retryable() => return Err(e),
                Err(e) => e,
            };

            if attempt >= max_attempts {
                tracing::warn!(
                    chunk_index = request.chunk_index,
                    attempts = attempt,
                    error = %error,
                    "Giving up on chunk after exhausting retries",
                );
                return Err(error);
            }

            let wait = wait_for(delay, &error, &self.config);
            tracing::warn!(
                chunk_index = request.chunk_index,
                attempt,
                max_attempts,
                delay_ms = wait.as_millis() as u64,
                error = %error,
                "Generation attempt {attempt} failed, retrying",
            );

            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    tracing::info!(
                        chunk_index = request.chunk_index,
                        attempt,
                        "Cancelled while waiting to retry",
                    );
                    return Err(GenerationError::Cancelled);
                }
                _ = tokio::time::sleep(wait) => {}
            }

            delay = next_delay(delay, &self.config);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    use assert_matches::assert_matches;
    use tokio::time::Instant;

    use super::*;

    /// Replays a fixed script of results, one per call.
    struct Scripted {
        script: Mutex<VecDeque<Result<Vec<String>, GenerationError>>>,
        calls: AtomicU32,
    }

    impl Scripted {
        fn new(script: Vec<Result<Vec<String>, GenerationError>>) -> Self {
            Self {
                script: Mutex::new(script.into()),
                calls: AtomicU32::new(0),
            }
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl TextGenerator for Scripted {
        async fn generate(&self, _: &ChunkRequest) -> Result<Vec<String>, GenerationError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(GenerationError::Transient("script exhausted".into())))
        }
    }

    fn request() -> ChunkRequest {
        ChunkRequest {
            chunk_text: "text".into(),
            chunk_index: 0,
            total_chunks: 1,
            requested_count: 1,
            recent_prompts: Vec::new(),
            visual_style: "style".into(),
            dense_mode: false,
        }
    }

    fn transient() -> Result<Vec<String>, GenerationError> {
        Err(GenerationError::Transient("503".into()))
    }

    // -- backoff arithmetic --------------------------------------------------

    #[test]
    fn next_delay_doubles_and_clamps() {
        let config = RetryConfig {
            max_delay: Duration::from_secs(10),
            ..Default::default()
        };
        assert_eq!(next_delay(Duration::from_secs(1), &config), Duration::from_secs(2));
        assert_eq!(next_delay(Duration::from_secs(8), &config), Duration::from_secs(10));
    }

    #[test]
    fn full_backoff_sequence() {
        let config = RetryConfig::default();
        let mut delay = config.initial_delay;
        for expected in [1, 2, 4, 8, 16, 32, 60, 60] {
            assert_eq!(delay.as_secs(), expected);
            delay = next_delay(delay, &config);
        }
    }

    #[test]
    fn retry_after_raises_but_never_lowers_delay() {
        let config = RetryConfig::default();
        let limited = |secs| GenerationError::RateLimited {
            retry_after: Some(Duration::from_secs(secs)),
        };
        assert_eq!(wait_for(Duration::from_secs(2), &limited(10), &config), Duration::from_secs(10));
        assert_eq!(wait_for(Duration::from_secs(8), &limited(3), &config), Duration::from_secs(8));
        assert_eq!(wait_for(Duration::from_secs(1), &limited(600), &config), Duration::from_secs(60));
    }

    // -- retry loop ----------------------------------------------------------

    #[tokio::test(start_paused = true)]
    async fn retries_transient_then_succeeds() {
        let inner = Scripted::new(vec![transient(), transient(), Ok(vec!["ok".into()])]);
        let generator = RetryingGenerator::new(inner, RetryConfig::default(), CancellationToken::new());

        let start = Instant::now();
        let result = generator.generate(&request()).await;

        assert_eq!(result.unwrap(), vec!["ok".to_string()]);
        assert_eq!(generator.inner().calls(), 3);
        // 1s + 2s of backoff.
        assert!(Instant::now() - start >= Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_max_attempts() {
        let inner = Scripted::new(vec![transient(); 10]);
        let config = RetryConfig {
            max_attempts: 3,
            ..Default::default()
        };
        let generator = RetryingGenerator::new(inner, config, CancellationToken::new());

        let result = generator.generate(&request()).await;
        assert_matches!(result, Err(GenerationError::Transient(_)));
        assert_eq!(generator.inner().calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn permanent_errors_are_not_retried() {
        let inner = Scripted::new(vec![Err(GenerationError::Permanent("401".into()))]);
        let generator = RetryingGenerator::new(inner, RetryConfig::default(), CancellationToken::new());

        let result = generator.generate(&request()).await;
        assert_matches!(result, Err(GenerationError::Permanent(_)));
        assert_eq!(generator.inner().calls(), 1);
    }

    #[tokio::test]
    async fn cancellation_stops_retrying() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let inner = Scripted::new(vec![transient(); 5]);
        let generator = RetryingGenerator::new(inner, RetryConfig::default(), cancel);

        let result = generator.generate(&request()).await;
        assert_matches!(result, Err(GenerationError::Cancelled));
        assert_eq!(generator.inner().calls(), 1);
    }

    /// Takes a while to answer, like a real completion request.
    struct Slow;

    #[async_trait]
    impl TextGenerator for Slow {
        async fn generate(&self, _: &ChunkRequest) -> Result<Vec<String>, GenerationError> {
            tokio::time::sleep(Duration::from_millis(200)).await;
            Ok(vec!["finished".into()])
        }
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_lets_the_call_in_flight_finish() {
        let cancel = CancellationToken::new();
        let generator = RetryingGenerator::new(Slow, RetryConfig::default(), cancel.clone());

        let trigger = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            cancel.cancel();
        });

        let result = generator.generate(&request()).await;
        trigger.await.unwrap();
        assert_eq!(result.unwrap(), vec!["finished".to_string()]);
    }
}
