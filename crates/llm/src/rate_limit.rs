//! Client-side request pacing.

use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

/// Enforces a minimum interval of `60 / requests_per_minute` seconds
/// between consecutive requests.
///
/// Callers are serialized through the internal lock, so concurrent
/// requests queue up rather than bursting.
pub struct RateLimiter {
    min_interval: Duration,
    last_request: Mutex<Option<Instant>>,
}

impl RateLimiter {
    pub fn new(requests_per_minute: u32) -> Self {
        Self {
            min_interval: Self::interval_for(requests_per_minute),
            last_request: Mutex::new(None),
        }
    }

    /// Minimum spacing for a per-minute budget. A zero budget disables
    /// pacing.
    pub fn interval_for(requests_per_minute: u32) -> Duration {
        if requests_per_minute == 0 {
            Duration::ZERO
        } else {
            Duration::from_secs_f64(60.0 / f64::from(requests_per_minute))
        }
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Wait until a request may be issued, then record it.
    pub async fn acquire(&self) {
        let mut last = self.last_request.lock().await;
        if let Some(previous) = *last {
            let ready_at = previous + self.min_interval;
            let now = Instant::now();
            if ready_at > now {
                tracing::debug!(
                    wait_ms = (ready_at - now).as_millis() as u64,
                    "Rate limiting: waiting before next request",
                );
                tokio::time::sleep_until(ready_at).await;
            }
        }
        *last = Some(Instant::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interval_from_budget() {
        assert_eq!(RateLimiter::interval_for(20), Duration::from_secs(3));
        assert_eq!(RateLimiter::interval_for(60), Duration::from_secs(1));
        assert_eq!(RateLimiter::interval_for(0), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn first_request_is_immediate() {
        let limiter = RateLimiter::new(10);
        let start = Instant::now();
        limiter.acquire().await;
        assert_eq!(Instant::now() - start, Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn consecutive_requests_are_spaced() {
        let limiter = RateLimiter::new(20);
        let start = Instant::now();
        limiter.acquire().await;
        limiter.acquire().await;
        limiter.acquire().await;
        assert!(Instant::now() - start >= Duration::from_secs(6));
    }
}
