//! Request pacing for the remote service.
//!
//! The upstream enforces a hard requests-per-second cap. `acquire` sleeps
//! just long enough to keep consecutive issue times at least the minimum
//! interval apart; it never rejects, only delays. A server-supplied
//! Retry-After hint widens the gap before the next request only, then the
//! configured interval applies again.

use std::time::{Duration, Instant};

use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Longest gap a Retry-After hint is allowed to impose.
const MAX_HINT_DELAY: Duration = Duration::from_secs(300);

#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Maximum request rate allowed by the service.
    pub requests_per_second: f64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_second: 2.0,
        }
    }
}

impl RateLimitConfig {
    /// Minimum wall-clock gap between consecutive issued requests.
    pub fn min_interval(&self) -> Duration {
        if self.requests_per_second > 0.0 {
            Duration::from_secs_f64(1.0 / self.requests_per_second)
        } else {
            Duration::ZERO
        }
    }
}

#[derive(Debug)]
struct LimiterState {
    last_request: Option<Instant>,
    /// One-shot widening from a Retry-After hint; cleared on the next acquire.
    extra_delay: Option<Duration>,
    total_requests: u64,
    total_waited: Duration,
}

/// Paces calls so the gap between two consecutive permitted requests is
/// never below the configured minimum interval.
#[derive(Debug)]
pub struct RateLimiter {
    min_interval: Duration,
    state: Mutex<LimiterState>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            min_interval: config.min_interval(),
            state: Mutex::new(LimiterState {
                last_request: None,
                extra_delay: None,
                total_requests: 0,
                total_waited: Duration::ZERO,
            }),
        }
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Block until the next request may be issued, then record the issue time.
    ///
    /// The sleep happens outside the lock; a single logical caller drives
    /// requests sequentially, so the computed gap stays accurate.
    pub async fn acquire(&self) {
        let wait = {
            let state = self.state.lock().await;
            let interval = self.min_interval + state.extra_delay.unwrap_or(Duration::ZERO);
            match state.last_request {
                Some(last) => interval.saturating_sub(last.elapsed()),
                None => Duration::ZERO,
            }
        };

        if wait > Duration::ZERO {
            debug!("Pacing request: waiting {:?}", wait);
            tokio::time::sleep(wait).await;
        }

        let mut state = self.state.lock().await;
        state.last_request = Some(Instant::now());
        state.extra_delay = None;
        state.total_requests += 1;
        state.total_waited += wait;
    }

    /// Widen the gap before the next request only (server Retry-After hint).
    pub async fn widen_next(&self, hint: Duration) {
        let hint = hint.min(MAX_HINT_DELAY);
        let extra = hint.saturating_sub(self.min_interval);
        if extra.is_zero() {
            return;
        }
        warn!("Server requested a delay, widening next gap to {:?}", hint);
        let mut state = self.state.lock().await;
        state.extra_delay = Some(extra);
    }

    /// Total requests paced and total time spent waiting.
    pub async fn totals(&self) -> (u64, Duration) {
        let state = self.state.lock().await;
        (state.total_requests, state.total_waited)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(interval_ms: u64) -> RateLimiter {
        RateLimiter::new(RateLimitConfig {
            requests_per_second: 1000.0 / interval_ms as f64,
        })
    }

    #[tokio::test]
    async fn test_acquire_enforces_minimum_gap() {
        let limiter = limiter(50);
        let mut stamps = Vec::new();
        for _ in 0..3 {
            limiter.acquire().await;
            stamps.push(Instant::now());
        }
        for pair in stamps.windows(2) {
            assert!(pair[1] - pair[0] >= Duration::from_millis(45));
        }
    }

    #[tokio::test]
    async fn test_first_acquire_does_not_wait() {
        let limiter = limiter(200);
        let start = Instant::now();
        limiter.acquire().await;
        assert!(start.elapsed() < Duration::from_millis(50));
    }

    #[tokio::test]
    async fn test_hint_widens_next_gap_only() {
        let limiter = limiter(10);
        limiter.acquire().await;
        limiter.widen_next(Duration::from_millis(100)).await;

        let start = Instant::now();
        limiter.acquire().await;
        assert!(start.elapsed() >= Duration::from_millis(80));

        // Hint consumed, interval back to the configured minimum.
        let start = Instant::now();
        limiter.acquire().await;
        assert!(start.elapsed() < Duration::from_millis(60));
    }

    #[tokio::test]
    async fn test_totals() {
        let limiter = limiter(10);
        limiter.acquire().await;
        limiter.acquire().await;
        let (requests, _) = limiter.totals().await;
        assert_eq!(requests, 2);
    }
}
