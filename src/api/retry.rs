//! Bounded retry with exponential backoff.
//!
//! This executor is the sole owner of retry logic. The transport performs
//! exactly one HTTP attempt per call, so a 3-attempt policy means at most
//! 3 requests on the wire - never a multiplied count from nested loops.

use std::future::Future;
use std::time::Duration;

use tracing::{info, warn};

use super::error::{ApiError, ErrorKind};
use super::response::ApiResponse;

/// Immutable retry configuration.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff_base: Duration,
    /// HTTP statuses worth waiting out.
    pub retryable_statuses: Vec<u16>,
    /// Error kinds without a status that are still transient.
    pub retryable_kinds: Vec<ErrorKind>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_base: Duration::from_secs(1),
            retryable_statuses: vec![429, 500, 502, 503, 504],
            retryable_kinds: vec![ErrorKind::Network, ErrorKind::Timeout],
        }
    }
}

impl RetryPolicy {
    /// Whether waiting and reissuing could possibly fix this failure.
    ///
    /// Authentication, not-found and malformed-request errors short-circuit:
    /// they indicate a configuration or request-shape problem that no number
    /// of retries can repair.
    pub fn is_retryable(&self, err: &ApiError) -> bool {
        if let Some(status) = err.status_code() {
            if self.retryable_statuses.contains(&status) {
                return true;
            }
        }
        self.retryable_kinds.contains(&err.kind())
    }

    /// Delay after failed attempt `attempt` (1-based): base * 2^(attempt-1).
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.backoff_base.saturating_mul(factor)
    }
}

/// Drives a single-attempt request function to completion under the policy.
#[derive(Debug, Clone, Default)]
pub struct RetryExecutor {
    policy: RetryPolicy,
}

impl RetryExecutor {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    /// Run `attempt_fn` until it succeeds, a fatal error appears, or the
    /// attempt budget is spent.
    ///
    /// Returns the first success. A non-retryable error is returned as-is
    /// immediately; a retryable error that survives every attempt comes back
    /// wrapped in [`ApiError::RetryExhausted`].
    pub async fn execute<F, Fut>(
        &self,
        operation: &str,
        mut attempt_fn: F,
    ) -> Result<ApiResponse, ApiError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<ApiResponse, ApiError>>,
    {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 1u32;
        loop {
            match attempt_fn().await {
                Ok(response) => {
                    if attempt > 1 {
                        info!("{} recovered after {} attempts", operation, attempt);
                    }
                    return Ok(response);
                }
                Err(err) => {
                    if !self.policy.is_retryable(&err) {
                        return Err(err);
                    }
                    if attempt >= max_attempts {
                        warn!(
                            "{} failed, all {} attempts exhausted: {}",
                            operation, attempt, err
                        );
                        return Err(ApiError::RetryExhausted {
                            attempts: attempt,
                            source: Box::new(err),
                        });
                    }
                    let delay = self.policy.backoff_delay(attempt);
                    warn!(
                        "{} attempt {}/{} failed ({}), retrying in {:?}",
                        operation, attempt, max_attempts, err, delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Instant;

    fn ok_response() -> ApiResponse {
        ApiResponse::new(json!({"result": []}), StatusCode::OK, HashMap::new())
    }

    fn server_error() -> ApiError {
        ApiError::Server {
            status: 503,
            message: "unavailable".to_string(),
        }
    }

    fn fast_executor(max_attempts: u32) -> RetryExecutor {
        RetryExecutor::new(RetryPolicy {
            max_attempts,
            backoff_base: Duration::from_millis(5),
            ..RetryPolicy::default()
        })
    }

    #[tokio::test]
    async fn test_success_on_first_attempt() {
        let calls = AtomicU32::new(0);
        let result = fast_executor(3)
            .execute("op", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok(ok_response()) }
            })
            .await;
        assert!(result.is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retryable_error_exhausts_attempt_budget() {
        let calls = AtomicU32::new(0);
        let result = fast_executor(3)
            .execute("op", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(server_error()) }
            })
            .await;
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        match result {
            Err(ApiError::RetryExhausted { attempts, source }) => {
                assert_eq!(attempts, 3);
                assert_eq!(source.status_code(), Some(503));
            }
            other => panic!("expected RetryExhausted, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_fatal_error_short_circuits() {
        let calls = AtomicU32::new(0);
        let result = fast_executor(3)
            .execute("op", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async {
                    Err(ApiError::Authentication { status: 401 })
                }
            })
            .await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(matches!(result, Err(ApiError::Authentication { .. })));
    }

    #[tokio::test]
    async fn test_recovers_after_transient_failure() {
        let calls = AtomicU32::new(0);
        let result = fast_executor(3)
            .execute("op", || {
                let attempt = calls.fetch_add(1, Ordering::SeqCst) + 1;
                async move {
                    if attempt < 2 {
                        Err(ApiError::RateLimited {
                            status: 429,
                            retry_after: None,
                        })
                    } else {
                        Ok(ok_response())
                    }
                }
            })
            .await;
        assert!(result.is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_backoff_schedule_doubles() {
        let policy = RetryPolicy {
            backoff_base: Duration::from_millis(10),
            ..RetryPolicy::default()
        };
        assert_eq!(policy.backoff_delay(1), Duration::from_millis(10));
        assert_eq!(policy.backoff_delay(2), Duration::from_millis(20));
        assert_eq!(policy.backoff_delay(3), Duration::from_millis(40));

        // Measured wall clock over two failed attempts: 10ms + 20ms minimum.
        let executor = RetryExecutor::new(policy);
        let start = Instant::now();
        let _ = executor
            .execute("op", || async { Err::<ApiResponse, _>(server_error()) })
            .await;
        assert!(start.elapsed() >= Duration::from_millis(30));
    }

    #[test]
    fn test_classification_follows_policy_sets() {
        let policy = RetryPolicy::default();
        assert!(policy.is_retryable(&ApiError::Network("refused".into())));
        assert!(policy.is_retryable(&ApiError::Timeout("slow".into())));
        assert!(policy.is_retryable(&server_error()));
        assert!(!policy.is_retryable(&ApiError::Authentication { status: 403 }));
        assert!(!policy.is_retryable(&ApiError::NotFound {
            method: "crm.company.get".into()
        }));
        assert!(!policy.is_retryable(&ApiError::BadRequest {
            status: 400,
            message: String::new()
        }));
        assert!(!policy.is_retryable(&ApiError::Protocol("not json".into())));
        // 501 is not in the retryable status set.
        assert!(!policy.is_retryable(&ApiError::Server {
            status: 501,
            message: String::new()
        }));
    }
}
