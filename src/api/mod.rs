//! Resilient access layer for the remote CRM REST service.
//!
//! Every request follows one path: cache check, then the retry executor,
//! which paces each attempt through the rate limiter before handing it to
//! the single-attempt transport. Cache writes happen only on success.
//!
//! One [`ApiClient`] serves one logical caller for one report run. Parallel
//! runs each get their own client with their own cache and rate-limiter
//! state; nothing is shared across instances.

mod cache;
mod error;
mod fetcher;
mod rate_limiter;
mod request;
mod response;
mod retry;
mod transport;

pub use cache::{CacheStats, ResponseCache, DEFAULT_TTL};
pub use error::{ApiError, ErrorKind};
pub use fetcher::{BatchFailure, BatchOutcome};
pub use rate_limiter::{RateLimitConfig, RateLimiter};
pub use request::{canonical_json, ApiRequest, HttpVerb};
pub use response::ApiResponse;
pub use retry::{RetryExecutor, RetryPolicy};
pub use transport::{encode_query, HttpTransport, Transport};

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use serde_json::{json, Value};
use tracing::debug;

use crate::config::{Config, ConfigError};
use crate::models::{Company, Invoice, LineItem};

/// Cumulative counters for one client instance.
#[derive(Debug, Clone, Default)]
pub struct ClientStats {
    /// Logical requests that went past the cache (retries not counted).
    pub total_requests: u64,
    pub successes: u64,
    pub failures: u64,
    pub cache: CacheStats,
}

/// Facade over the access layer. Owns the connection pool, the pacing and
/// retry state, and a per-run response cache.
pub struct ApiClient {
    transport: Arc<dyn Transport>,
    limiter: RateLimiter,
    retry: RetryExecutor,
    cache: ResponseCache,
    page_size: usize,
    batch_limit: usize,
    requests: AtomicU64,
    successes: AtomicU64,
    failures: AtomicU64,
}

impl ApiClient {
    /// Client over HTTPS against the configured webhook endpoint.
    pub fn new(config: &Config) -> Result<Self, ConfigError> {
        let endpoint = config.endpoint()?;
        let transport = HttpTransport::new(endpoint, Duration::from_secs(config.timeout_secs));
        Ok(Self::with_transport(config, Arc::new(transport)))
    }

    /// Client over a caller-supplied transport (used by tests).
    pub fn with_transport(config: &Config, transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            limiter: RateLimiter::new(RateLimitConfig {
                requests_per_second: config.requests_per_second,
            }),
            retry: RetryExecutor::new(RetryPolicy {
                max_attempts: config.max_attempts,
                backoff_base: Duration::from_secs_f64(config.backoff_base_secs),
                ..RetryPolicy::default()
            }),
            cache: ResponseCache::new(Duration::from_secs(config.cache_ttl_secs)),
            page_size: config.page_size,
            batch_limit: config.batch_limit,
            requests: AtomicU64::new(0),
            successes: AtomicU64::new(0),
            failures: AtomicU64::new(0),
        }
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn batch_limit(&self) -> usize {
        self.batch_limit
    }

    /// Issue one logical request: cache, then retry/pacing/transport.
    pub async fn call(&self, request: &ApiRequest) -> Result<Value, ApiError> {
        if let Some(payload) = self.cache.get(request).await {
            debug!("Cache hit for {}", request.method());
            return Ok(payload);
        }

        self.requests.fetch_add(1, Ordering::Relaxed);
        let result = self
            .retry
            .execute(request.method(), || {
                let transport = Arc::clone(&self.transport);
                let limiter = &self.limiter;
                async move {
                    limiter.acquire().await;
                    let outcome = transport.send(request).await;
                    if let Err(ApiError::RateLimited {
                        retry_after: Some(seconds),
                        ..
                    }) = &outcome
                    {
                        limiter.widen_next(Duration::from_secs(*seconds)).await;
                    }
                    outcome
                }
            })
            .await;

        match result {
            Ok(response) => {
                self.successes.fetch_add(1, Ordering::Relaxed);
                let payload = response.into_payload();
                self.cache.put(request, &payload).await;
                Ok(payload)
            }
            Err(err) => {
                self.failures.fetch_add(1, Ordering::Relaxed);
                Err(err)
            }
        }
    }

    /// Invoices created in the inclusive date range, in upstream order.
    pub async fn list_invoices(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<Invoice>, ApiError> {
        let request = ApiRequest::new("crm.invoice.list")
            .with_param("order", json!({"DATE_INSERT": "ASC"}))
            .with_param(
                "filter",
                json!({
                    ">=DATE_INSERT": from.format("%Y-%m-%d").to_string(),
                    "<=DATE_INSERT": to.format("%Y-%m-%d").to_string(),
                }),
            );
        let items = self.fetch_all(request).await?;
        items
            .into_iter()
            .map(|item| {
                serde_json::from_value(item)
                    .map_err(|err| ApiError::Protocol(format!("invoice decode: {}", err)))
            })
            .collect()
    }

    /// A single company record by id. Identical lookups from different call
    /// sites within the TTL window hit the cache, not the network.
    pub async fn get_company(&self, id: u64) -> Result<Company, ApiError> {
        let request = ApiRequest::new("crm.company.get").with_param("id", id);
        let payload = self.call(&request).await?;
        let record = payload
            .get("result")
            .cloned()
            .ok_or_else(|| ApiError::Protocol("missing result member".to_string()))?;
        serde_json::from_value(record)
            .map_err(|err| ApiError::Protocol(format!("company decode: {}", err)))
    }

    /// Product rows for one invoice.
    pub async fn get_invoice_product_rows(
        &self,
        invoice_id: u64,
    ) -> Result<Vec<LineItem>, ApiError> {
        let request = ApiRequest::new("crm.invoice.productrows.get").with_param("id", invoice_id);
        let payload = self.call(&request).await?;
        let rows = payload
            .get("result")
            .and_then(|result| result.as_array())
            .cloned()
            .unwrap_or_default();
        decode_rows(rows)
    }

    /// Product rows for many invoices via the multiplexed batch endpoint.
    ///
    /// Successful invoices come back in request order; failed ones land in
    /// the outcome's failure list with their invoice id as key. Callers
    /// decide whether a non-empty failure list is fatal.
    pub async fn product_rows_for_invoices(
        &self,
        invoice_ids: &[u64],
    ) -> Result<BatchOutcome<Vec<LineItem>>, ApiError> {
        let requests: Vec<(String, ApiRequest)> = invoice_ids
            .iter()
            .map(|id| {
                (
                    id.to_string(),
                    ApiRequest::new("crm.invoice.productrows.get").with_param("id", *id),
                )
            })
            .collect();

        let raw = self.fetch_batch(&requests).await?;
        let mut outcome = BatchOutcome {
            successes: Vec::with_capacity(raw.successes.len()),
            failures: raw.failures,
        };
        for (key, value) in raw.successes {
            let rows = match value {
                Value::Array(rows) => rows,
                _ => {
                    outcome.failures.push(BatchFailure {
                        key,
                        message: "expected an array of product rows".to_string(),
                    });
                    continue;
                }
            };
            match decode_rows(rows) {
                Ok(items) => outcome.successes.push((key, items)),
                Err(err) => outcome.failures.push(BatchFailure {
                    key,
                    message: err.to_string(),
                }),
            }
        }
        Ok(outcome)
    }

    /// Drop cached responses; call between independent report runs.
    pub async fn clear_cache(&self) {
        self.cache.clear().await;
    }

    pub async fn stats(&self) -> ClientStats {
        ClientStats {
            total_requests: self.requests.load(Ordering::Relaxed),
            successes: self.successes.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            cache: self.cache.stats().await,
        }
    }

    /// Release the pooled connection resources. Dropping the client has the
    /// same effect on every exit path; this just makes the boundary explicit.
    pub fn close(self) {
        debug!("Closing API client");
    }
}

fn decode_rows(rows: Vec<Value>) -> Result<Vec<LineItem>, ApiError> {
    rows.into_iter()
        .map(|row| {
            serde_json::from_value(row)
                .map_err(|err| ApiError::Protocol(format!("product row decode: {}", err)))
        })
        .collect()
}
