//! Pagination and batched sub-resource fetching.
//!
//! Both walks drive [`ApiClient::call`], so every page and every chunk gets
//! the same cache/retry/pacing treatment as a single request.

use serde_json::{Map, Value};
use tracing::{debug, warn};

use super::error::ApiError;
use super::request::ApiRequest;
use super::transport::encode_query;
use super::ApiClient;

/// Result of a multi-item fetch where individual items may fail without
/// aborting the whole operation.
#[derive(Debug, Clone)]
pub struct BatchOutcome<T> {
    /// `(key, value)` pairs in request order.
    pub successes: Vec<(String, T)>,
    /// Items the service reported as failed, with their identifying keys.
    pub failures: Vec<BatchFailure>,
}

impl<T> BatchOutcome<T> {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct BatchFailure {
    pub key: String,
    pub message: String,
}

impl ApiClient {
    /// Collect every page of a list method into one ordered Vec.
    ///
    /// Walks `start` offsets; a page shorter than the page size is the
    /// terminal condition. A full page means more data may follow, unless
    /// the service explicitly marks the end with a null `next`. A page-fetch
    /// error aborts the whole walk.
    pub async fn fetch_all(&self, request: ApiRequest) -> Result<Vec<Value>, ApiError> {
        let page_size = self.page_size();
        let mut items = Vec::new();
        let mut start = 0usize;
        loop {
            let page_request = request.clone().with_param("start", start as u64);
            let payload = self.call(&page_request).await?;
            let page = payload
                .get("result")
                .and_then(|result| result.as_array())
                .cloned()
                .unwrap_or_default();
            let count = page.len();
            let end_marker = payload.get("next").is_some_and(Value::is_null);
            items.extend(page);
            debug!(
                "Fetched {} items from {} (start {})",
                count,
                request.method(),
                start
            );
            if count < page_size || end_marker {
                break;
            }
            start += page_size;
        }
        Ok(items)
    }

    /// Issue many sub-requests through the multiplexed batch endpoint.
    ///
    /// Requests are grouped into chunks no larger than the service's batch
    /// limit, one physical call per chunk. Per-item failures inside a chunk
    /// become entries in the failure list. A chunk whose physical call fails
    /// outright falls back to sequential per-item calls, so one bad chunk
    /// cannot sink the whole fetch.
    pub async fn fetch_batch(
        &self,
        requests: &[(String, ApiRequest)],
    ) -> Result<BatchOutcome<Value>, ApiError> {
        let mut outcome = BatchOutcome {
            successes: Vec::with_capacity(requests.len()),
            failures: Vec::new(),
        };
        for chunk in requests.chunks(self.batch_limit().max(1)) {
            let batch_request = build_batch_request(chunk);
            match self.call(&batch_request).await {
                Ok(payload) => collect_chunk(chunk, &payload, &mut outcome),
                Err(err) => {
                    warn!(
                        "Batch call of {} items failed ({}), falling back to sequential fetch",
                        chunk.len(),
                        err
                    );
                    self.fetch_chunk_sequentially(chunk, &mut outcome).await;
                }
            }
        }
        Ok(outcome)
    }

    async fn fetch_chunk_sequentially(
        &self,
        chunk: &[(String, ApiRequest)],
        outcome: &mut BatchOutcome<Value>,
    ) {
        for (key, request) in chunk {
            match self.call(request).await {
                Ok(payload) => {
                    let value = payload.get("result").cloned().unwrap_or(Value::Null);
                    outcome.successes.push((key.clone(), value));
                }
                Err(err) => outcome.failures.push(BatchFailure {
                    key: key.clone(),
                    message: err.to_string(),
                }),
            }
        }
    }
}

/// `{"halt": 0, "cmd": {key: "method?query", ...}}` for one chunk.
fn build_batch_request(chunk: &[(String, ApiRequest)]) -> ApiRequest {
    let mut cmd = Map::new();
    for (key, request) in chunk {
        let query = encode_query(request.params());
        let command = if query.is_empty() {
            request.method().to_string()
        } else {
            format!("{}?{}", request.method(), query)
        };
        cmd.insert(key.clone(), Value::String(command));
    }
    ApiRequest::new("batch")
        .with_param("halt", 0)
        .with_param("cmd", Value::Object(cmd))
}

/// Split one batch payload into per-item successes and failures,
/// preserving the request order of the chunk.
fn collect_chunk(
    chunk: &[(String, ApiRequest)],
    payload: &Value,
    outcome: &mut BatchOutcome<Value>,
) {
    let results = payload.pointer("/result/result");
    let errors = payload.pointer("/result/result_error");
    for (key, _) in chunk {
        if let Some(value) = results.and_then(|r| r.get(key)) {
            outcome.successes.push((key.clone(), value.clone()));
        } else if let Some(err) = errors.and_then(|e| e.get(key)) {
            outcome.failures.push(BatchFailure {
                key: key.clone(),
                message: batch_error_message(err),
            });
        } else {
            outcome.failures.push(BatchFailure {
                key: key.clone(),
                message: "no result returned for batch command".to_string(),
            });
        }
    }
}

fn batch_error_message(err: &Value) -> String {
    err.get("error_description")
        .and_then(|desc| desc.as_str())
        .or_else(|| err.as_str())
        .map(str::to_string)
        .unwrap_or_else(|| err.to_string())
}
