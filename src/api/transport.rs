//! Single-attempt HTTP transport.
//!
//! One call to [`Transport::send`] is exactly one HTTP request. Retry and
//! pacing live in the layers above; nothing here loops.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Map, Value};
use url::Url;

use super::error::ApiError;
use super::request::{ApiRequest, HttpVerb};
use super::response::ApiResponse;

/// One HTTP attempt against the remote service.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: &ApiRequest) -> Result<ApiResponse, ApiError>;
}

/// reqwest-backed transport bound to one webhook endpoint.
pub struct HttpTransport {
    client: Client,
    base: Url,
}

impl HttpTransport {
    pub fn new(base: Url, timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .gzip(true)
            .build()
            .expect("Failed to create HTTP client");
        Self { client, base }
    }

    /// `{base}/{method}`, tolerating a base with or without a trailing slash.
    fn method_url(&self, method: &str) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push(method);
        }
        url
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: &ApiRequest) -> Result<ApiResponse, ApiError> {
        let url = self.method_url(request.method());
        let builder = match request.verb() {
            // List-style filters must travel as a JSON body; flattening them
            // into query keys silently drops complex filter support upstream.
            HttpVerb::Post => self
                .client
                .post(url)
                .json(&Value::Object(request.params().clone())),
            HttpVerb::Get => self.client.get(url).query(&scalar_pairs(request.params())),
        };

        let response = builder.send().await.map_err(ApiError::from_reqwest)?;
        let status = response.status();
        let headers = header_map(&response);

        if !status.is_success() {
            let retry_after = headers
                .get("retry-after")
                .and_then(|value| value.trim().parse().ok());
            let message = error_description(response).await;
            return Err(ApiError::from_status(
                status.as_u16(),
                request.method(),
                message,
                retry_after,
            ));
        }

        let payload: Value = response
            .json()
            .await
            .map_err(|err| ApiError::Protocol(err.without_url().to_string()))?;
        Ok(ApiResponse::new(payload, status, headers))
    }
}

/// Extract the service's `error_description` when the error body is JSON,
/// otherwise a trimmed snippet of the raw body.
async fn error_description(response: reqwest::Response) -> String {
    let body = response.text().await.unwrap_or_default();
    match serde_json::from_str::<Value>(&body) {
        Ok(parsed) => parsed
            .get("error_description")
            .and_then(|desc| desc.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| snippet(&body)),
        Err(_) => snippet(&body),
    }
}

fn snippet(body: &str) -> String {
    body.chars().take(200).collect::<String>().trim().to_string()
}

fn header_map(response: &reqwest::Response) -> HashMap<String, String> {
    response
        .headers()
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|text| (name.as_str().to_ascii_lowercase(), text.to_string()))
        })
        .collect()
}

fn scalar_pairs(params: &Map<String, Value>) -> Vec<(String, String)> {
    params
        .iter()
        .map(|(key, value)| (key.clone(), scalar_string(value)))
        .collect()
}

fn scalar_string(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

/// Encode a parameter map as a bracketed query string for batch
/// sub-commands, e.g. `filter[>=DATE_INSERT]=2024-01-01&start=0`.
///
/// The batch endpoint multiplexes sub-requests as `method?query` strings,
/// so nested maps and arrays use the bracket convention the service parses.
pub fn encode_query(params: &Map<String, Value>) -> String {
    let mut parts = Vec::new();
    for (key, value) in params {
        push_query(&mut parts, key, value);
    }
    parts.join("&")
}

fn push_query(parts: &mut Vec<String>, prefix: &str, value: &Value) {
    match value {
        Value::Object(map) => {
            for (key, nested) in map {
                push_query(parts, &format!("{}[{}]", prefix, key), nested);
            }
        }
        Value::Array(items) => {
            for (index, nested) in items.iter().enumerate() {
                push_query(parts, &format!("{}[{}]", prefix, index), nested);
            }
        }
        Value::Null => {}
        other => parts.push(format!(
            "{}={}",
            urlencoding::encode(prefix),
            urlencoding::encode(&scalar_string(other))
        )),
    }
}
