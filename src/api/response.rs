//! Response wrapper for one transport attempt.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use serde_json::Value;

/// Parsed response from a single successful HTTP attempt.
/// Immutable once constructed.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    payload: Value,
    status: StatusCode,
    headers: HashMap<String, String>,
    received_at: DateTime<Utc>,
}

impl ApiResponse {
    pub fn new(payload: Value, status: StatusCode, headers: HashMap<String, String>) -> Self {
        let headers = headers
            .into_iter()
            .map(|(name, value)| (name.to_ascii_lowercase(), value))
            .collect();
        Self {
            payload,
            status,
            headers,
            received_at: Utc::now(),
        }
    }

    pub fn payload(&self) -> &Value {
        &self.payload
    }

    pub fn into_payload(self) -> Value {
        self.payload
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Header lookup with case-insensitive names.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(|value| value.as_str())
    }

    pub fn received_at(&self) -> DateTime<Utc> {
        self.received_at
    }

    /// The `result` member of the payload, when present.
    pub fn result(&self) -> Option<&Value> {
        self.payload.get("result")
    }
}
