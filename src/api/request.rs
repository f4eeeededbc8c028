//! Request value type and signature-based identity.

use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

/// HTTP verb for a method family. List/filter operations always use POST
/// with a JSON body; GET is reserved for simple scalar-parameter lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpVerb {
    Get,
    Post,
}

/// Immutable description of one logical API call.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    method: String,
    params: Map<String, Value>,
    verb: HttpVerb,
}

impl ApiRequest {
    /// A POST request for the given remote method.
    pub fn new(method: &str) -> Self {
        Self {
            method: method.to_string(),
            params: Map::new(),
            verb: HttpVerb::Post,
        }
    }

    /// A GET request for the given remote method.
    pub fn get(method: &str) -> Self {
        Self {
            verb: HttpVerb::Get,
            ..Self::new(method)
        }
    }

    pub fn with_param(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.params.insert(key.to_string(), value.into());
        self
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn params(&self) -> &Map<String, Value> {
        &self.params
    }

    pub fn verb(&self) -> HttpVerb {
        self.verb
    }

    /// Method family used to bucket cache statistics, e.g. `crm.invoice`.
    pub fn category(&self) -> String {
        self.method
            .split('.')
            .take(2)
            .collect::<Vec<_>>()
            .join(".")
    }

    /// Deterministic identity of `(method, parameters)`.
    ///
    /// Semantically identical requests issued from different call sites
    /// collapse onto the same signature, which is what makes cache
    /// deduplication work.
    pub fn signature(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.method.as_bytes());
        hasher.update([0u8]);
        hasher.update(canonical_json(&Value::Object(self.params.clone())).as_bytes());
        hex::encode(hasher.finalize())
    }
}

/// Render JSON with object keys sorted, so parameter maps built in any
/// insertion order serialize identically.
pub fn canonical_json(value: &Value) -> String {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let fields: Vec<String> = keys
                .into_iter()
                .map(|key| {
                    format!(
                        "{}:{}",
                        Value::String(key.clone()),
                        canonical_json(&map[key.as_str()])
                    )
                })
                .collect();
            format!("{{{}}}", fields.join(","))
        }
        Value::Array(items) => {
            let rendered: Vec<String> = items.iter().map(canonical_json).collect();
            format!("[{}]", rendered.join(","))
        }
        other => other.to_string(),
    }
}
