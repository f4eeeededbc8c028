//! Typed errors for the API access layer.
//!
//! Flat tagged variants rather than a class hierarchy: each error carries
//! enough to drive the retry decision (kind + optional HTTP status) and a
//! message safe to log. Error text never includes the webhook endpoint,
//! which embeds an access token.

use thiserror::Error;

/// Coarse classification used for retry decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Network,
    Timeout,
    RateLimited,
    Server,
    Authentication,
    NotFound,
    BadRequest,
    Protocol,
    RetryExhausted,
}

/// Errors surfaced by the API access layer.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Connection refused, DNS failure, socket-level trouble.
    #[error("Network error: {0}")]
    Network(String),

    /// The attempt exceeded the configured per-request timeout.
    #[error("Request timed out: {0}")]
    Timeout(String),

    /// HTTP 429; `retry_after` holds the server's Retry-After hint in seconds.
    #[error("Rate limited by server (HTTP {status})")]
    RateLimited { status: u16, retry_after: Option<u64> },

    /// HTTP 5xx.
    #[error("Server error (HTTP {status}): {message}")]
    Server { status: u16, message: String },

    /// HTTP 401/403 - retrying cannot fix bad credentials.
    #[error("Authentication rejected (HTTP {status})")]
    Authentication { status: u16 },

    /// HTTP 404.
    #[error("Not found: {method}")]
    NotFound { method: String },

    /// HTTP 400 or any other 4xx - the request shape is wrong.
    #[error("Bad request (HTTP {status}): {message}")]
    BadRequest { status: u16, message: String },

    /// Successful-looking response with a body that is not valid JSON.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// A retryable error survived every attempt.
    #[error("Giving up after {attempts} attempts: {source}")]
    RetryExhausted {
        attempts: u32,
        #[source]
        source: Box<ApiError>,
    },
}

impl ApiError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ApiError::Network(_) => ErrorKind::Network,
            ApiError::Timeout(_) => ErrorKind::Timeout,
            ApiError::RateLimited { .. } => ErrorKind::RateLimited,
            ApiError::Server { .. } => ErrorKind::Server,
            ApiError::Authentication { .. } => ErrorKind::Authentication,
            ApiError::NotFound { .. } => ErrorKind::NotFound,
            ApiError::BadRequest { .. } => ErrorKind::BadRequest,
            ApiError::Protocol(_) => ErrorKind::Protocol,
            ApiError::RetryExhausted { .. } => ErrorKind::RetryExhausted,
        }
    }

    /// Upstream HTTP status, when this error came from one.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            ApiError::RateLimited { status, .. }
            | ApiError::Server { status, .. }
            | ApiError::Authentication { status }
            | ApiError::BadRequest { status, .. } => Some(*status),
            ApiError::NotFound { .. } => Some(404),
            ApiError::RetryExhausted { source, .. } => source.status_code(),
            _ => None,
        }
    }

    /// Map a non-success HTTP status onto the taxonomy.
    pub fn from_status(
        status: u16,
        method: &str,
        message: String,
        retry_after: Option<u64>,
    ) -> Self {
        match status {
            429 => ApiError::RateLimited {
                status,
                retry_after,
            },
            401 | 403 => ApiError::Authentication { status },
            404 => ApiError::NotFound {
                method: method.to_string(),
            },
            400..=499 => ApiError::BadRequest { status, message },
            _ => ApiError::Server { status, message },
        }
    }

    /// Classify a transport-level reqwest failure.
    ///
    /// The URL is stripped from the error before rendering so the webhook
    /// token cannot leak through error text.
    pub fn from_reqwest(err: reqwest::Error) -> Self {
        let is_timeout = err.is_timeout();
        let is_decode = err.is_decode();
        let message = err.without_url().to_string();
        if is_timeout {
            ApiError::Timeout(message)
        } else if is_decode {
            ApiError::Protocol(message)
        } else {
            ApiError::Network(message)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let err = ApiError::from_status(429, "crm.invoice.list", String::new(), Some(7));
        assert_eq!(err.kind(), ErrorKind::RateLimited);
        assert_eq!(err.status_code(), Some(429));

        assert_eq!(
            ApiError::from_status(401, "m", String::new(), None).kind(),
            ErrorKind::Authentication
        );
        assert_eq!(
            ApiError::from_status(403, "m", String::new(), None).kind(),
            ErrorKind::Authentication
        );
        assert_eq!(
            ApiError::from_status(404, "m", String::new(), None).kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            ApiError::from_status(400, "m", String::new(), None).kind(),
            ErrorKind::BadRequest
        );
        assert_eq!(
            ApiError::from_status(418, "m", String::new(), None).kind(),
            ErrorKind::BadRequest
        );
        for status in [500u16, 502, 503, 504] {
            assert_eq!(
                ApiError::from_status(status, "m", String::new(), None).kind(),
                ErrorKind::Server
            );
        }
    }

    #[test]
    fn test_exhausted_carries_inner_status() {
        let err = ApiError::RetryExhausted {
            attempts: 3,
            source: Box::new(ApiError::Server {
                status: 503,
                message: "unavailable".to_string(),
            }),
        };
        assert_eq!(err.status_code(), Some(503));
        assert!(err.to_string().contains("3 attempts"));
    }
}
