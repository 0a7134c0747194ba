//! Inference error types.
//!
//! Provider failures are surfaced to the caller as a failed turn. Nothing in
//! this crate retries them; each variant carries enough context for the
//! caller to log or map it.

use thiserror::Error;

/// Errors that can occur while talking to the language model provider.
#[derive(Debug, Error)]
pub enum InferenceError {
    /// TCP/HTTP connection to the provider failed.
    #[error("connection failed to {endpoint}: {reason}")]
    ConnectionFailed { endpoint: String, reason: String },

    /// The provider did not respond within the configured timeout.
    #[error("inference timeout after {duration_secs}s")]
    Timeout { duration_secs: u64 },

    /// The provider rejected the credential (HTTP 401/403).
    #[error("provider rejected credentials (HTTP {status}): {body}")]
    Unauthorized { status: u16, body: String },

    /// The provider is rate limiting this client (HTTP 429).
    #[error("rate limited by provider: {body}")]
    RateLimited {
        retry_after_secs: Option<u64>,
        body: String,
    },

    /// Any other non-2xx response.
    #[error("HTTP {status}: {body}")]
    HttpError { status: u16, body: String },

    /// Response body or SSE stream could not be read or parsed.
    #[error("stream error: {reason}")]
    StreamError { reason: String },

    /// A tool call in the response had an empty name or non-JSON arguments.
    #[error("tool call parse error: {reason}")]
    ToolCallParseError { raw_response: String, reason: String },
}

impl InferenceError {
    /// Build the error for a non-2xx provider response.
    pub fn from_status(status: u16, retry_after_secs: Option<u64>, body: String) -> Self {
        match status {
            401 | 403 => InferenceError::Unauthorized { status, body },
            429 => InferenceError::RateLimited {
                retry_after_secs,
                body,
            },
            _ => InferenceError::HttpError { status, body },
        }
    }

    /// Whether the failure is on the credential side rather than the provider.
    pub fn is_auth_error(&self) -> bool {
        matches!(self, InferenceError::Unauthorized { .. })
    }

    /// Whether the provider asked us to slow down.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, InferenceError::RateLimited { .. })
    }

    /// Extract the error body text, if the provider sent one.
    pub fn error_body(&self) -> Option<&str> {
        match self {
            InferenceError::HttpError { body, .. }
            | InferenceError::Unauthorized { body, .. }
            | InferenceError::RateLimited { body, .. } => Some(body),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_status_maps_auth_errors() {
        let err = InferenceError::from_status(401, None, "invalid api key".into());
        assert!(err.is_auth_error());
        let err = InferenceError::from_status(403, None, "forbidden".into());
        assert!(err.is_auth_error());
    }

    #[test]
    fn test_from_status_maps_rate_limit() {
        let err = InferenceError::from_status(429, Some(20), "slow down".into());
        assert!(err.is_rate_limited());
        assert!(matches!(
            err,
            InferenceError::RateLimited {
                retry_after_secs: Some(20),
                ..
            }
        ));
    }

    #[test]
    fn test_from_status_other_is_http_error() {
        let err = InferenceError::from_status(503, None, "unavailable".into());
        assert!(matches!(err, InferenceError::HttpError { status: 503, .. }));
        assert!(!err.is_auth_error());
        assert!(!err.is_rate_limited());
    }

    #[test]
    fn test_error_body() {
        let err = InferenceError::HttpError {
            status: 500,
            body: "test body".to_string(),
        };
        assert_eq!(err.error_body(), Some("test body"));
        let err = InferenceError::Timeout { duration_secs: 5 };
        assert!(err.error_body().is_none());
    }
}
