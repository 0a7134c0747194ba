//! Agent Core error types.

use thiserror::Error;

use crate::inference::InferenceError;

/// Errors that end a turn or a thread-store operation.
///
/// Tool failures never appear here: the tool router turns them into
/// tool-result messages and the loop carries on.
#[derive(Debug, Error)]
pub enum AgentError {
    /// The model provider failed; the turn is not retried.
    #[error(transparent)]
    Inference(#[from] InferenceError),

    /// Database operation failed.
    #[error("database error: {reason}")]
    DatabaseError { reason: String },

    /// Thread not found.
    #[error("thread not found: '{thread_id}'")]
    ThreadNotFound { thread_id: String },

    /// The turn request itself is unusable (e.g. no user message).
    #[error("invalid turn request: {reason}")]
    InvalidRequest { reason: String },

    /// Runtime could not be assembled from configuration.
    #[error("runtime setup failed: {reason}")]
    Setup { reason: String },

    /// Serialization error.
    #[error("serialization error: {reason}")]
    SerializationError { reason: String },
}

impl From<rusqlite::Error> for AgentError {
    fn from(e: rusqlite::Error) -> Self {
        AgentError::DatabaseError {
            reason: e.to_string(),
        }
    }
}

impl From<serde_json::Error> for AgentError {
    fn from(e: serde_json::Error) -> Self {
        AgentError::SerializationError {
            reason: e.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inference_error_is_transparent() {
        let err: AgentError = InferenceError::Timeout { duration_secs: 60 }.into();
        assert!(matches!(err, AgentError::Inference(_)));
        assert_eq!(
            err.to_string(),
            InferenceError::Timeout { duration_secs: 60 }.to_string()
        );
    }

    #[test]
    fn test_json_error_maps_to_serialization() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: AgentError = json_err.into();
        assert!(matches!(err, AgentError::SerializationError { .. }));
    }
}
