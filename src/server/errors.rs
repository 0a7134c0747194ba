//! API error type with OpenAI-style JSON bodies.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

use crate::agent_core::AgentError;

use super::types::{ErrorBody, ErrorResponse};

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("missing or invalid bearer token")]
    Unauthorized,

    #[error("Graph/Model '{0}' not found")]
    ModelNotFound(String),

    #[error("upstream model provider failed: {0}")]
    Upstream(String),

    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::ModelNotFound(_) => StatusCode::NOT_FOUND,
            Self::Upstream(_) => StatusCode::BAD_GATEWAY,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn kind(&self) -> (&'static str, Option<&'static str>) {
        match self {
            Self::BadRequest(_) => ("invalid_request_error", None),
            Self::Unauthorized => ("authentication_error", Some("invalid_api_key")),
            Self::ModelNotFound(_) => ("invalid_request_error", Some("model_not_found")),
            Self::Upstream(_) => ("upstream_error", None),
            Self::Internal(_) => ("server_error", None),
        }
    }

    pub fn body(&self) -> ErrorResponse {
        let (kind, code) = self.kind();
        ErrorResponse {
            error: ErrorBody {
                message: self.to_string(),
                r#type: kind.to_string(),
                code: code.map(str::to_string),
            },
        }
    }
}

impl From<AgentError> for ApiError {
    fn from(e: AgentError) -> Self {
        match e {
            AgentError::Inference(inner) => Self::Upstream(inner.to_string()),
            AgentError::InvalidRequest { reason } => Self::BadRequest(reason),
            other => Self::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), error = %self, "request failed");
        } else {
            tracing::debug!(status = status.as_u16(), error = %self, "request rejected");
        }
        (status, Json(self.body())).into_response()
    }
}
