//! Error types for the server.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Server error type.
///
/// `Display` is the exact message sent to the client.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Required configuration is missing.
    #[error("{0}")]
    Config(String),

    /// Bad request, including rejected login grants.
    #[error("{0}")]
    BadRequest(String),

    /// No usable session or a rejected refresh grant.
    #[error("{0}")]
    Unauthorized(String),

    /// The resource server could not be reached.
    #[error("{0}")]
    Upstream(String),

    /// Internal server error.
    #[error("{0}")]
    Internal(String),
}

impl ServerError {
    pub fn status(&self) -> StatusCode {
        match self {
            ServerError::Config(_) | ServerError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ServerError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ServerError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ServerError::Upstream(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

/// Result type for server operations.
pub type Result<T> = std::result::Result<T, ServerError>;

/// Error response body.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Human-readable error message.
    pub error: String,
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = self.to_string();

        if status.is_server_error() {
            tracing::error!(status = %status, error = %message, "Server error");
        } else {
            tracing::warn!(status = %status, error = %message, "Client error");
        }

        (status, Json(ErrorResponse { error: message })).into_response()
    }
}
