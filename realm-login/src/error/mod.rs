//! HTTP-layer errors
//!
//! Authentication failures are not errors: they end in a redirect. This type
//! covers requests that are rejected before a login attempt starts.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Rejected login request
#[derive(Debug, Error)]
pub enum LoginError {
    /// Malformed request (unknown realm, bad parameters)
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Start URL with a missing or wrong signature
    #[error("{0}")]
    InvalidSignature(String),

    /// Start request without the session's request token
    #[error("{0}")]
    InvalidRequestToken(String),

    /// Unknown client or resource
    #[error("Not found: {0}")]
    NotFound(String),

    /// Anything else; details are logged, not returned
    #[error("Server error: {0}")]
    ServerError(String),
}

impl LoginError {
    /// HTTP status of this error
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) | Self::InvalidSignature(_) | Self::InvalidRequestToken(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::ServerError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<crate::oauth2::types::OAuthError> for LoginError {
    fn from(err: crate::oauth2::types::OAuthError) -> Self {
        Self::ServerError(err.to_string())
    }
}

impl From<crate::oauth2::signing::SigningError> for LoginError {
    fn from(err: crate::oauth2::signing::SigningError) -> Self {
        Self::ServerError(err.to_string())
    }
}

impl IntoResponse for LoginError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match self {
            Self::ServerError(detail) => {
                tracing::error!(error = %detail, "Login request failed");
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };

        (status, Json(json!({ "message": message }))).into_response()
    }
}
