//! OAuth-style error responses
//!
//! Every rejection is rendered as `{error, error_description}`. The
//! description is generic; detailed reasons stay in logs and security
//! events.

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::domain::{DomainError, SecurityError};

/// Error body returned to clients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiErrorResponse {
    pub error: String,
    pub error_description: String,
}

/// API error with status code
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub response: ApiErrorResponse,
    pub retry_after_secs: Option<u64>,
}

impl ApiError {
    pub fn new(status: StatusCode, error: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            status,
            response: ApiErrorResponse {
                error: error.into(),
                error_description: description.into(),
            },
            retry_after_secs: None,
        }
    }

    pub fn with_retry_after(mut self, secs: u64) -> Self {
        self.retry_after_secs = Some(secs);
        self
    }

    pub fn bad_request(description: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "invalid_request", description)
    }

    /// Generic credential rejection
    pub fn invalid_token() -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "invalid_token", "Invalid credentials")
    }

    pub fn forbidden(description: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, "access_denied", description)
    }

    pub fn rate_limited(description: impl Into<String>, retry_after_secs: u64) -> Self {
        Self::new(StatusCode::TOO_MANY_REQUESTS, "rate_limit_exceeded", description)
            .with_retry_after(retry_after_secs)
    }

    pub fn internal() -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "server_error",
            "The request could not be processed",
        )
    }

    pub fn unavailable(description: impl Into<String>) -> Self {
        Self::new(StatusCode::SERVICE_UNAVAILABLE, "temporarily_unavailable", description)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut response = (self.status, Json(self.response)).into_response();

        if let Some(secs) = self.retry_after_secs {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(secs));
        }

        response
    }
}

impl From<SecurityError> for ApiError {
    fn from(err: SecurityError) -> Self {
        let status = match &err {
            SecurityError::Format { .. } | SecurityError::ExpiredState => StatusCode::BAD_REQUEST,
            SecurityError::ExpiredCredential | SecurityError::Revoked => StatusCode::UNAUTHORIZED,
            SecurityError::Mismatch { .. } => StatusCode::FORBIDDEN,
            SecurityError::RateLimitExceeded { .. } | SecurityError::Blocked { .. } => {
                StatusCode::TOO_MANY_REQUESTS
            }
            SecurityError::InternalStore { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let api_error = Self::new(status, err.error_code(), err.client_message());

        match err.retry_after_secs() {
            Some(secs) => api_error.with_retry_after(secs),
            None => api_error,
        }
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        match &err {
            DomainError::NotFound { .. } => {
                Self::new(StatusCode::NOT_FOUND, "not_found", "Resource not found")
            }
            DomainError::Validation { message } => Self::bad_request(message),
            DomainError::Conflict { message } => Self::new(StatusCode::CONFLICT, "conflict", message),
            _ => {
                tracing::error!(error = %err, "Internal error while handling request");
                Self::internal()
            }
        }
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}: {}",
            self.response.error, self.response.error_description
        )
    }
}

impl std::error::Error for ApiError {}
