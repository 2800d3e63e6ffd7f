use thiserror::Error;

/// Infrastructure-level errors raised by stores, repositories and hashing
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Not found: {message}")]
    NotFound { message: String },

    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Conflict: {message}")]
    Conflict { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },

    #[error("Storage error: {message}")]
    Storage { message: String },

    #[error("Store error: {message}")]
    Store { message: String },

    #[error("Hashing error: {message}")]
    Hashing { message: String },
}

impl DomainError {
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    pub fn store(message: impl Into<String>) -> Self {
        Self::Store {
            message: message.into(),
        }
    }

    pub fn hashing(message: impl Into<String>) -> Self {
        Self::Hashing {
            message: message.into(),
        }
    }
}

/// Rejections produced by the credential and abuse-prevention core.
///
/// The `Display` output carries the detailed reason and is meant for logs
/// and security events only. Anything returned to a client goes through
/// [`SecurityError::client_message`], which never says which check failed.
#[derive(Debug, Error)]
pub enum SecurityError {
    #[error("Malformed input: {reason}")]
    Format { reason: String },

    #[error("Credential expired")]
    ExpiredCredential,

    #[error("Authorization state expired or unknown")]
    ExpiredState,

    #[error("Credential revoked")]
    Revoked,

    #[error("Mismatch: {reason}")]
    Mismatch { reason: String },

    #[error("Rate limit exceeded, retry after {retry_after_secs}s")]
    RateLimitExceeded { retry_after_secs: u64 },

    #[error("Client blocked, retry after {retry_after_secs}s")]
    Blocked { retry_after_secs: u64 },

    #[error("Internal store error: {message}")]
    InternalStore { message: String },
}

impl SecurityError {
    pub fn format(reason: impl Into<String>) -> Self {
        Self::Format {
            reason: reason.into(),
        }
    }

    pub fn mismatch(reason: impl Into<String>) -> Self {
        Self::Mismatch {
            reason: reason.into(),
        }
    }

    pub fn internal_store(message: impl Into<String>) -> Self {
        Self::InternalStore {
            message: message.into(),
        }
    }

    /// OAuth 2.0 style error code for the `error` field
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Format { .. } | Self::ExpiredState => "invalid_request",
            Self::ExpiredCredential | Self::Revoked => "invalid_token",
            Self::Mismatch { .. } => "access_denied",
            Self::RateLimitExceeded { .. } | Self::Blocked { .. } => "rate_limit_exceeded",
            Self::InternalStore { .. } => "server_error",
        }
    }

    /// Generic, client-safe description
    pub fn client_message(&self) -> &'static str {
        match self {
            Self::Format { .. } => "The request is missing a parameter or is malformed",
            Self::ExpiredState => "Invalid or expired state parameter",
            Self::ExpiredCredential | Self::Revoked => "Invalid credentials",
            Self::Mismatch { .. } => "The request could not be authorized",
            Self::RateLimitExceeded { .. } => "Rate limit exceeded",
            Self::Blocked { .. } => "Client temporarily blocked due to repeated violations",
            Self::InternalStore { .. } => "The request could not be processed",
        }
    }

    /// Seconds a client should wait before retrying, if applicable
    pub fn retry_after_secs(&self) -> Option<u64> {
        match self {
            Self::RateLimitExceeded { retry_after_secs } | Self::Blocked { retry_after_secs } => {
                Some(*retry_after_secs)
            }
            _ => None,
        }
    }
}

impl From<DomainError> for SecurityError {
    fn from(err: DomainError) -> Self {
        Self::InternalStore {
            message: err.to_string(),
        }
    }
}
