//! Error types shared by the router and the inquiry pipeline.

use serde::Serialize;
use thiserror::Error;

use crate::notify::NotifyError;
use crate::verify::VerifyError;

/// Machine-readable code carried in every error body as `errorCode`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    MethodNotAllowed,
    RequestTooLarge,
    RateLimitExceeded,
    InvalidJson,
    ValidationFailed,
    TurnstileFailed,
    TurnstileServiceError,
    NotifyConnectionError,
    NotifyTimeout,
    NotifyFailed,
    ServiceNotConfigured,
    NotFound,
    InternalError,
}

impl ErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::MethodNotAllowed => "METHOD_NOT_ALLOWED",
            ErrorCode::RequestTooLarge => "REQUEST_TOO_LARGE",
            ErrorCode::RateLimitExceeded => "RATE_LIMIT_EXCEEDED",
            ErrorCode::InvalidJson => "INVALID_JSON",
            ErrorCode::ValidationFailed => "VALIDATION_FAILED",
            ErrorCode::TurnstileFailed => "TURNSTILE_FAILED",
            ErrorCode::TurnstileServiceError => "TURNSTILE_SERVICE_ERROR",
            ErrorCode::NotifyConnectionError => "NOTIFY_CONNECTION_ERROR",
            ErrorCode::NotifyTimeout => "NOTIFY_TIMEOUT",
            ErrorCode::NotifyFailed => "NOTIFY_FAILED",
            ErrorCode::ServiceNotConfigured => "SERVICE_NOT_CONFIGURED",
            ErrorCode::NotFound => "NOT_FOUND",
            ErrorCode::InternalError => "INTERNAL_ERROR",
        }
    }

    /// HTTP status for this code
    pub fn status(self) -> u16 {
        match self {
            ErrorCode::MethodNotAllowed => 405,
            ErrorCode::RequestTooLarge => 413,
            ErrorCode::RateLimitExceeded => 429,
            ErrorCode::InvalidJson
            | ErrorCode::ValidationFailed
            | ErrorCode::TurnstileFailed => 400,
            ErrorCode::TurnstileServiceError
            | ErrorCode::NotifyConnectionError
            | ErrorCode::NotifyTimeout
            | ErrorCode::NotifyFailed
            | ErrorCode::ServiceNotConfigured => 503,
            ErrorCode::NotFound => 404,
            ErrorCode::InternalError => 500,
        }
    }
}

/// Every way an inquiry can end without being delivered.
///
/// `Display` is the server-side description and may contain upstream detail;
/// callers only ever see [`InquiryError::public_message`].
#[derive(Error, Debug)]
pub enum InquiryError {
    #[error("method {0} not allowed")]
    MethodNotAllowed(String),

    #[error("request body of {0} bytes exceeds the limit")]
    RequestTooLarge(u64),

    #[error("rate limit exceeded for {0}")]
    RateLimited(String),

    #[error("invalid JSON body: {0}")]
    InvalidJson(String),

    #[error("validation failed: {}", .0.join(", "))]
    Validation(Vec<String>),

    #[error("verification rejected: {}", .0.join(", "))]
    VerificationRejected(Vec<String>),

    #[error(transparent)]
    VerificationService(#[from] VerifyError),

    #[error(transparent)]
    Dispatch(#[from] NotifyError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl InquiryError {
    pub fn code(&self) -> ErrorCode {
        match self {
            InquiryError::MethodNotAllowed(_) => ErrorCode::MethodNotAllowed,
            InquiryError::RequestTooLarge(_) => ErrorCode::RequestTooLarge,
            InquiryError::RateLimited(_) => ErrorCode::RateLimitExceeded,
            InquiryError::InvalidJson(_) => ErrorCode::InvalidJson,
            InquiryError::Validation(_) => ErrorCode::ValidationFailed,
            InquiryError::VerificationRejected(_) => ErrorCode::TurnstileFailed,
            InquiryError::VerificationService(_) => ErrorCode::TurnstileServiceError,
            InquiryError::Dispatch(NotifyError::Timeout(_)) => ErrorCode::NotifyTimeout,
            InquiryError::Dispatch(NotifyError::Connection(_)) => {
                ErrorCode::NotifyConnectionError
            }
            InquiryError::Dispatch(NotifyError::Rejected { .. }) => ErrorCode::NotifyFailed,
            InquiryError::Internal(_) => ErrorCode::InternalError,
        }
    }

    /// Message that is safe to return to the browser.
    pub fn public_message(&self) -> String {
        match self {
            InquiryError::MethodNotAllowed(_) => "Method not allowed".into(),
            InquiryError::RequestTooLarge(_) => "Request too large".into(),
            InquiryError::RateLimited(_) => "Too many requests. Please try again later.".into(),
            InquiryError::InvalidJson(_) => "Invalid request format".into(),
            InquiryError::Validation(errors) => errors.join(", "),
            InquiryError::VerificationRejected(_) => {
                "Security verification failed. Please try again.".into()
            }
            InquiryError::VerificationService(_) => {
                "Verification service temporarily unavailable".into()
            }
            InquiryError::Dispatch(NotifyError::Rejected { .. }) => {
                "Failed to process inquiry. Please try again later.".into()
            }
            InquiryError::Dispatch(_) => {
                "Failed to send inquiry. Please try again or contact us directly.".into()
            }
            InquiryError::Internal(_) => "An unexpected error occurred. Please try again.".into(),
        }
    }
}

/// Configuration could not be read from the worker environment.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{name} must be one of {expected}, got {value:?}")]
    InvalidValue {
        name: &'static str,
        expected: &'static str,
        value: String,
    },

    #[error("{name} must contain at least one origin")]
    EmptyOriginList { name: &'static str },
}
