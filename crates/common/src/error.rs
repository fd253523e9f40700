//! Common error types and handling for Chatline

use std::time::Duration;

use axum::{
    http::{header::RETRY_AFTER, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

/// Common result type
pub type Result<T> = std::result::Result<T, Error>;

/// Why a piece of user input was refused before reaching the provider.
///
/// Serialized as the `reason` field of an `INPUT_REJECTED` body. Clients
/// should expect `empty` alongside `too_long`, `disallowed_pattern` and
/// `invalid_encoding`; rate limiting uses the separate `rate_limited` reason.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputRejection {
    /// Missing, empty, or whitespace-only message
    Empty,
    TooLong,
    DisallowedPattern,
    InvalidEncoding,
}

impl InputRejection {
    /// Reason code as it appears in error bodies
    pub fn code(&self) -> &'static str {
        match self {
            InputRejection::Empty => "empty",
            InputRejection::TooLong => "too_long",
            InputRejection::DisallowedPattern => "disallowed_pattern",
            InputRejection::InvalidEncoding => "invalid_encoding",
        }
    }

    /// Guidance returned to the caller
    pub fn describe(&self) -> &'static str {
        match self {
            InputRejection::Empty => "Message is required",
            InputRejection::TooLong => "Message exceeds the maximum allowed length",
            InputRejection::DisallowedPattern => "Message contains disallowed content",
            InputRejection::InvalidEncoding => "Message contains invalid characters",
        }
    }
}

impl std::fmt::Display for InputRejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

/// Common error type for the Chatline application
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Unexpected error: {0}")]
    Unexpected(#[from] anyhow::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Input rejected: {}", .0.describe())]
    InputRejected(InputRejection),

    #[error("Rate limit exceeded: retry after {:.1}s", .retry_after.as_secs_f64())]
    RateLimited { retry_after: Duration },

    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Provider timed out: {0}")]
    ProviderTimeout(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Get the appropriate HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::Validation(_) | Error::InputRejected(_) => StatusCode::BAD_REQUEST,
            Error::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            Error::Provider(_) => StatusCode::BAD_GATEWAY,
            Error::ProviderTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            Error::Unexpected(_) | Error::Serialization(_) | Error::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Get the error code for API responses
    pub fn error_code(&self) -> &'static str {
        match self {
            Error::Unexpected(_) => "UNEXPECTED_ERROR",
            Error::Serialization(_) => "SERIALIZATION_ERROR",
            Error::Validation(_) => "VALIDATION_ERROR",
            Error::InputRejected(_) => "INPUT_REJECTED",
            Error::RateLimited { .. } => "RATE_LIMIT_EXCEEDED",
            Error::Provider(_) => "PROVIDER_ERROR",
            Error::ProviderTimeout(_) => "PROVIDER_TIMEOUT",
            Error::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Machine-readable reason for client errors
    pub fn reason(&self) -> Option<&'static str> {
        match self {
            Error::InputRejected(reason) => Some(reason.code()),
            Error::RateLimited { .. } => Some("rate_limited"),
            _ => None,
        }
    }

    /// Whether this error is the server's fault
    pub fn is_server_error(&self) -> bool {
        self.status_code().is_server_error()
    }
}

/// Whole seconds for the `Retry-After` header, never zero
fn retry_after_header(retry_after: Duration) -> HeaderValue {
    let secs = retry_after.as_secs() + u64::from(retry_after.subsec_nanos() > 0);
    HeaderValue::from(secs.max(1))
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_code = self.error_code();

        // Log server-side failures with full context
        if self.is_server_error() {
            tracing::error!(error = %self, code = error_code, "Server error");
        }

        let mut error = json!({
            "code": error_code,
            "message": self.to_string(),
        });
        if let Some(reason) = self.reason() {
            error["reason"] = json!(reason);
        }
        if let Error::RateLimited { retry_after } = &self {
            error["retry_after_seconds"] = json!(retry_after.as_secs_f64());
        }

        let mut response = (status, Json(json!({ "error": error }))).into_response();
        if let Error::RateLimited { retry_after } = self {
            response
                .headers_mut()
                .insert(RETRY_AFTER, retry_after_header(retry_after));
        }
        response
    }
}
