//! Error types for queue operations.
//!
//! Remote failures are classified from the HTTP status the hosted service
//! returns so that callers can tell a retryable outage (503) apart from a
//! request that will never succeed as written (400, 401, 405, ...).

use chrono::Duration;
use thiserror::Error;

/// Comprehensive error type for all queue operations
#[derive(Debug, Error)]
pub enum QueueError {
    /// 400: the JSON body could not be parsed or has wrong field types.
    #[error("Bad request: invalid JSON (can't be parsed or has wrong types): {message}")]
    MalformedRequest { message: String },

    /// 401: the OAuth token is missing or invalid.
    #[error("Unauthorized: the OAuth token is either not provided or invalid")]
    Unauthorized,

    /// 404: the queue, message or project does not exist.
    #[error("Not found: {resource}")]
    NotFound { resource: String },

    /// 405: the endpoint does not support the HTTP method that was sent.
    #[error("Method {method} not allowed for {resource}")]
    MethodNotAllowed { method: String, resource: String },

    /// 500: the service rejected the request because required fields are missing.
    #[error("Not acceptable: required fields are missing: {message}")]
    RequiredFieldMissing { message: String },

    /// 503: the service is temporarily unavailable.
    #[error("Service unavailable; retry with exponential backoff")]
    ServiceUnavailable,

    /// Any other non-success status.
    #[error("Unknown error from queue service (status {status}): {message}")]
    UnknownRemoteError { status: u16, message: String },

    #[error("{operation}() is not supported by this adapter; use {alternative}() instead")]
    UnsupportedOperation {
        operation: String,
        alternative: String,
    },

    #[error("Connection failed: {message}")]
    ConnectionFailed { message: String },

    #[error("Operation timed out after {duration:?}")]
    Timeout { duration: Duration },

    #[error("Unexpected response from queue service: {message}")]
    InvalidResponse { message: String },

    /// The service accepted a send but its reply carried no message id.
    ///
    /// The message is already on the queue; sending it again creates a
    /// duplicate.
    #[error("Message was accepted by queue {queue} but no id was returned")]
    EnqueuedWithoutId { queue: String },

    #[error("Serialization failed: {0}")]
    SerializationError(#[from] SerializationError),

    #[error("Configuration error: {0}")]
    ConfigurationError(#[from] ConfigurationError),

    #[error("Validation error: {0}")]
    ValidationError(#[from] ValidationError),
}

impl QueueError {
    /// Classify a non-success HTTP status returned by the queue service.
    ///
    /// `resource` names what was being addressed (used for 404/405) and
    /// `body` is the raw response text, kept for diagnostics.
    pub fn from_status(status: u16, method: &str, resource: &str, body: &str) -> Self {
        match status {
            400 => Self::MalformedRequest {
                message: body.to_string(),
            },
            401 => Self::Unauthorized,
            404 => Self::NotFound {
                resource: resource.to_string(),
            },
            405 => Self::MethodNotAllowed {
                method: method.to_string(),
                resource: resource.to_string(),
            },
            500 => Self::RequiredFieldMissing {
                message: body.to_string(),
            },
            503 => Self::ServiceUnavailable,
            _ => Self::UnknownRemoteError {
                status,
                message: body.to_string(),
            },
        }
    }

    /// Check if error is transient and should be retried
    pub fn is_transient(&self) -> bool {
        match self {
            Self::MalformedRequest { .. } => false,
            Self::Unauthorized => false,
            Self::NotFound { .. } => false,
            Self::MethodNotAllowed { .. } => false,
            Self::RequiredFieldMissing { .. } => false,
            Self::ServiceUnavailable => true,
            Self::UnknownRemoteError { .. } => false,
            Self::UnsupportedOperation { .. } => false,
            Self::ConnectionFailed { .. } => true,
            Self::Timeout { .. } => true,
            Self::InvalidResponse { .. } => false,
            Self::EnqueuedWithoutId { .. } => false,
            Self::SerializationError(_) => false,
            Self::ConfigurationError(_) => false,
            Self::ValidationError(_) => false,
        }
    }

    /// Check if error should be retried
    pub fn should_retry(&self) -> bool {
        self.is_transient()
    }

    /// Get suggested initial delay before the first retry.
    ///
    /// Callers own the backoff policy; this is only the starting point.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::ServiceUnavailable => Some(Duration::seconds(1)),
            Self::Timeout { .. } => Some(Duration::seconds(1)),
            Self::ConnectionFailed { .. } => Some(Duration::seconds(5)),
            _ => None,
        }
    }

    /// HTTP status the error was classified from, if it came from the service.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::MalformedRequest { .. } => Some(400),
            Self::Unauthorized => Some(401),
            Self::NotFound { .. } => Some(404),
            Self::MethodNotAllowed { .. } => Some(405),
            Self::RequiredFieldMissing { .. } => Some(500),
            Self::ServiceUnavailable => Some(503),
            Self::UnknownRemoteError { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Errors during message serialization/deserialization
#[derive(Debug, Error)]
pub enum SerializationError {
    #[error("JSON serialization failed: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Field '{field}' missing from response")]
    MissingField { field: String },
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("Invalid configuration: {message}")]
    Invalid { message: String },

    #[error("Missing required configuration: {key}")]
    Missing { key: String },

    #[error("Configuration parsing failed: {message}")]
    Parsing { message: String },
}

/// Validation errors
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Required field missing: {field}")]
    Required { field: String },

    #[error("Invalid format for {field}: {message}")]
    InvalidFormat { field: String, message: String },

    #[error("Value out of range for {field}: {message}")]
    OutOfRange { field: String, message: String },
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
