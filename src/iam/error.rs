//! Typed failures from the identity directory.
//!
//! Every call into IAM or STS resolves to a [`DirectoryError`] on failure.
//! The variant tells the caller what kind of failure it was, so it can pick
//! between retrying, skipping the user, or aborting the run.

use thiserror::Error;

/// Failure reported by the identity directory or its transport.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DirectoryError {
    /// The service rejected the call because of request rate.
    #[error("{operation} was throttled: {message}")]
    Throttled { operation: String, message: String },

    /// Network failure, timeout, or an internal service fault.
    #[error("{operation} failed, service unavailable: {message}")]
    Unavailable { operation: String, message: String },

    /// The named user or key does not exist.
    #[error("{operation} found no such entity: {message}")]
    NotFound { operation: String, message: String },

    /// The calling identity lacks permission for the call.
    #[error("{operation} was denied: {message}")]
    PermissionDenied { operation: String, message: String },

    /// The service answered but a required field was missing.
    #[error("{operation} returned a malformed response: {message}")]
    MalformedResponse { operation: String, message: String },

    /// Any other error code returned by the service.
    #[error("{operation} failed ({code}): {message}")]
    Service {
        operation: String,
        code: String,
        message: String,
    },
}

impl DirectoryError {
    /// Build an error from a service error code.
    ///
    /// Codes are the ones IAM and STS put in their error responses, e.g.
    /// `NoSuchEntity` or `Throttling`. A missing code is treated as a generic
    /// service error.
    pub fn from_code(operation: &str, code: Option<&str>, message: impl Into<String>) -> Self {
        let operation = operation.to_string();
        let message = message.into();

        match code {
            Some(
                "Throttling" | "ThrottlingException" | "RequestLimitExceeded" | "TooManyRequests",
            ) => Self::Throttled { operation, message },
            Some("ServiceFailure" | "ServiceUnavailable" | "InternalFailure" | "RequestTimeout") => {
                Self::Unavailable { operation, message }
            }
            Some("NoSuchEntity") => Self::NotFound { operation, message },
            Some(
                "AccessDenied"
                | "AccessDeniedException"
                | "UnauthorizedOperation"
                | "InvalidClientTokenId"
                | "ExpiredToken",
            ) => Self::PermissionDenied { operation, message },
            Some(other) => Self::Service {
                operation,
                code: other.to_string(),
                message,
            },
            None => Self::Service {
                operation,
                code: "Unknown".to_string(),
                message,
            },
        }
    }

    pub fn malformed(operation: &str, message: impl Into<String>) -> Self {
        Self::MalformedResponse {
            operation: operation.to_string(),
            message: message.into(),
        }
    }

    /// Whether a retry has a reasonable chance of succeeding.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Throttled { .. } | Self::Unavailable { .. })
    }

    pub fn is_permission_denied(&self) -> bool {
        matches!(self, Self::PermissionDenied { .. })
    }

    /// Name of the directory operation that failed.
    pub fn operation(&self) -> &str {
        match self {
            Self::Throttled { operation, .. }
            | Self::Unavailable { operation, .. }
            | Self::NotFound { operation, .. }
            | Self::PermissionDenied { operation, .. }
            | Self::MalformedResponse { operation, .. }
            | Self::Service { operation, .. } => operation,
        }
    }
}
