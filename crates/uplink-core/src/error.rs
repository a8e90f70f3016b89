//! Error types module
//!
//! This module provides the core error types used throughout the Uplink
//! application. All errors are unified under the `AppError` enum which can
//! represent database, storage, validation, and ingestion-protocol errors.

use std::io;

/// Log level for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Debug level - for expected errors like validation failures
    Debug,
    /// Warning level - for recoverable issues like resource limits
    Warn,
    /// Error level - for unexpected failures
    Error,
}

/// Metadata for error responses - defines how an error should be presented.
/// This trait allows errors to self-describe their HTTP response characteristics.
pub trait ErrorMetadata {
    /// HTTP status code to return
    fn http_status_code(&self) -> u16;

    /// Machine-readable error code (e.g., "INVALID_LENGTH")
    fn error_code(&self) -> &'static str;

    /// Whether this error is recoverable (can be retried)
    fn is_recoverable(&self) -> bool;

    /// Suggested action for the client
    fn suggested_action(&self) -> Option<&'static str>;

    /// Client-facing message (may differ from internal error message)
    fn client_message(&self) -> String;

    /// Whether details should be hidden in production
    fn is_sensitive(&self) -> bool;

    /// Log level for this error
    fn log_level(&self) -> LogLevel;
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("File attachments are disabled: {0}")]
    FeatureDisabled(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Unsupported on this deployment: {0}")]
    Unsupported(String),

    #[error("File too large: {0}")]
    PayloadTooLarge(String),

    #[error("Declared length {declared} exceeds remaining {remaining} bytes")]
    InvalidLength { declared: i64, remaining: i64 },

    #[error("Invalid parameter: {0}")]
    InvalidParam(String),

    #[error("Conflicting channel_id values in one request")]
    MultipleChannelIds,

    #[error("Concurrent append detected at offset {expected}")]
    ConflictingAppend { expected: i64 },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Internal error with source")]
    InternalWithSource {
        message: String,
        #[source]
        source: anyhow::Error,
    },
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::InternalWithSource {
            message: err.to_string(),
            source: err,
        }
    }
}

impl From<io::Error> for AppError {
    fn from(err: io::Error) -> Self {
        AppError::Storage(format!("IO error: {}", err))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::InvalidParam(format!("JSON parsing error: {}", err))
    }
}

impl From<uuid::Error> for AppError {
    fn from(err: uuid::Error) -> Self {
        AppError::InvalidParam(format!("UUID parsing error: {}", err))
    }
}

/// Static metadata for each variant: (http_status, error_code, recoverable,
/// suggested_action, sensitive, log_level). Reduces duplication in the
/// ErrorMetadata impl; client_message stays per-variant for dynamic content.
fn app_error_static_metadata(
    err: &AppError,
) -> (
    u16,
    &'static str,
    bool,
    Option<&'static str>,
    bool,
    LogLevel,
) {
    match err {
        AppError::Database(_) => (
            500,
            "DATABASE_ERROR",
            true,
            Some("Retry after a short delay"),
            true,
            LogLevel::Error,
        ),
        AppError::Storage(_) => (
            500,
            "STORAGE_ERROR",
            true,
            Some("Query the upload session offset and retry the append"),
            true,
            LogLevel::Error,
        ),
        AppError::FeatureDisabled(_) => (
            501,
            "FEATURE_DISABLED",
            false,
            Some("File attachments are disabled on this server"),
            false,
            LogLevel::Debug,
        ),
        AppError::PermissionDenied(_) => (
            403,
            "PERMISSION_DENIED",
            false,
            Some("Verify upload permission for the target channel"),
            false,
            LogLevel::Debug,
        ),
        AppError::Unsupported(_) => (
            501,
            "UNSUPPORTED",
            false,
            None,
            false,
            LogLevel::Debug,
        ),
        AppError::PayloadTooLarge(_) => (
            413,
            "PAYLOAD_TOO_LARGE",
            false,
            Some("Reduce file size or create a resumable upload session"),
            false,
            LogLevel::Debug,
        ),
        AppError::InvalidLength { .. } => (
            400,
            "INVALID_LENGTH",
            false,
            Some("Send at most the remaining bytes of the session"),
            false,
            LogLevel::Debug,
        ),
        AppError::InvalidParam(_) => (
            400,
            "INVALID_PARAM",
            false,
            Some("Check request parameters and try again"),
            false,
            LogLevel::Debug,
        ),
        AppError::MultipleChannelIds => (
            400,
            "MULTIPLE_CHANNEL_IDS",
            false,
            Some("Send exactly one channel_id per request"),
            false,
            LogLevel::Debug,
        ),
        AppError::ConflictingAppend { .. } => (
            409,
            "CONFLICTING_APPEND",
            true,
            Some("Re-read the session offset and retry the append"),
            false,
            LogLevel::Warn,
        ),
        AppError::NotFound(_) => (
            404,
            "NOT_FOUND",
            false,
            Some("Verify the resource ID exists"),
            false,
            LogLevel::Debug,
        ),
        AppError::Unauthorized(_) => (
            401,
            "UNAUTHORIZED",
            false,
            Some("Check the authentication token"),
            false,
            LogLevel::Debug,
        ),
        AppError::BadRequest(_) => (
            400,
            "BAD_REQUEST",
            false,
            Some("Check request format and parameters"),
            false,
            LogLevel::Debug,
        ),
        AppError::Internal(_) => (
            500,
            "INTERNAL_ERROR",
            true,
            Some("Retry after a short delay"),
            true,
            LogLevel::Error,
        ),
        AppError::InternalWithSource { .. } => (
            500,
            "INTERNAL_ERROR",
            true,
            Some("Retry after a short delay"),
            true,
            LogLevel::Error,
        ),
    }
}

impl AppError {
    /// Get the error type name for detailed error responses
    pub fn error_type(&self) -> &'static str {
        match self {
            AppError::Database(_) => "Database",
            AppError::Storage(_) => "Storage",
            AppError::FeatureDisabled(_) => "FeatureDisabled",
            AppError::PermissionDenied(_) => "PermissionDenied",
            AppError::Unsupported(_) => "Unsupported",
            AppError::PayloadTooLarge(_) => "PayloadTooLarge",
            AppError::InvalidLength { .. } => "InvalidLength",
            AppError::InvalidParam(_) => "InvalidParam",
            AppError::MultipleChannelIds => "MultipleChannelIds",
            AppError::ConflictingAppend { .. } => "ConflictingAppend",
            AppError::NotFound(_) => "NotFound",
            AppError::Unauthorized(_) => "Unauthorized",
            AppError::BadRequest(_) => "BadRequest",
            AppError::Internal(_) => "Internal",
            AppError::InternalWithSource { .. } => "Internal",
        }
    }

    /// Get detailed error information including the source chain
    pub fn detailed_message(&self) -> String {
        use std::error::Error;

        let mut details = self.to_string();

        let mut source = self.source();
        let mut depth = 0;
        while let Some(err) = source {
            depth += 1;
            if depth > 5 {
                details.push_str("\n  ... (truncated)");
                break;
            }
            details.push_str(&format!("\n  Caused by: {}", err));
            source = err.source();
        }

        details
    }
}

impl ErrorMetadata for AppError {
    fn http_status_code(&self) -> u16 {
        app_error_static_metadata(self).0
    }

    fn error_code(&self) -> &'static str {
        app_error_static_metadata(self).1
    }

    fn is_recoverable(&self) -> bool {
        app_error_static_metadata(self).2
    }

    fn suggested_action(&self) -> Option<&'static str> {
        app_error_static_metadata(self).3
    }

    fn is_sensitive(&self) -> bool {
        app_error_static_metadata(self).4
    }

    fn log_level(&self) -> LogLevel {
        app_error_static_metadata(self).5
    }

    fn client_message(&self) -> String {
        match self {
            AppError::Database(_) => "Failed to access database".to_string(),
            AppError::Storage(_) => "Failed to access storage".to_string(),
            AppError::Internal(_) => "Internal server error".to_string(),
            AppError::InternalWithSource { .. } => "Internal server error".to_string(),
            other => other.to_string(),
        }
    }
}
