//! Error types module
//!
//! Every failure the relay can produce is a variant of [`RelayError`]. Each variant
//! self-describes its HTTP presentation through [`ErrorMetadata`] so the API layer
//! only has to render it.

use std::io;

/// Log level for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Debug level - for expected errors like malformed client input
    Debug,
    /// Warning level - for policy rejections and upstream problems
    Warn,
    /// Error level - for unexpected failures
    Error,
}

/// Metadata for error responses - defines how an error should be presented
pub trait ErrorMetadata {
    /// HTTP status code to return
    fn http_status_code(&self) -> u16;

    /// Machine-readable error code (e.g., "HOST_NOT_ALLOWED")
    fn error_code(&self) -> &'static str;

    /// Client-facing message (may differ from internal error message)
    fn client_message(&self) -> String;

    /// Log level for this error
    fn log_level(&self) -> LogLevel;
}

#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("Missing {0} parameter")]
    MissingParameter(&'static str),

    #[error("Invalid url: {0}")]
    InvalidUrl(String),

    #[error("Invalid mode '{0}', expected one of: raw, normalize, transcode")]
    InvalidMode(String),

    #[error("Unsupported media extension, expected one of: {expected}")]
    UnsupportedExtension { expected: String },

    #[error("Host not allowed: {0}")]
    HostNotAllowed(String),

    #[error("Upstream responded with status {status}")]
    UpstreamFailure { status: u16 },

    #[error("Upstream request failed: {0}")]
    UpstreamUnreachable(String),

    #[error("Streaming failed after headers were sent: {0}")]
    StreamingFailure(String),

    #[error("Failed to buffer upstream body: {0}")]
    BufferFailure(String),

    #[error("Transcoder unavailable: {0}")]
    TranscodeUnavailable(String),

    #[error("Transcode failed: {diagnostics}")]
    TranscodeFailure { diagnostics: String },

    #[error("Transcode exceeded {timeout_secs}s and was terminated")]
    TranscodeTimeout { timeout_secs: u64 },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<io::Error> for RelayError {
    fn from(err: io::Error) -> Self {
        RelayError::Internal(format!("IO error: {}", err))
    }
}

impl From<anyhow::Error> for RelayError {
    fn from(err: anyhow::Error) -> Self {
        RelayError::Internal(err.to_string())
    }
}

/// Static metadata for each variant: (http_status, error_code, log_level).
fn relay_error_static_metadata(err: &RelayError) -> (u16, &'static str, LogLevel) {
    match err {
        RelayError::MissingParameter(_) => (400, "MISSING_PARAMETER", LogLevel::Debug),
        RelayError::InvalidUrl(_) => (400, "INVALID_URL", LogLevel::Debug),
        RelayError::InvalidMode(_) => (400, "INVALID_MODE", LogLevel::Debug),
        RelayError::UnsupportedExtension { .. } => {
            (400, "UNSUPPORTED_EXTENSION", LogLevel::Debug)
        }
        RelayError::HostNotAllowed(_) => (403, "HOST_NOT_ALLOWED", LogLevel::Warn),
        RelayError::UpstreamFailure { .. } => (502, "UPSTREAM_FAILURE", LogLevel::Warn),
        RelayError::UpstreamUnreachable(_) => (502, "UPSTREAM_UNREACHABLE", LogLevel::Warn),
        // Only ever logged; the status line has already gone out.
        RelayError::StreamingFailure(_) => (500, "STREAMING_FAILURE", LogLevel::Error),
        RelayError::BufferFailure(_) => (500, "BUFFER_FAILURE", LogLevel::Error),
        RelayError::TranscodeUnavailable(_) => (500, "TRANSCODE_UNAVAILABLE", LogLevel::Error),
        RelayError::TranscodeFailure { .. } => (500, "TRANSCODE_FAILURE", LogLevel::Error),
        RelayError::TranscodeTimeout { .. } => (500, "TRANSCODE_TIMEOUT", LogLevel::Error),
        RelayError::Internal(_) => (500, "INTERNAL_ERROR", LogLevel::Error),
    }
}

impl RelayError {
    /// Get the error type name for logging
    pub fn error_type(&self) -> &'static str {
        match self {
            RelayError::MissingParameter(_) => "MissingParameter",
            RelayError::InvalidUrl(_) => "InvalidURL",
            RelayError::InvalidMode(_) => "InvalidMode",
            RelayError::UnsupportedExtension { .. } => "UnsupportedExtension",
            RelayError::HostNotAllowed(_) => "HostNotAllowed",
            RelayError::UpstreamFailure { .. } => "UpstreamFailure",
            RelayError::UpstreamUnreachable(_) => "UpstreamUnreachable",
            RelayError::StreamingFailure(_) => "StreamingFailure",
            RelayError::BufferFailure(_) => "BufferFailure",
            RelayError::TranscodeUnavailable(_) => "TranscodeUnavailable",
            RelayError::TranscodeFailure { .. } => "TranscodeFailure",
            RelayError::TranscodeTimeout { .. } => "TranscodeTimeout",
            RelayError::Internal(_) => "Internal",
        }
    }
}

impl ErrorMetadata for RelayError {
    fn http_status_code(&self) -> u16 {
        relay_error_static_metadata(self).0
    }

    fn error_code(&self) -> &'static str {
        relay_error_static_metadata(self).1
    }

    fn log_level(&self) -> LogLevel {
        relay_error_static_metadata(self).2
    }

    fn client_message(&self) -> String {
        match self {
            RelayError::MissingParameter(name) => format!("Missing {} parameter", name),
            RelayError::InvalidUrl(_) => "Invalid url".to_string(),
            RelayError::HostNotAllowed(_) => "Host not allowed".to_string(),
            RelayError::Internal(_) => "Internal server error".to_string(),
            other => other.to_string(),
        }
    }
}
