//! HTTP error response conversion
//!
//! Handlers return `Result<_, HttpRelayError>`; any `RelayError` converts with `?`
//! and renders as a plain-text body with the variant's status.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use mediarelay_core::{ErrorMetadata, LogLevel, RelayError};

/// Wrapper so the core error type can implement axum's `IntoResponse`.
#[derive(Debug)]
pub struct HttpRelayError(pub RelayError);

impl From<RelayError> for HttpRelayError {
    fn from(err: RelayError) -> Self {
        HttpRelayError(err)
    }
}

impl From<anyhow::Error> for HttpRelayError {
    fn from(err: anyhow::Error) -> Self {
        HttpRelayError(RelayError::Internal(err.to_string()))
    }
}

fn log_error(error: &RelayError) {
    let error_type = error.error_type();
    let error_code = error.error_code();
    match error.log_level() {
        LogLevel::Debug => {
            tracing::debug!(error = %error, error_type, error_code, "Request rejected");
        }
        LogLevel::Warn => {
            tracing::warn!(error = %error, error_type, error_code, "Relay error");
        }
        LogLevel::Error => {
            tracing::error!(error = %error, error_type, error_code, "Relay error");
        }
    }
}

impl IntoResponse for HttpRelayError {
    fn into_response(self) -> Response {
        let error = &self.0;
        let status = StatusCode::from_u16(error.http_status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        log_error(error);

        (status, error.client_message()).into_response()
    }
}
