//! Error rendering for the control surface

use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use share_storage::BucketError;

/// Control surface error, rendered as a plain HTML page
#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    message: &'static str,
}

impl AppError {
    /// Create a new application error
    #[must_use]
    pub const fn new(status: StatusCode, message: &'static str) -> Self {
        Self { status, message }
    }

    /// Request is missing the `url` form field
    #[must_use]
    pub const fn missing_url() -> Self {
        Self::new(StatusCode::BAD_REQUEST, "Missing url")
    }

    /// Request names an object outside the published prefix
    #[must_use]
    pub const fn unmanaged_key() -> Self {
        Self::new(StatusCode::BAD_REQUEST, "Not a published object")
    }

    /// HTTP status of this error
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.status
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self.status.as_u16() {
            400..=499 => tracing::warn!("Client error: {} - {}", self.status, self.message),
            500..=599 => tracing::error!("Server error: {} - {}", self.status, self.message),
            _ => {}
        }

        let body = format!(
            "<!doctype html><html><head><title>{status}</title></head>\
             <body><h1>{status}</h1><p>{message}</p><a href=\"/\">Back</a></body></html>",
            status = self.status,
            message = self.message,
        );
        (self.status, Html(body)).into_response()
    }
}

/// Convert bucket errors to application errors
impl From<BucketError> for AppError {
    fn from(err: BucketError) -> Self {
        match &err {
            BucketError::UpstreamError(msg) => {
                tracing::error!("Storage upstream error: {msg}");
                Self::new(StatusCode::BAD_GATEWAY, "Storage service unavailable")
            }
            BucketError::InvalidInput(msg) => {
                tracing::warn!("Invalid input: {msg}");
                Self::new(StatusCode::BAD_REQUEST, "Invalid input provided")
            }
            _ => {
                tracing::error!("Storage error: {err}");
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
        }
    }
}
