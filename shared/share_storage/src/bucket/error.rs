//! Error types for bucket operations

use std::path::PathBuf;

use aws_sdk_s3::error::{DisplayErrorContext, SdkError};
use thiserror::Error;

/// Result type for bucket operations
pub type BucketResult<T> = Result<T, BucketError>;

/// Errors that can occur during bucket operations
#[derive(Error, Debug)]
pub enum BucketError {
    /// The source file could not be read
    #[error("Failed to read '{}' for upload: {source}", path.display())]
    Read {
        /// Path of the file being uploaded
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// S3 service error
    #[error("S3 service error: {0}")]
    S3Error(String),

    /// AWS SDK error (dispatch, timeout, response parsing)
    #[error("AWS SDK error: {0}")]
    AwsError(String),

    /// Upstream service error (5xx from S3)
    #[error("Upstream service error: {0}")]
    UpstreamError(String),

    /// Object already exists in bucket
    #[error("Object already exists: {0}")]
    ObjectExists(String),

    /// Invalid input provided
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl BucketError {
    /// Whether this error came from talking to the object store
    #[must_use]
    pub const fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::S3Error(_) | Self::AwsError(_) | Self::UpstreamError(_)
        )
    }
}

impl<E> From<SdkError<E>> for BucketError
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn from(error: SdkError<E>) -> Self {
        match &error {
            SdkError::ServiceError(service_err) if service_err.raw().status().as_u16() >= 500 => {
                Self::UpstreamError(DisplayErrorContext(&error).to_string())
            }
            SdkError::ServiceError(_) => Self::S3Error(DisplayErrorContext(&error).to_string()),
            _ => Self::AwsError(DisplayErrorContext(&error).to_string()),
        }
    }
}
