//! Error types for root identifier backends.

use thiserror::Error;

/// Result type for backend operations.
pub type BackendResult<T> = Result<T, BackendError>;

/// Errors raised by a single persistence backend.
///
/// A missing value is not an error: backends report it as `Ok(None)`. The
/// variants below let the root manager tell a denied or broken store apart
/// from one that simply holds nothing yet.
#[derive(Debug, Error, uniffi::Error)]
pub enum BackendError {
    /// The platform refused access to the store (entitlements, locked device).
    #[error("access denied: {0}")]
    AccessDenied(String),

    /// The stored bytes could not be decoded into a valid root record.
    #[error("corrupt data: {0}")]
    CorruptData(String),

    /// Underlying I/O failure.
    #[error("io error: {0}")]
    Io(String),

    /// The store is temporarily or permanently unavailable.
    #[error("backend unavailable: {0}")]
    Unavailable(String),

    /// The backend did not answer within the configured bound.
    #[error("backend timed out after {millis}ms")]
    Timeout {
        /// Elapsed bound in milliseconds.
        millis: u64,
    },

    /// Unexpected `UniFFI` callback error.
    #[error("unexpected uniffi callback error: {0}")]
    UnexpectedUniFFICallbackError(String),
}

impl From<uniffi::UnexpectedUniFFICallbackError> for BackendError {
    fn from(error: uniffi::UnexpectedUniFFICallbackError) -> Self {
        Self::UnexpectedUniFFICallbackError(error.reason)
    }
}

impl From<std::io::Error> for BackendError {
    fn from(error: std::io::Error) -> Self {
        match error.kind() {
            std::io::ErrorKind::PermissionDenied => Self::AccessDenied(error.to_string()),
            _ => Self::Io(error.to_string()),
        }
    }
}
