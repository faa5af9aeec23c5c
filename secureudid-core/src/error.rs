use thiserror::Error;

/// Error outputs from `SecureUDID`
#[derive(Debug, Error, uniffi::Error)]
pub enum SecureUdidError {
    /// The domain or salt is empty.
    #[error("invalid_argument: {0}")]
    InvalidArgument(String),
    /// The platform's secure random source failed; no root can be created.
    #[error("entropy_unavailable: {0}")]
    EntropyUnavailable(String),
    /// A freshly created root could not be written to any backend.
    #[error("persistence_unavailable: {0}")]
    PersistenceUnavailable(String),
    /// Every backend failed to read, so the existing root cannot be known.
    #[error("backends_unreadable: {0}")]
    BackendsUnreadable(String),
    /// The resolution lock could not be acquired.
    #[error("lock_unavailable: {0}")]
    LockUnavailable(String),
}
