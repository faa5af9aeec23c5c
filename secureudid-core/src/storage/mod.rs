//! Redundant persistence of the root identifier.
//!
//! Each backend exposes the same capability pair, `read` and `write` of a
//! [`RootRecord`], over one platform store. The root manager consults them in
//! registration order and never special-cases a particular store.

mod backends;
pub mod error;
pub mod lock;
pub mod record;

use std::fmt;

pub use backends::{BlobBackend, KeychainBackend};
pub use error::{BackendError, BackendResult};
pub use lock::{location_lock, StorageLock, StorageLockGuard};
pub use record::RootRecord;

/// Stable name of a backend, used in logs and resolution reports.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BackendId(String);

impl BackendId {
    /// Creates a backend id.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Returns the name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BackendId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One independent persistence medium for the root identifier.
///
/// A missing record is `Ok(None)`. Denied access, corrupt bytes and I/O
/// failures are distinct [`BackendError`] variants; the root manager treats
/// any of them as "absent" for that backend and keeps going with the others.
pub trait RootBackend: Send + Sync {
    /// Name of this backend.
    fn id(&self) -> BackendId;

    /// Where this backend keeps its record, e.g. `keychain:<service>/<account>`.
    ///
    /// Managers whose backends share a location also share a resolution lock,
    /// so two instances over the same stores never create roots concurrently.
    fn location(&self) -> String;

    /// Reads the stored record.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read or holds corrupt data.
    fn read(&self) -> BackendResult<Option<RootRecord>>;

    /// Replaces the stored record.
    ///
    /// # Errors
    ///
    /// Returns an error if the store rejects or fails the write.
    fn write(&self, record: &RootRecord) -> BackendResult<()>;
}
