//! Platform storage interfaces implemented by the host application.
//!
//! The root identifier is replicated across stores with different survival
//! characteristics. Hosts provide them through these foreign traits:
//!
//! - [`SecureItemStore`] — a credential store keyed by service and account
//! - [`AtomicBlobStore`] — a shared blob store with atomic replace semantics
//!
//! # Platform Implementations
//!
//! ## iOS (Swift)
//! - `SecureItemStore`: Keychain Services with a shared access group, so the
//!   item outlives the app that created it
//! - `AtomicBlobStore`: App Group container, or a named pasteboard
//!
//! ## Android (Kotlin)
//! - `SecureItemStore`: `AccountManager` or Block Store
//! - `AtomicBlobStore`: shared external storage
//!
//! ## Desktop and tests
//! - [`FsBlobStore`] — filesystem directory with write-to-temp-then-rename
//! - [`memory`] — in-memory stores with fault injection

mod fs;
pub mod memory;

pub use fs::FsBlobStore;
pub use memory::{MemoryBlobStore, MemorySecureItemStore};

use crate::storage::BackendResult;

/// High-durability credential store, such as a keychain.
///
/// Items are addressed by `(service, account)`. A missing item is reported as
/// `Ok(None)`; errors are reserved for denied access and store failures.
#[uniffi::export(with_foreign)]
pub trait SecureItemStore: Send + Sync {
    /// Reads the item for `(service, account)`, if present.
    ///
    /// # Errors
    ///
    /// Returns an error if the store refuses or fails the read.
    fn read_item(&self, service: String, account: String) -> BackendResult<Option<Vec<u8>>>;

    /// Creates or replaces the item for `(service, account)`.
    ///
    /// # Errors
    ///
    /// Returns an error if the store refuses or fails the write.
    fn write_item(
        &self,
        service: String,
        account: String,
        bytes: Vec<u8>,
    ) -> BackendResult<()>;
}

/// Shared blob storage for small binary files.
///
/// Writes MUST be atomic: a reader sees either the old content or the new
/// content, never a partial write.
#[uniffi::export(with_foreign)]
pub trait AtomicBlobStore: Send + Sync {
    /// Reads the blob at `path`, if present.
    ///
    /// # Errors
    ///
    /// Returns an error if the read fails.
    fn read(&self, path: String) -> BackendResult<Option<Vec<u8>>>;

    /// Writes bytes atomically to `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    fn write_atomic(&self, path: String, bytes: Vec<u8>) -> BackendResult<()>;
}
