//! [`RootBackend`] adapters over the platform stores.

use std::sync::Arc;

use super::{BackendId, BackendResult, RootBackend, RootRecord};
use crate::platform::{AtomicBlobStore, SecureItemStore};

/// Backend over a keychain-like [`SecureItemStore`].
///
/// This is the most durable store and is registered first by default.
pub struct KeychainBackend {
    store: Arc<dyn SecureItemStore>,
    service: String,
    account: String,
}

impl KeychainBackend {
    /// Name reported by [`RootBackend::id`].
    pub const ID: &'static str = "keychain";

    /// Stores the root under `(service, account)` in `store`.
    pub fn new(
        store: Arc<dyn SecureItemStore>,
        service: impl Into<String>,
        account: impl Into<String>,
    ) -> Self {
        Self {
            store,
            service: service.into(),
            account: account.into(),
        }
    }
}

impl RootBackend for KeychainBackend {
    fn id(&self) -> BackendId {
        BackendId::new(Self::ID)
    }

    fn location(&self) -> String {
        format!("keychain:{}/{}", self.service, self.account)
    }

    fn read(&self) -> BackendResult<Option<RootRecord>> {
        self.store
            .read_item(self.service.clone(), self.account.clone())?
            .map(|bytes| RootRecord::decode(&bytes))
            .transpose()
    }

    fn write(&self, record: &RootRecord) -> BackendResult<()> {
        let bytes = record.encode()?;
        self.store
            .write_item(self.service.clone(), self.account.clone(), bytes)
    }
}

/// Backend over an [`AtomicBlobStore`], typically a shared container.
pub struct BlobBackend {
    id: BackendId,
    store: Arc<dyn AtomicBlobStore>,
    path: String,
}

impl BlobBackend {
    /// Default name reported by [`RootBackend::id`].
    pub const ID: &'static str = "shared-blob";

    /// Stores the root at `path` in `store`.
    pub fn new(store: Arc<dyn AtomicBlobStore>, path: impl Into<String>) -> Self {
        Self {
            id: BackendId::new(Self::ID),
            store,
            path: path.into(),
        }
    }

    /// Overrides the backend name, for hosts registering several blob stores.
    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = BackendId::new(id);
        self
    }
}

impl RootBackend for BlobBackend {
    fn id(&self) -> BackendId {
        self.id.clone()
    }

    fn location(&self) -> String {
        format!("blob:{}", self.path)
    }

    fn read(&self) -> BackendResult<Option<RootRecord>> {
        self.store
            .read(self.path.clone())?
            .map(|bytes| RootRecord::decode(&bytes))
            .transpose()
    }

    fn write(&self, record: &RootRecord) -> BackendResult<()> {
        let bytes = record.encode()?;
        self.store.write_atomic(self.path.clone(), bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::{MemoryBlobStore, MemorySecureItemStore};
    use crate::root::{RootIdentifier, ROOT_LEN};
    use crate::storage::BackendError;

    fn record() -> RootRecord {
        RootRecord::new(RootIdentifier::from_bytes([3; ROOT_LEN]), 42)
    }

    #[test]
    fn test_keychain_backend_round_trip() {
        let store = Arc::new(MemorySecureItemStore::new());
        let backend = KeychainBackend::new(store.clone(), "svc", "root");
        assert!(backend.read().expect("read").is_none());

        backend.write(&record()).expect("write");
        assert_eq!(backend.read().expect("read"), Some(record()));
        assert!(store.raw("svc", "root").is_some());
        assert_eq!(backend.id().as_str(), "keychain");
        assert_eq!(backend.location(), "keychain:svc/root");
    }

    #[test]
    fn test_blob_backend_reports_corruption() {
        let store = Arc::new(MemoryBlobStore::new());
        let backend = BlobBackend::new(store.clone(), "udid/root.bin").with_id("pasteboard");
        store.put_raw("udid/root.bin", vec![0xFF, 0x00, 0x13]);

        assert!(matches!(backend.read(), Err(BackendError::CorruptData(_))));
        assert_eq!(backend.id().to_string(), "pasteboard");
        assert_eq!(backend.location(), "blob:udid/root.bin");
    }
}
