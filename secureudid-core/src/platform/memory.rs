//! In-memory implementations of the platform stores.
//!
//! These are NOT durable. They exist for unit and integration tests of the
//! root manager, and for hosts prototyping without platform storage. Each
//! store can inject read/write failures and latency to exercise the
//! reconciliation and timeout paths.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{PoisonError, RwLock};
use std::thread;
use std::time::Duration;

use super::{AtomicBlobStore, SecureItemStore};
use crate::storage::{BackendError, BackendResult};

/// Switchable failure modes shared by the memory stores.
#[derive(Debug, Default)]
struct Faults {
    deny_reads: AtomicBool,
    fail_writes: AtomicBool,
    read_delay_ms: AtomicU64,
    write_delay_ms: AtomicU64,
    writes: AtomicUsize,
}

impl Faults {
    fn before_read(&self) -> BackendResult<()> {
        pause(&self.read_delay_ms);
        if self.deny_reads.load(Ordering::SeqCst) {
            return Err(BackendError::AccessDenied("reads disabled".to_string()));
        }
        Ok(())
    }

    fn before_write(&self) -> BackendResult<()> {
        pause(&self.write_delay_ms);
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(BackendError::Unavailable("writes disabled".to_string()));
        }
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

}

fn pause(delay_ms: &AtomicU64) {
    let delay = delay_ms.load(Ordering::SeqCst);
    if delay > 0 {
        thread::sleep(Duration::from_millis(delay));
    }
}

fn store_delay(slot: &AtomicU64, delay: Option<Duration>) {
    let millis = delay.map_or(0, |d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX));
    slot.store(millis, Ordering::SeqCst);
}

fn poisoned<T>(_: PoisonError<T>) -> BackendError {
    BackendError::Unavailable("memory store lock poisoned".to_string())
}

// =============================================================================
// Memory Secure Item Store
// =============================================================================

/// In-memory keychain keyed by `(service, account)`.
#[derive(Debug, Default)]
pub struct MemorySecureItemStore {
    items: RwLock<HashMap<(String, String), Vec<u8>>>,
    faults: Faults,
}

impl MemorySecureItemStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every read fail with [`BackendError::AccessDenied`].
    pub fn deny_reads(&self, deny: bool) {
        self.faults.deny_reads.store(deny, Ordering::SeqCst);
    }

    /// Makes every write fail with [`BackendError::Unavailable`].
    pub fn fail_writes(&self, fail: bool) {
        self.faults.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Delays every read, to exercise backend timeouts.
    pub fn set_read_delay(&self, delay: Option<Duration>) {
        store_delay(&self.faults.read_delay_ms, delay);
    }

    /// Delays every write. The write still lands once the delay has passed.
    pub fn set_write_delay(&self, delay: Option<Duration>) {
        store_delay(&self.faults.write_delay_ms, delay);
    }

    /// Number of successful writes so far.
    #[must_use]
    pub fn write_count(&self) -> usize {
        self.faults.writes.load(Ordering::SeqCst)
    }

    /// Removes every item, simulating a wiped store.
    pub fn clear(&self) {
        self.items
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// Returns the raw bytes of an item, bypassing fault injection.
    #[must_use]
    pub fn raw(&self, service: &str, account: &str) -> Option<Vec<u8>> {
        self.items
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&(service.to_string(), account.to_string()))
            .cloned()
    }

    /// Overwrites the raw bytes of an item, bypassing fault injection.
    pub fn put_raw(&self, service: &str, account: &str, bytes: Vec<u8>) {
        self.items
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert((service.to_string(), account.to_string()), bytes);
    }
}

impl SecureItemStore for MemorySecureItemStore {
    fn read_item(&self, service: String, account: String) -> BackendResult<Option<Vec<u8>>> {
        self.faults.before_read()?;
        let items = self.items.read().map_err(poisoned)?;
        Ok(items.get(&(service, account)).cloned())
    }

    fn write_item(
        &self,
        service: String,
        account: String,
        bytes: Vec<u8>,
    ) -> BackendResult<()> {
        self.faults.before_write()?;
        self.items
            .write()
            .map_err(poisoned)?
            .insert((service, account), bytes);
        Ok(())
    }
}

// =============================================================================
// Memory Blob Store
// =============================================================================

/// In-memory atomic blob store backed by a `HashMap`.
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    blobs: RwLock<HashMap<String, Vec<u8>>>,
    faults: Faults,
}

impl MemoryBlobStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every read fail with [`BackendError::AccessDenied`].
    pub fn deny_reads(&self, deny: bool) {
        self.faults.deny_reads.store(deny, Ordering::SeqCst);
    }

    /// Makes every write fail with [`BackendError::Unavailable`].
    pub fn fail_writes(&self, fail: bool) {
        self.faults.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Delays every read, to exercise backend timeouts.
    pub fn set_read_delay(&self, delay: Option<Duration>) {
        store_delay(&self.faults.read_delay_ms, delay);
    }

    /// Delays every write. The write still lands once the delay has passed.
    pub fn set_write_delay(&self, delay: Option<Duration>) {
        store_delay(&self.faults.write_delay_ms, delay);
    }

    /// Number of successful writes so far.
    #[must_use]
    pub fn write_count(&self) -> usize {
        self.faults.writes.load(Ordering::SeqCst)
    }

    /// Removes every blob, simulating a wiped store.
    pub fn clear(&self) {
        self.blobs
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// Returns the raw bytes of a blob, bypassing fault injection.
    #[must_use]
    pub fn raw(&self, path: &str) -> Option<Vec<u8>> {
        self.blobs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(path)
            .cloned()
    }

    /// Overwrites the raw bytes of a blob, bypassing fault injection.
    pub fn put_raw(&self, path: &str, bytes: Vec<u8>) {
        self.blobs
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(path.to_string(), bytes);
    }
}

impl AtomicBlobStore for MemoryBlobStore {
    fn read(&self, path: String) -> BackendResult<Option<Vec<u8>>> {
        self.faults.before_read()?;
        let blobs = self.blobs.read().map_err(poisoned)?;
        Ok(blobs.get(&path).cloned())
    }

    fn write_atomic(&self, path: String, bytes: Vec<u8>) -> BackendResult<()> {
        self.faults.before_write()?;
        self.blobs.write().map_err(poisoned)?.insert(path, bytes);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_item_store_round_trip_and_faults() {
        let store = MemorySecureItemStore::new();
        assert!(store
            .read_item("svc".to_string(), "acct".to_string())
            .expect("read")
            .is_none());

        store
            .write_item("svc".to_string(), "acct".to_string(), vec![9])
            .expect("write");
        assert_eq!(store.raw("svc", "acct"), Some(vec![9]));
        assert_eq!(store.write_count(), 1);

        store.deny_reads(true);
        assert!(matches!(
            store.read_item("svc".to_string(), "acct".to_string()),
            Err(BackendError::AccessDenied(_))
        ));

        store.fail_writes(true);
        assert!(store
            .write_item("svc".to_string(), "acct".to_string(), vec![1])
            .is_err());
        assert_eq!(store.write_count(), 1);
    }

    #[test]
    fn test_blob_store_clear() {
        let store = MemoryBlobStore::new();
        store
            .write_atomic("a".to_string(), vec![1])
            .expect("write");
        store.clear();
        assert!(store.read("a".to_string()).expect("read").is_none());
    }

    #[test]
    fn test_delayed_write_still_lands() {
        let store = MemoryBlobStore::new();
        store.set_write_delay(Some(Duration::from_millis(20)));

        let started = std::time::Instant::now();
        store
            .write_atomic("a".to_string(), vec![7])
            .expect("write");

        assert!(started.elapsed() >= Duration::from_millis(20));
        assert_eq!(store.raw("a"), Some(vec![7]));
    }
}
