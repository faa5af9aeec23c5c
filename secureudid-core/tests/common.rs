//! Common test utilities shared across integration tests.

#![allow(dead_code, missing_docs)]

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use secureudid_core::entropy::{EntropySource, OsEntropy};
use secureudid_core::platform::{FsBlobStore, MemoryBlobStore, MemorySecureItemStore};
use secureudid_core::storage::{BlobBackend, KeychainBackend};
use secureudid_core::{RootIdentifier, SecureUdid, SecureUdidConfig, SecureUdidError};

pub const DOMAIN: &str = "com.example.app";

/// Stores that outlive any single `SecureUdid` instance, like a device would.
pub struct Device {
    pub keychain: Arc<MemorySecureItemStore>,
    pub shared: Arc<MemoryBlobStore>,
}

impl Device {
    pub fn new() -> Self {
        Self {
            keychain: Arc::new(MemorySecureItemStore::new()),
            shared: Arc::new(MemoryBlobStore::new()),
        }
    }

    /// A fresh app install on this device.
    pub fn install(&self) -> SecureUdid {
        SecureUdid::new(
            self.keychain.clone(),
            self.shared.clone(),
            SecureUdidConfig::default(),
        )
        .expect("install")
    }

    /// A fresh app install that also serializes on `lock_path`.
    pub fn install_locked(&self, lock_path: &Path) -> SecureUdid {
        let config = SecureUdidConfig {
            lock_path: Some(lock_path.to_string_lossy().to_string()),
            ..SecureUdidConfig::default()
        };
        SecureUdid::new(self.keychain.clone(), self.shared.clone(), config).expect("install")
    }

    /// A fresh app install whose root generation is counted by `entropy`.
    pub fn install_counted(&self, entropy: Arc<CountingEntropy>) -> SecureUdid {
        let config = SecureUdidConfig::default();
        SecureUdid::builder()
            .backend(KeychainBackend::new(
                self.keychain.clone(),
                &config.service,
                &config.account,
            ))
            .backend(BlobBackend::new(self.shared.clone(), &config.blob_path))
            .entropy(entropy)
            .build()
            .expect("install")
    }
}

/// OS entropy that counts how many roots were generated.
#[derive(Default)]
pub struct CountingEntropy {
    generated: AtomicUsize,
}

impl CountingEntropy {
    pub fn generated(&self) -> usize {
        self.generated.load(Ordering::SeqCst)
    }
}

impl EntropySource for CountingEntropy {
    fn generate(&self) -> Result<RootIdentifier, SecureUdidError> {
        self.generated.fetch_add(1, Ordering::SeqCst);
        OsEntropy.generate()
    }
}

/// Keychain plus a filesystem-backed shared container rooted at `dir`.
pub fn fs_install(keychain: &Arc<MemorySecureItemStore>, dir: &Path) -> SecureUdid {
    let config = SecureUdidConfig::default();
    let container = FsBlobStore::new(dir).expect("container");
    SecureUdid::builder()
        .backend(KeychainBackend::new(
            keychain.clone(),
            &config.service,
            &config.account,
        ))
        .backend(BlobBackend::new(Arc::new(container), &config.blob_path))
        .timeout(Some(Duration::from_secs(5)))
        .build()
        .expect("build")
}
