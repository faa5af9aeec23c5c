//! The host-facing [`SecureUdid`] object and its Rust-side builder.
//!
//! Each call validates its arguments, resolves the root through the
//! [`RootManager`] and derives the per-domain identifier from it.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::derivation::{derive_identifier, DerivedIdentifier};
use crate::entropy::{EntropySource, OsEntropy};
use crate::manager::{Resolution, RootManager};
use crate::platform::{AtomicBlobStore, SecureItemStore};
use crate::storage::{BlobBackend, KeychainBackend, RootBackend, StorageLock};
use crate::{ReconcilePolicy, SecureUdidConfig, SecureUdidError};

/// Entry point for host applications.
///
/// Holds the injected backends and hands out per-domain identifiers. Every
/// call resolves the root afresh (creating it on first use, healing stores
/// that lost it) and then derives the identifier.
///
/// # Examples
///
/// ```rust
/// use std::sync::Arc;
/// use secureudid_core::platform::{MemoryBlobStore, MemorySecureItemStore};
/// use secureudid_core::{SecureUdid, SecureUdidConfig};
///
/// let udid = SecureUdid::new(
///     Arc::new(MemorySecureItemStore::new()),
///     Arc::new(MemoryBlobStore::new()),
///     SecureUdidConfig::default(),
/// )
/// .unwrap();
///
/// let first = udid
///     .udid_for_domain("com.example.myapp".to_string(), "superSecretCodeHere!".to_string())
///     .unwrap();
/// let again = udid
///     .udid_for_domain("com.example.myapp".to_string(), "superSecretCodeHere!".to_string())
///     .unwrap();
/// assert_eq!(first, again);
/// ```
#[derive(uniffi::Object)]
pub struct SecureUdid {
    manager: RootManager,
}

#[uniffi::export]
impl SecureUdid {
    /// Builds an instance over a keychain store (highest priority) and a shared
    /// blob store.
    ///
    /// # Errors
    ///
    /// Returns [`SecureUdidError::LockUnavailable`] if `config.lock_path` is
    /// set and the lock file cannot be opened.
    #[uniffi::constructor]
    pub fn new(
        keychain: Arc<dyn SecureItemStore>,
        shared_store: Arc<dyn AtomicBlobStore>,
        config: SecureUdidConfig,
    ) -> Result<Self, SecureUdidError> {
        let mut builder = Self::builder()
            .backend(KeychainBackend::new(keychain, &config.service, &config.account))
            .backend(BlobBackend::new(shared_store, &config.blob_path))
            .policy(config.reconcile_policy)
            .timeout(config.backend_timeout());
        if let Some(path) = config.lock_path {
            builder = builder.lock_path(path);
        }
        builder.build()
    }

    /// Returns the identifier for `domain` and `salt` as an uppercase UUID string.
    ///
    /// Both arguments must be non-empty; there is no placeholder fallback.
    ///
    /// # Errors
    ///
    /// - [`SecureUdidError::InvalidArgument`] for an empty domain or salt
    /// - any resolution error from [`RootManager::resolve`]
    #[allow(clippy::needless_pass_by_value)]
    pub fn udid_for_domain(
        &self,
        domain: String,
        salt: String,
    ) -> Result<String, SecureUdidError> {
        self.derive(&domain, &salt).map(|id| id.to_string())
    }
}

impl SecureUdid {
    /// Starts a builder with no backends registered.
    #[must_use]
    pub fn builder() -> SecureUdidBuilder {
        SecureUdidBuilder::default()
    }

    /// Resolves the root and derives the identifier for `domain` and `salt`.
    ///
    /// # Errors
    ///
    /// See [`SecureUdid::udid_for_domain`].
    pub fn derive(&self, domain: &str, salt: &str) -> Result<DerivedIdentifier, SecureUdidError> {
        if domain.is_empty() {
            return Err(SecureUdidError::InvalidArgument(
                "domain must not be empty".to_string(),
            ));
        }
        if salt.is_empty() {
            return Err(SecureUdidError::InvalidArgument(
                "salt must not be empty".to_string(),
            ));
        }
        let resolution = self.resolve()?;
        derive_identifier(resolution.root(), domain, salt)
    }

    /// Runs root resolution on its own and reports what happened.
    ///
    /// # Errors
    ///
    /// See [`RootManager::resolve`].
    pub fn resolve(&self) -> Result<Resolution, SecureUdidError> {
        self.manager.resolve(unix_now())
    }
}

/// Rust-side builder for [`SecureUdid`] with arbitrary backends.
pub struct SecureUdidBuilder {
    backends: Vec<Arc<dyn RootBackend>>,
    entropy: Arc<dyn EntropySource>,
    policy: ReconcilePolicy,
    timeout: Option<Duration>,
    lock_path: Option<PathBuf>,
}

impl Default for SecureUdidBuilder {
    fn default() -> Self {
        Self {
            backends: Vec::new(),
            entropy: Arc::new(OsEntropy),
            policy: ReconcilePolicy::default(),
            timeout: SecureUdidConfig::default().backend_timeout(),
            lock_path: None,
        }
    }
}

impl SecureUdidBuilder {
    /// Registers a backend. Earlier registrations have higher priority.
    #[must_use]
    pub fn backend(mut self, backend: impl RootBackend + 'static) -> Self {
        self.backends.push(Arc::new(backend));
        self
    }

    /// Replaces the entropy source used when a new root is generated.
    #[must_use]
    pub fn entropy(mut self, entropy: Arc<dyn EntropySource>) -> Self {
        self.entropy = entropy;
        self
    }

    /// Sets the divergence tie-break policy.
    #[must_use]
    pub const fn policy(mut self, policy: ReconcilePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Sets the per-call backend timeout. `None` calls backends inline.
    #[must_use]
    pub const fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Serializes resolution across processes with a lock file at `path`.
    #[must_use]
    pub fn lock_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.lock_path = Some(path.into());
        self
    }

    /// Finishes the builder.
    ///
    /// # Errors
    ///
    /// - [`SecureUdidError::InvalidArgument`] if no backend was registered
    /// - [`SecureUdidError::LockUnavailable`] if the lock file cannot be opened
    pub fn build(self) -> Result<SecureUdid, SecureUdidError> {
        if self.backends.is_empty() {
            return Err(SecureUdidError::InvalidArgument(
                "at least one backend is required".to_string(),
            ));
        }
        let mut manager =
            RootManager::new(self.backends, self.entropy, self.policy).with_timeout(self.timeout);
        if let Some(path) = self.lock_path {
            manager = manager.with_file_lock(StorageLock::open(path)?);
        }
        log::debug!(
            "secureudid ready with backends [{}]",
            manager
                .backend_ids()
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", ")
        );
        Ok(SecureUdid { manager })
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| elapsed.as_secs())
}
