//! On-disk encoding of the root identifier.
//!
//! Every backend stores the same CBOR envelope:
//!
//! ```text
//! { version: u32, root: [u8; 32], created_at: u64, digest: [u8; 8] }
//! digest = SHA256("secureudid:root-record" || root || created_at_be)[..8]
//! ```
//!
//! The digest lets a reader report bit rot as [`BackendError::CorruptData`]
//! instead of silently adopting a damaged root.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use zeroize::{Zeroize, ZeroizeOnDrop};

use super::error::{BackendError, BackendResult};
use crate::root::RootIdentifier;

const RECORD_VERSION: u32 = 1;
const LABEL_RECORD_DIGEST: &[u8] = b"secureudid:root-record";
const DIGEST_LEN: usize = 8;

#[derive(Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
struct StoredRecord {
    version: u32,
    root: Vec<u8>,
    created_at: u64,
    digest: Vec<u8>,
}

/// A root identifier together with the time it was first created.
///
/// The creation time is carried along when the record is replicated, so a
/// healed backend holds an exact copy of the authoritative one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RootRecord {
    root: RootIdentifier,
    created_at: u64,
}

impl RootRecord {
    /// Builds a record for `root` created at `created_at` (seconds since epoch).
    #[must_use]
    pub const fn new(root: RootIdentifier, created_at: u64) -> Self {
        Self { root, created_at }
    }

    /// The root identifier.
    #[must_use]
    pub const fn root(&self) -> &RootIdentifier {
        &self.root
    }

    /// Seconds since the Unix epoch at which the root was generated.
    #[must_use]
    pub const fn created_at(&self) -> u64 {
        self.created_at
    }

    /// Serializes the record into its stored envelope.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::CorruptData`] if CBOR encoding fails.
    pub fn encode(&self) -> BackendResult<Vec<u8>> {
        let stored = StoredRecord {
            version: RECORD_VERSION,
            root: self.root.as_bytes().to_vec(),
            created_at: self.created_at,
            digest: record_digest(self.root.as_bytes(), self.created_at).to_vec(),
        };
        let mut bytes = Vec::new();
        ciborium::ser::into_writer(&stored, &mut bytes)
            .map_err(|err| BackendError::CorruptData(format!("encode: {err}")))?;
        Ok(bytes)
    }

    /// Parses and verifies a stored envelope.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::CorruptData`] if the bytes are not a valid
    /// envelope, carry an unknown version, or fail the digest check.
    pub fn decode(bytes: &[u8]) -> BackendResult<Self> {
        let stored: StoredRecord = ciborium::de::from_reader(bytes)
            .map_err(|err| BackendError::CorruptData(format!("decode: {err}")))?;
        if stored.version != RECORD_VERSION {
            return Err(BackendError::CorruptData(format!(
                "unsupported record version {}",
                stored.version
            )));
        }
        let root = RootIdentifier::from_slice(&stored.root).ok_or_else(|| {
            BackendError::CorruptData(format!(
                "root length mismatch: got {}",
                stored.root.len()
            ))
        })?;
        let expected = record_digest(root.as_bytes(), stored.created_at);
        if !bool::from(expected.as_slice().ct_eq(stored.digest.as_slice())) {
            return Err(BackendError::CorruptData(
                "record digest mismatch".to_string(),
            ));
        }
        Ok(Self {
            root,
            created_at: stored.created_at,
        })
    }
}

fn record_digest(root: &[u8], created_at: u64) -> [u8; DIGEST_LEN] {
    let mut hasher = Sha256::new();
    hasher.update(LABEL_RECORD_DIGEST);
    hasher.update(root);
    hasher.update(created_at.to_be_bytes());
    let hash = hasher.finalize();

    let mut digest = [0u8; DIGEST_LEN];
    digest.copy_from_slice(&hash[..DIGEST_LEN]);
    digest
}
