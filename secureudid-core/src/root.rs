//! The device-scoped root secret.

use std::fmt;

use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Length in bytes of a root identifier.
pub const ROOT_LEN: usize = 32;

const LABEL_FINGERPRINT: &[u8] = b"secureudid:root-fingerprint";

/// The single secret every derived identifier is computed from.
///
/// The bytes are wiped on drop and compared in constant time. `Debug` only
/// prints a short one-way fingerprint so the root never ends up in logs.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct RootIdentifier {
    bytes: [u8; ROOT_LEN],
}

impl RootIdentifier {
    /// Wraps raw root bytes.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; ROOT_LEN]) -> Self {
        Self { bytes }
    }

    /// Copies a root out of a slice, returning `None` on a length mismatch.
    #[must_use]
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        let bytes: [u8; ROOT_LEN] = bytes.try_into().ok()?;
        Some(Self { bytes })
    }

    /// Returns the raw root bytes. Treat this as sensitive material.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; ROOT_LEN] {
        &self.bytes
    }

    /// A short, non-reversible tag for correlating log lines.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(LABEL_FINGERPRINT);
        hasher.update(self.bytes);
        hex::encode(&hasher.finalize()[..4])
    }
}

impl PartialEq for RootIdentifier {
    fn eq(&self, other: &Self) -> bool {
        self.bytes.ct_eq(&other.bytes).into()
    }
}

impl Eq for RootIdentifier {}

impl fmt::Debug for RootIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("RootIdentifier")
            .field(&self.fingerprint())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_slice_rejects_wrong_length() {
        assert!(RootIdentifier::from_slice(&[0u8; 16]).is_none());
        assert!(RootIdentifier::from_slice(&[0u8; 33]).is_none());
        assert!(RootIdentifier::from_slice(&[7u8; ROOT_LEN]).is_some());
    }

    #[test]
    fn test_debug_does_not_leak_bytes() {
        let root = RootIdentifier::from_bytes([0xAB; ROOT_LEN]);
        let rendered = format!("{root:?}");
        assert!(!rendered.contains("abab"));
        assert!(rendered.contains(&root.fingerprint()));
    }

    #[test]
    fn test_equality() {
        let a = RootIdentifier::from_bytes([1; ROOT_LEN]);
        let b = RootIdentifier::from_bytes([1; ROOT_LEN]);
        let c = RootIdentifier::from_bytes([2; ROOT_LEN]);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
