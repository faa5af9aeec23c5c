//! Per-domain identifier derivation.
//!
//! The derived identifier is computed with HKDF-SHA256:
//!
//! ```text
//! prk  = HKDF-Extract(salt = "secureudid:udid", ikm = root)
//! info = "secureudid:udid" || len64(domain) || domain || len64(salt) || salt
//! udid = HKDF-Expand(prk, info, 16)
//! ```
//!
//! Lengths are 64-bit big-endian, so no two (domain, salt) pairs share an
//! `info` encoding. The 16 output bytes are rendered as an uppercase,
//! hyphenated UUID string.

use std::fmt;

use hkdf::Hkdf;
use sha2::Sha256;
use uuid::Uuid;

use crate::root::RootIdentifier;
use crate::SecureUdidError;

/// Domain separation label for derived identifiers.
const LABEL_UDID: &[u8] = b"secureudid:udid";

/// Length in bytes of a derived identifier.
pub const DERIVED_LEN: usize = 16;

// HKDF-SHA256 expands to at most 255 blocks of 32 bytes.
const _: () = assert!(DERIVED_LEN <= 255 * 32);

/// The identifier handed to callers for one (domain, salt) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DerivedIdentifier([u8; DERIVED_LEN]);

impl DerivedIdentifier {
    /// Raw identifier bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; DERIVED_LEN] {
        &self.0
    }

    /// Lowercase hex rendering without separators.
    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for DerivedIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut buf = Uuid::encode_buffer();
        f.write_str(Uuid::from_bytes(self.0).hyphenated().encode_upper(&mut buf))
    }
}

/// Derives the identifier for `domain` and `salt` from `root`.
///
/// # Errors
///
/// Returns [`SecureUdidError::InvalidArgument`] if HKDF rejects the output
/// length. [`DERIVED_LEN`] is checked against the HKDF limit at compile time.
pub fn derive_identifier(
    root: &RootIdentifier,
    domain: &str,
    salt: &str,
) -> Result<DerivedIdentifier, SecureUdidError> {
    let hkdf = Hkdf::<Sha256>::new(Some(LABEL_UDID), root.as_bytes());

    let mut info =
        Vec::with_capacity(LABEL_UDID.len() + 16 + domain.len() + salt.len());
    info.extend_from_slice(LABEL_UDID);
    push_length_prefixed(&mut info, domain.as_bytes());
    push_length_prefixed(&mut info, salt.as_bytes());

    let mut okm = [0u8; DERIVED_LEN];
    hkdf.expand(&info, &mut okm).map_err(|err| {
        SecureUdidError::InvalidArgument(format!("identifier length rejected by hkdf: {err}"))
    })?;
    Ok(DerivedIdentifier(okm))
}

fn push_length_prefixed(buf: &mut Vec<u8>, bytes: &[u8]) {
    let len = u64::try_from(bytes.len()).unwrap_or(u64::MAX);
    buf.extend_from_slice(&len.to_be_bytes());
    buf.extend_from_slice(bytes);
}
