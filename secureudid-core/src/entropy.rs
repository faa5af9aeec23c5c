//! Randomness for new roots.

use rand::{rngs::OsRng, RngCore};
use zeroize::Zeroize;

use crate::{
    root::{RootIdentifier, ROOT_LEN},
    SecureUdidError,
};

/// Source of fresh root identifiers.
///
/// Implementations must draw from a cryptographically secure generator. A
/// failure is final: the root manager does not retry.
pub trait EntropySource: Send + Sync {
    /// Produces a new random root.
    ///
    /// # Errors
    ///
    /// Returns [`SecureUdidError::EntropyUnavailable`] if the generator fails.
    fn generate(&self) -> Result<RootIdentifier, SecureUdidError>;
}

/// Operating system CSPRNG.
#[derive(Debug, Clone, Copy, Default)]
pub struct OsEntropy;

impl EntropySource for OsEntropy {
    fn generate(&self) -> Result<RootIdentifier, SecureUdidError> {
        let mut bytes = [0u8; ROOT_LEN];
        OsRng
            .try_fill_bytes(&mut bytes)
            .map_err(|err| SecureUdidError::EntropyUnavailable(err.to_string()))?;
        let root = RootIdentifier::from_bytes(bytes);
        bytes.zeroize();
        Ok(root)
    }
}
