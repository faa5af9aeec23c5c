use std::time::Duration;

use strum::{Display, EnumString};

/// Default keychain service name.
pub const DEFAULT_SERVICE: &str = "com.secureudid";
/// Default keychain account name.
pub const DEFAULT_ACCOUNT: &str = "root";
/// Default path of the root blob inside the shared blob store.
pub const DEFAULT_BLOB_PATH: &str = "secureudid/root.bin";
/// Default bound on a single backend call.
pub const DEFAULT_BACKEND_TIMEOUT_MS: u64 = 2_000;

/// How the root manager picks a winner when backends hold different roots.
///
/// Backends are ranked by registration order; the first one registered has
/// the highest priority.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, uniffi::Enum, EnumString, Display,
)]
#[strum(serialize_all = "snake_case")]
pub enum ReconcilePolicy {
    /// The highest-priority backend holding a value wins.
    #[default]
    HighestPriority,
    /// The value held by the most backends wins; ties go to priority.
    Majority,
}

/// Host-facing configuration for [`crate::SecureUdid`].
#[derive(Debug, Clone, PartialEq, Eq, uniffi::Record)]
pub struct SecureUdidConfig {
    /// Keychain service the root item is stored under.
    pub service: String,
    /// Keychain account the root item is stored under.
    pub account: String,
    /// Path of the root blob inside the shared blob store.
    pub blob_path: String,
    /// Bound on each backend call in milliseconds. `None` calls inline.
    pub backend_timeout_ms: Option<u64>,
    /// Tie-break rule for divergent backends.
    pub reconcile_policy: ReconcilePolicy,
    /// Lock file shared by every process resolving the same root.
    pub lock_path: Option<String>,
}

impl Default for SecureUdidConfig {
    fn default() -> Self {
        Self {
            service: DEFAULT_SERVICE.to_string(),
            account: DEFAULT_ACCOUNT.to_string(),
            blob_path: DEFAULT_BLOB_PATH.to_string(),
            backend_timeout_ms: Some(DEFAULT_BACKEND_TIMEOUT_MS),
            reconcile_policy: ReconcilePolicy::default(),
            lock_path: None,
        }
    }
}

impl SecureUdidConfig {
    /// The backend timeout as a [`Duration`].
    #[must_use]
    pub fn backend_timeout(&self) -> Option<Duration> {
        self.backend_timeout_ms.map(Duration::from_millis)
    }
}

/// Returns the default configuration.
#[uniffi::export]
#[must_use]
pub fn default_config() -> SecureUdidConfig {
    SecureUdidConfig::default()
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use test_case::test_case;

    use super::*;

    #[test_case("highest_priority", ReconcilePolicy::HighestPriority ; "highest priority")]
    #[test_case("majority", ReconcilePolicy::Majority ; "majority")]
    fn test_policy_parses(input: &str, expected: ReconcilePolicy) {
        assert_eq!(ReconcilePolicy::from_str(input).expect("parse"), expected);
        assert_eq!(expected.to_string(), input);
    }

    #[test]
    fn test_unknown_policy_rejected() {
        assert!(ReconcilePolicy::from_str("newest").is_err());
    }

    #[test]
    fn test_defaults() {
        let config = SecureUdidConfig::default();
        assert_eq!(config.reconcile_policy, ReconcilePolicy::HighestPriority);
        assert_eq!(config.backend_timeout(), Some(Duration::from_secs(2)));
        assert!(config.lock_path.is_none());
    }
}
