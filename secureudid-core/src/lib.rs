//! Stable, per-domain device identifiers that survive app reinstallation.
//!
//! A 32-byte root secret is generated once per device and replicated across
//! several independent stores (a keychain-like credential store plus shared
//! blob stores). Callers never see the root: each `(domain, salt)` pair gets
//! its own identifier derived from it with HKDF-SHA256, so identifiers from
//! different domains cannot be linked without the root.
//!
//! ```rust
//! use std::sync::Arc;
//! use secureudid_core::platform::{MemoryBlobStore, MemorySecureItemStore};
//! use secureudid_core::{SecureUdid, SecureUdidConfig};
//!
//! let udid = SecureUdid::new(
//!     Arc::new(MemorySecureItemStore::new()),
//!     Arc::new(MemoryBlobStore::new()),
//!     SecureUdidConfig::default(),
//! )?;
//! let id = udid.udid_for_domain("com.example.myapp".into(), "salt".into())?;
//! assert_eq!(id.len(), 36);
//! # Ok::<(), secureudid_core::SecureUdidError>(())
//! ```
#![deny(clippy::all, clippy::pedantic, clippy::nursery)]

mod config;
pub use config::*;

mod error;
pub use error::*;

mod udid;
pub use udid::*;

pub mod derivation;
pub mod entropy;
pub mod logger;
pub mod manager;
pub mod platform;
pub mod root;
pub mod storage;

mod worker;

pub use derivation::DerivedIdentifier;
pub use manager::{Resolution, ResolutionKind, RootManager};
pub use root::RootIdentifier;

uniffi::setup_scaffolding!("secureudid_core");
