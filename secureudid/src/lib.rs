//! Bindings-facing facade for `SecureUDID`.
//!
//! Re-exports [`secureudid_core`] and its `UniFFI` scaffolding so a single
//! library can be handed to the Swift and Kotlin binding generators.

pub use secureudid_core::*;

secureudid_core::uniffi_reexport_scaffolding!();
