//! Shared foundational types used across the brewpipe workspace.
//!
//! This crate provides the opaque [`Fingerprint`] token that stages use to
//! decide whether a cached output is still valid, and the
//! [`CorruptStatePolicy`] shared by the state store and its configuration.

#![warn(missing_docs)]

pub mod fingerprint;
pub mod policy;

pub use fingerprint::Fingerprint;
pub use policy::CorruptStatePolicy;
