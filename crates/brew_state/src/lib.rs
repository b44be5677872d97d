//! Durable, namespaced pipeline state.
//!
//! Stages record where their cached outputs live and which input
//! fingerprint produced them in a [`StateStore`]. Every mutation is written
//! through to a checksummed snapshot file before the call returns, so a
//! pipeline restarted after a crash skips work that already completed.
//! [`StageNamespace`] prefixes keys with the stage name so unrelated stages
//! sharing one store never collide.

#![warn(missing_docs)]

pub mod error;
pub mod fingerprint;
pub mod memo;
pub mod namespace;
mod registry;
pub mod snapshot;
pub mod store;

pub use error::StateError;
pub use fingerprint::{Freshness, InputFingerprint};
pub use memo::{CacheRecord, Lookup};
pub use namespace::{qualify, split_qualified, Stage, StageNamespace, KEY_SEPARATOR};
pub use store::{LoadStatus, StateStore, Value};
