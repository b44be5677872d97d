//! Named handles to pipeline data passed between stages.
//!
//! An [`Artifact`] either holds its value directly or carries a
//! [`Fingerprint`](brew_common::Fingerprint) plus an evaluator that produces
//! the value each time it is read. Persistence is not the artifact's concern:
//! stages record how to reproduce or relocate a value in the state store.

#![warn(missing_docs)]

pub mod artifact;
pub mod error;

pub use artifact::{artifact_name, Artifact, ArtifactBuilder, EvalError, Evaluator, Mode};
pub use error::ArtifactError;
