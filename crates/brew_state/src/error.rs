//! Error types for state store operations.

use std::path::PathBuf;

/// Errors that can occur while loading, persisting, or addressing state.
///
/// A missing key is never an error. Load-time corruption is only surfaced
/// when the store was opened with
/// [`CorruptStatePolicy::Fail`](brew_common::CorruptStatePolicy::Fail);
/// otherwise it is logged and the store starts empty.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    /// An I/O error occurred while reading or writing a state file.
    #[error("state I/O error at {path}: {source}")]
    Io {
        /// The path that caused the error.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// A value could not be serialized or deserialized.
    #[error("serialization error: {reason}")]
    Serialization {
        /// Description of the serialization failure.
        reason: String,
    },

    /// The snapshot file has an invalid or truncated header.
    #[error("invalid state header in {path}: {reason}")]
    InvalidHeader {
        /// The snapshot file path.
        path: PathBuf,
        /// Description of the header problem.
        reason: String,
    },

    /// The stored checksum does not match the payload.
    #[error("checksum mismatch in {path}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        /// The snapshot file path.
        path: PathBuf,
        /// The checksum recorded in the header.
        expected: String,
        /// The checksum computed from the payload.
        actual: String,
    },

    /// The snapshot was written by an incompatible format version.
    #[error("version mismatch in {path}: expected {expected}, got {actual}")]
    VersionMismatch {
        /// The snapshot file path.
        path: PathBuf,
        /// The format version this build reads.
        expected: u32,
        /// The format version found in the file.
        actual: u32,
    },

    /// The state file could not be loaded and the store refuses to start empty.
    #[error("corrupt state file {path}: {reason} (run `brew reset` to start over)")]
    Corrupt {
        /// The snapshot file path.
        path: PathBuf,
        /// Why loading failed.
        reason: String,
    },

    /// A stage name cannot be used as a key prefix.
    #[error("invalid stage name '{name}': {reason}")]
    InvalidStageName {
        /// The rejected name.
        name: String,
        /// Why it was rejected.
        reason: String,
    },
}

impl StateError {
    /// Returns `true` for errors that describe an unreadable snapshot file.
    pub fn is_corruption(&self) -> bool {
        matches!(
            self,
            StateError::InvalidHeader { .. }
                | StateError::ChecksumMismatch { .. }
                | StateError::VersionMismatch { .. }
                | StateError::Serialization { .. }
                | StateError::Corrupt { .. }
        )
    }
}
