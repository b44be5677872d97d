//! Recovery policy for unreadable state files.

use serde::{Deserialize, Serialize};

/// What the state store does when its backing file exists but cannot be read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CorruptStatePolicy {
    /// Start from an empty mapping and log a warning. Every stage recomputes.
    #[default]
    Reset,
    /// Refuse to open the store until the file is reset explicitly.
    Fail,
}
