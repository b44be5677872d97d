//! Configuration types deserialized from `brewpipe.toml`.

use std::path::{Path, PathBuf};

use brew_common::CorruptStatePolicy;
use serde::Deserialize;

/// Default name of the state snapshot file.
pub const DEFAULT_STATE_FILE: &str = "pipelinestate.state";

/// Default directory for intermediate outputs.
pub const DEFAULT_INTERMEDIATE_DIR: &str = "intermediates";

/// The top-level configuration parsed from `brewpipe.toml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PipelineConfig {
    /// State store settings.
    #[serde(default)]
    pub state: StateConfig,
    /// Where stages put their outputs.
    #[serde(default)]
    pub pipeline: PipelineSection,
}

impl PipelineConfig {
    /// Resolves the state file against `project_dir` unless it is absolute.
    pub fn state_path(&self, project_dir: &Path) -> PathBuf {
        project_dir.join(&self.state.file)
    }

    /// Resolves the intermediate directory against `project_dir`.
    pub fn intermediate_dir(&self, project_dir: &Path) -> PathBuf {
        project_dir.join(&self.pipeline.intermediate_dir)
    }
}

/// The `[state]` section.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StateConfig {
    /// Snapshot file, relative to the project directory.
    #[serde(default = "default_state_file")]
    pub file: PathBuf,
    /// What to do when the snapshot file cannot be read.
    #[serde(default)]
    pub on_corrupt: CorruptStatePolicy,
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            file: default_state_file(),
            on_corrupt: CorruptStatePolicy::default(),
        }
    }
}

/// The `[pipeline]` section.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PipelineSection {
    /// Directory for intermediate outputs, relative to the project directory.
    #[serde(default = "default_intermediate_dir")]
    pub intermediate_dir: PathBuf,
}

impl Default for PipelineSection {
    fn default() -> Self {
        Self {
            intermediate_dir: default_intermediate_dir(),
        }
    }
}

fn default_state_file() -> PathBuf {
    PathBuf::from(DEFAULT_STATE_FILE)
}

fn default_intermediate_dir() -> PathBuf {
    PathBuf::from(DEFAULT_INTERMEDIATE_DIR)
}
