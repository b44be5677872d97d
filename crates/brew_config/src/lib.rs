//! Parsing and validation of `brewpipe.toml` project configuration files.
//!
//! Every section is optional; a project without the file, or with an empty
//! one, gets the defaults described on [`PipelineConfig`].

#![warn(missing_docs)]

pub mod error;
pub mod loader;
pub mod types;

pub use error::ConfigError;
pub use loader::{load_config, load_config_from_str, load_config_or_default, CONFIG_FILE_NAME};
pub use types::*;
