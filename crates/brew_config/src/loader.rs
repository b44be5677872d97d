//! Configuration file loading and validation.

use std::path::Path;

use crate::error::ConfigError;
use crate::types::PipelineConfig;

/// Name of the configuration file looked up in the project directory.
pub const CONFIG_FILE_NAME: &str = "brewpipe.toml";

/// Loads and validates `brewpipe.toml` from a project directory.
pub fn load_config(project_dir: &Path) -> Result<PipelineConfig, ConfigError> {
    let content = std::fs::read_to_string(project_dir.join(CONFIG_FILE_NAME))?;
    load_config_from_str(&content)
}

/// Like [`load_config`], but a missing file yields the defaults.
pub fn load_config_or_default(project_dir: &Path) -> Result<PipelineConfig, ConfigError> {
    match load_config(project_dir) {
        Err(ConfigError::IoError(e)) if e.kind() == std::io::ErrorKind::NotFound => {
            Ok(PipelineConfig::default())
        }
        other => other,
    }
}

/// Parses and validates a `brewpipe.toml` configuration from a string.
pub fn load_config_from_str(content: &str) -> Result<PipelineConfig, ConfigError> {
    let config: PipelineConfig =
        toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
    validate_config(&config)?;
    Ok(config)
}

fn validate_config(config: &PipelineConfig) -> Result<(), ConfigError> {
    if config.state.file.as_os_str().is_empty() {
        return Err(ConfigError::ValidationError(
            "state.file must not be empty".to_string(),
        ));
    }
    if config.state.file.file_name().is_none() {
        return Err(ConfigError::ValidationError(format!(
            "state.file '{}' does not name a file",
            config.state.file.display()
        )));
    }
    if config.pipeline.intermediate_dir.as_os_str().is_empty() {
        return Err(ConfigError::ValidationError(
            "pipeline.intermediate_dir must not be empty".to_string(),
        ));
    }
    Ok(())
}
