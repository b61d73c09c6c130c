//! Global config file source: `$XDG_CONFIG_HOME/vkv/config.toml`

use crate::config::xdg;
use config::builder::DefaultState;
use config::{ConfigBuilder, ConfigError, File};
use std::path::PathBuf;

/// Path of the global config file, if a config home can be determined.
pub fn path() -> Option<PathBuf> {
    xdg::config_home()
        .ok()
        .map(|home| home.join("vkv").join("config.toml"))
}

/// Add the global config file to builder when it exists.
pub fn add_to_builder(
    builder: ConfigBuilder<DefaultState>,
) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    match path() {
        Some(path) if path.exists() => Ok(builder.add_source(File::from(path).required(false))),
        _ => Ok(builder),
    }
}
