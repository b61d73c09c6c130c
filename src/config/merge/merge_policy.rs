//! Merge policy: built-in defaults form the lowest layer; later sources
//! override individual keys, never whole tables.

use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError};

/// Start a builder seeded with the defaults every layer is merged onto.
pub fn builder_with_defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    Config::builder()
        .set_default("storage.backend", "sled")?
        .set_default("storage.flush_on_commit", true)?
        .set_default("repository.default_branch", "main")?
        .set_default("repository.default_author", "vkv")?
        .set_default("logging.level", "info")?
        .set_default("logging.format", "text")
}
