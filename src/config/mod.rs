//! Configuration
//!
//! Layered configuration: built-in defaults, the global config file, the
//! workspace config file and `VKV__*` environment variables, in increasing
//! order of precedence.

pub mod facade;
pub mod merge;
pub mod paths;
pub mod sources;
pub mod workspace;

pub use facade::ConfigLoader;
pub use paths::xdg_root as xdg;
pub use workspace::storage_paths::{StorageBackend, StorageConfig};

use crate::error::ApiError;
use crate::graph::DEFAULT_MAX_TRAVERSAL;
use crate::heads::validate_branch_name;
use crate::logging::LoggingConfig;
use crate::search::DEFAULT_SEARCH_CACHE_CAPACITY;
use serde::{Deserialize, Serialize};

/// Commit graph settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphConfig {
    /// Upper bound on commits visited by a single traversal
    #[serde(default = "default_max_traversal")]
    pub max_traversal: usize,
}

fn default_max_traversal() -> usize {
    DEFAULT_MAX_TRAVERSAL
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            max_traversal: default_max_traversal(),
        }
    }
}

/// Search index settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Number of snapshot indexes kept in memory
    #[serde(default = "default_search_cache_capacity")]
    pub cache_capacity: usize,
}

fn default_search_cache_capacity() -> usize {
    DEFAULT_SEARCH_CACHE_CAPACITY
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            cache_capacity: default_search_cache_capacity(),
        }
    }
}

/// Repository defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepositoryConfig {
    #[serde(default = "default_branch")]
    pub default_branch: String,

    #[serde(default = "default_author")]
    pub default_author: String,
}

fn default_branch() -> String {
    "main".to_string()
}

fn default_author() -> String {
    "vkv".to_string()
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            default_branch: default_branch(),
            default_author: default_author(),
        }
    }
}

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VkvConfig {
    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub graph: GraphConfig,

    #[serde(default)]
    pub search: SearchConfig,

    #[serde(default)]
    pub repository: RepositoryConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl VkvConfig {
    /// Reject values that would only fail later, deep inside an operation.
    pub fn validate(&self) -> Result<(), ApiError> {
        if self.graph.max_traversal == 0 {
            return Err(ApiError::ConfigError(
                "graph.max_traversal must be greater than 0".to_string(),
            ));
        }
        if self.search.cache_capacity == 0 {
            return Err(ApiError::ConfigError(
                "search.cache_capacity must be greater than 0".to_string(),
            ));
        }
        validate_branch_name(&self.repository.default_branch).map_err(|e| {
            ApiError::ConfigError(format!("repository.default_branch: {}", e))
        })?;
        if self.repository.default_author.trim().is_empty() {
            return Err(ApiError::ConfigError(
                "repository.default_author cannot be empty".to_string(),
            ));
        }
        if self.logging.format != "text" && self.logging.format != "json" {
            return Err(ApiError::ConfigError(format!(
                "logging.format must be 'text' or 'json', got '{}'",
                self.logging.format
            )));
        }
        Ok(())
    }

    /// Render the effective configuration as a TOML document.
    pub fn to_toml(&self) -> Result<String, ApiError> {
        toml::to_string_pretty(self).map_err(|e| ApiError::ConfigError(e.to_string()))
    }
}
