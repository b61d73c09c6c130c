//! StorageConfig and resolve_path for workspace storage.

use crate::config::xdg;
use crate::error::ApiError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Where objects and refs are kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// Process-local; contents are lost on exit.
    Memory,
    /// sled database on disk.
    Sled,
}

fn default_backend() -> StorageBackend {
    StorageBackend::Sled
}

fn default_true() -> bool {
    true
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_backend")]
    pub backend: StorageBackend,

    /// Database path; relative paths resolve against the workspace root.
    /// None means the per-workspace XDG data directory.
    #[serde(default)]
    pub path: Option<PathBuf>,

    /// Flush the database after every commit
    #[serde(default = "default_true")]
    pub flush_on_commit: bool,
}

impl StorageConfig {
    /// Resolve the database location for `workspace_root`.
    pub fn resolve_path(&self, workspace_root: &Path) -> Result<PathBuf, ApiError> {
        match &self.path {
            Some(path) if path.is_absolute() => Ok(path.clone()),
            Some(path) if !path.as_os_str().is_empty() => Ok(workspace_root.join(path)),
            _ => Ok(xdg::workspace_data_dir(workspace_root)?.join("store")),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            path: None,
            flush_on_commit: default_true(),
        }
    }
}
