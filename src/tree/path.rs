//! Key path parsing.
//!
//! Paths are `/`-separated. Leading, trailing and repeated separators are
//! ignored, so `config.json`, `/config.json` and `//config.json/` all name the
//! same key. The canonical form is absolute (`/a/b`), with `/` for the root.

use crate::error::ApiError;

/// Split a path into its segments, rejecting relative components.
pub fn split_path(path: &str) -> Result<Vec<&str>, ApiError> {
    let mut segments = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" => continue,
            "." | ".." => {
                return Err(ApiError::InvalidPath(format!(
                    "{}: relative segment '{}' not allowed",
                    path, segment
                )))
            }
            s if s.chars().any(|c| c.is_control()) => {
                return Err(ApiError::InvalidPath(format!(
                    "{}: control characters not allowed",
                    path
                )))
            }
            s => segments.push(s),
        }
    }
    Ok(segments)
}

/// Canonical absolute form of a path.
pub fn normalize_path(path: &str) -> Result<String, ApiError> {
    let segments = split_path(path)?;
    if segments.is_empty() {
        return Ok("/".to_string());
    }
    Ok(format!("/{}", segments.join("/")))
}

/// Append `key` to a canonical parent path.
pub fn join_path(parent: &str, key: &str) -> String {
    if parent.is_empty() || parent == "/" {
        format!("/{}", key)
    } else {
        format!("{}/{}", parent, key)
    }
}
