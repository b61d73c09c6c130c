//! Error types for storage and engine operations.

use crate::types::{to_hex, CommitID, Hash};
use thiserror::Error;

/// Errors raised by the object and ref stores.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Database(#[from] sled::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Object not found: {}", to_hex(.0))]
    NotFound(Hash),

    #[error("Corrupt object {}: content hashes to {}", to_hex(.expected), to_hex(.actual))]
    CorruptObject { expected: Hash, actual: Hash },

    #[error("Invalid path: {0}")]
    InvalidPath(String),
}

impl From<bincode::Error> for StorageError {
    fn from(err: bincode::Error) -> Self {
        StorageError::Serialization(err.to_string())
    }
}

/// Errors surfaced to engine callers.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Object not found: {}", to_hex(.0))]
    ObjectNotFound(Hash),

    #[error("Commit not found: {0}")]
    CommitNotFound(String),

    #[error("Branch not found: {0}")]
    BranchNotFound(String),

    #[error("Path not found: {0}")]
    PathNotFound(String),

    #[error("Branch already exists: {0}")]
    AlreadyExists(String),

    #[error("Non-fast-forward update of branch {branch}: {} is not an ancestor of {}", to_hex(.head), to_hex(.target))]
    NonFastForward {
        branch: String,
        head: CommitID,
        target: CommitID,
    },

    #[error("Malformed commit graph: {0}")]
    MalformedGraph(String),

    #[error("Type mismatch at {path}: expected {expected}, found {found}")]
    TypeMismatch {
        path: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("Invalid hash: {0}")]
    InvalidHash(String),

    #[error("Invalid branch name: {0}")]
    InvalidBranchName(String),

    #[error("Invalid commit: {0}")]
    InvalidCommit(String),

    #[error("Ambiguous reference {reference}: matches {matches} commits")]
    AmbiguousRef { reference: String, matches: usize },

    #[error("Merge conflict on {} path(s): {}", .0.len(), .0.join(", "))]
    MergeConflict(Vec<String>),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Storage error: {0}")]
    StorageError(StorageError),
}

impl ApiError {
    /// True for every member of the NotFound family.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            ApiError::ObjectNotFound(_)
                | ApiError::CommitNotFound(_)
                | ApiError::BranchNotFound(_)
                | ApiError::PathNotFound(_)
        )
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(hash) => ApiError::ObjectNotFound(hash),
            other => ApiError::StorageError(other),
        }
    }
}

impl From<config::ConfigError> for ApiError {
    fn from(err: config::ConfigError) -> Self {
        ApiError::ConfigError(err.to_string())
    }
}
