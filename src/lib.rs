//! vkv: Versioned Hierarchical Key-Value Engine
//!
//! Git-like version control for hierarchical key/value data: immutable,
//! content-addressed snapshot trees with structural sharing, a commit DAG
//! with named branches, structural diffs and key search.

pub mod api;
pub mod config;
pub mod diff;
pub mod error;
pub mod graph;
pub mod heads;
pub mod logging;
pub mod search;
pub mod store;
pub mod tooling;
pub mod tree;
pub mod types;

pub use api::{MergeOutcome, Repository};
pub use error::{ApiError, StorageError};
pub use tree::Write;
