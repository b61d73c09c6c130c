//! Branch Heads
//!
//! Named, movable pointers to commits. Every mutation is one compare-and-swap
//! on the branch record in the ref store, so two concurrent advances from the
//! same head cannot both succeed.
//!
//! `commit_count` follows the branch's first-parent line: it starts at the
//! starting commit's first-parent depth and grows on each advance by the
//! number of first-parent steps from the new head back to the first commit
//! already contained in the old head's history. Neither walks the whole
//! history, so long-lived branches stay within the traversal budget.

use crate::error::{ApiError, StorageError};
use crate::graph::CommitGraph;
use crate::store::RefStore;
use crate::types::{hex_hash, is_full_hex, to_hex, CommitID};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

/// Ref key prefix for branch records.
pub const BRANCH_PREFIX: &str = "branch/";

/// Branch record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Branch {
    pub name: String,
    #[serde(with = "hex_hash")]
    pub head_commit: CommitID,
    pub last_updated: DateTime<Utc>,
    pub commit_count: u64,
}

fn branch_key(name: &str) -> String {
    format!("{}{}", BRANCH_PREFIX, name)
}

/// Validate a branch name.
pub fn validate_branch_name(name: &str) -> Result<(), ApiError> {
    let reason = if name.is_empty() {
        Some("name cannot be empty")
    } else if name.chars().any(|c| c.is_whitespace() || c.is_control()) {
        Some("name cannot contain whitespace or control characters")
    } else if name.contains("..") {
        Some("name cannot contain '..'")
    } else if name.starts_with('-') || name.starts_with('/') || name.ends_with('/') {
        Some("name cannot start with '-' or '/', or end with '/'")
    } else if is_full_hex(name) {
        Some("name cannot be a full commit hash")
    } else {
        None
    };
    match reason {
        Some(reason) => Err(ApiError::InvalidBranchName(format!("{}: {}", name, reason))),
        None => Ok(()),
    }
}

/// Branch registry: name -> Branch record
pub struct BranchRegistry {
    refs: Arc<dyn RefStore>,
    graph: Arc<CommitGraph>,
}

impl BranchRegistry {
    pub fn new(refs: Arc<dyn RefStore>, graph: Arc<CommitGraph>) -> Self {
        Self { refs, graph }
    }

    fn encode(branch: &Branch) -> Result<Vec<u8>, ApiError> {
        Ok(bincode::serialize(branch).map_err(StorageError::from)?)
    }

    fn decode(bytes: &[u8]) -> Result<Branch, ApiError> {
        Ok(bincode::deserialize(bytes).map_err(StorageError::from)?)
    }

    /// Load the raw record together with its decoded form.
    fn load(&self, name: &str) -> Result<(Vec<u8>, Branch), ApiError> {
        let bytes = self
            .refs
            .get(&branch_key(name))?
            .ok_or_else(|| ApiError::BranchNotFound(name.to_string()))?;
        let branch = Self::decode(&bytes)?;
        Ok((bytes, branch))
    }

    /// Create a branch pointing at `from_commit`.
    pub fn create(&self, name: &str, from_commit: &CommitID) -> Result<Branch, ApiError> {
        validate_branch_name(name)?;
        let commit_count = self.graph.get(from_commit)?.depth;
        let branch = Branch {
            name: name.to_string(),
            head_commit: *from_commit,
            last_updated: Utc::now(),
            commit_count,
        };
        let encoded = Self::encode(&branch)?;
        if !self
            .refs
            .compare_and_swap(&branch_key(name), None, Some(encoded.as_slice()))?
        {
            return Err(ApiError::AlreadyExists(name.to_string()));
        }
        info!(branch = %name, head = %to_hex(from_commit), commit_count, "Created branch");
        Ok(branch)
    }

    /// Fast-forward `name` to `to_commit`.
    pub fn advance(&self, name: &str, to_commit: &CommitID) -> Result<Branch, ApiError> {
        let (bytes, current) = self.load(name)?;
        self.swap_head(name, bytes, current, to_commit)
    }

    /// Fast-forward `name` to `to_commit` only if its head is still `expected_head`.
    pub fn advance_from(
        &self,
        name: &str,
        expected_head: &CommitID,
        to_commit: &CommitID,
    ) -> Result<Branch, ApiError> {
        let (bytes, current) = self.load(name)?;
        if current.head_commit != *expected_head {
            warn!(
                branch = %name,
                expected = %to_hex(expected_head),
                actual = %to_hex(&current.head_commit),
                "Rejected advance from stale head"
            );
            return Err(ApiError::NonFastForward {
                branch: name.to_string(),
                head: current.head_commit,
                target: *to_commit,
            });
        }
        self.swap_head(name, bytes, current, to_commit)
    }

    fn swap_head(
        &self,
        name: &str,
        expected_bytes: Vec<u8>,
        current: Branch,
        to_commit: &CommitID,
    ) -> Result<Branch, ApiError> {
        let rejected = || ApiError::NonFastForward {
            branch: name.to_string(),
            head: current.head_commit,
            target: *to_commit,
        };

        if !self.graph.is_ancestor(&current.head_commit, to_commit)? {
            warn!(
                branch = %name,
                head = %to_hex(&current.head_commit),
                target = %to_hex(to_commit),
                "Rejected non-fast-forward advance"
            );
            return Err(rejected());
        }

        let added = self.new_first_parent_commits(&current.head_commit, to_commit)?;
        let updated = Branch {
            name: name.to_string(),
            head_commit: *to_commit,
            last_updated: Utc::now(),
            commit_count: current.commit_count + added,
        };
        let encoded = Self::encode(&updated)?;
        if !self.refs.compare_and_swap(
            &branch_key(name),
            Some(expected_bytes.as_slice()),
            Some(encoded.as_slice()),
        )? {
            warn!(branch = %name, "Lost concurrent advance race");
            return Err(rejected());
        }
        info!(
            branch = %name,
            from = %to_hex(&current.head_commit),
            to = %to_hex(to_commit),
            commit_count = updated.commit_count,
            "Advanced branch"
        );
        Ok(updated)
    }

    /// First-parent steps from `new_head` until a commit already in `old_head`'s history.
    fn new_first_parent_commits(
        &self,
        old_head: &CommitID,
        new_head: &CommitID,
    ) -> Result<u64, ApiError> {
        let mut added = 0;
        let mut current = self.graph.get(new_head)?;
        while !self.graph.is_ancestor(&current.hash, old_head)? {
            added += 1;
            current = match current.first_parent() {
                Some(parent) => self.graph.get(&parent)?,
                None => break,
            };
        }
        Ok(added)
    }

    /// Remove a branch record. Commits and snapshots are untouched.
    pub fn delete(&self, name: &str) -> Result<Branch, ApiError> {
        loop {
            let (bytes, branch) = self.load(name)?;
            if self
                .refs
                .compare_and_swap(&branch_key(name), Some(bytes.as_slice()), None)?
            {
                info!(branch = %name, "Deleted branch");
                return Ok(branch);
            }
        }
    }

    pub fn get(&self, name: &str) -> Result<Branch, ApiError> {
        Ok(self.load(name)?.1)
    }

    pub fn find(&self, name: &str) -> Result<Option<Branch>, ApiError> {
        match self.refs.get(&branch_key(name))? {
            Some(bytes) => Ok(Some(Self::decode(&bytes)?)),
            None => Ok(None),
        }
    }

    /// All branches ordered by name.
    pub fn list(&self) -> Result<Vec<Branch>, ApiError> {
        self.refs
            .scan_prefix(BRANCH_PREFIX)?
            .iter()
            .map(|(_, bytes)| Self::decode(bytes))
            .collect()
    }
}
