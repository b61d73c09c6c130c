//! Repository API
//!
//! Front door of the engine. A `Repository` owns the stores and the engine
//! components built on them and exposes the read operations (trees, history,
//! branches, search, diffs) and the write operations (commits, branches,
//! merges). References accepted by the read side are branch names, full
//! commit hashes, or unique hash prefixes.

use crate::config::{StorageBackend, VkvConfig};
use crate::diff::{diff_commits, diff_trees, to_writes, Change, CommitDiff};
use crate::error::ApiError;
use crate::graph::{Commit, CommitGraph};
use crate::heads::{Branch, BranchRegistry};
use crate::search::{SearchIndex, SearchResult};
use crate::store::persistence::open_sled_stores;
use crate::store::{MemoryObjectStore, MemoryRefStore, ObjectStore, RefStore};
use crate::tree::path::split_path;
use crate::tree::{SnapshotNode, SnapshotTree, TreeBuilder, Write, ROOT_KEY};
use crate::types::{hex_hash, is_full_hex, parse_hash, to_hex, CommitID};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Shortest hash prefix accepted as a commit reference.
pub const MIN_PREFIX_LEN: usize = 4;

/// Result of [`Repository::merge`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum MergeOutcome {
    /// The source was already contained in the target; nothing was committed.
    UpToDate {
        #[serde(with = "hex_hash")]
        head: CommitID,
    },
    /// A merge commit was created and the target branch advanced to it.
    Merged { commit: Commit, applied: usize },
}

/// Snapshot of repository state for `status`/health checks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthReport {
    pub healthy: bool,
    pub backend: StorageBackend,
    pub objects: usize,
    pub commits: usize,
    pub branches: usize,
    pub default_branch: String,
    pub default_head: Option<String>,
}

/// Versioned key-value repository
pub struct Repository {
    config: VkvConfig,
    objects: Arc<dyn ObjectStore>,
    refs: Arc<dyn RefStore>,
    tree: Arc<SnapshotTree>,
    graph: Arc<CommitGraph>,
    branches: BranchRegistry,
    search: SearchIndex,
}

impl Repository {
    /// Assemble a repository over existing stores.
    pub fn new(objects: Arc<dyn ObjectStore>, refs: Arc<dyn RefStore>, config: VkvConfig) -> Self {
        let tree = Arc::new(SnapshotTree::new(objects.clone()));
        let graph = Arc::new(CommitGraph::new(
            objects.clone(),
            refs.clone(),
            config.graph.max_traversal,
        ));
        let branches = BranchRegistry::new(refs.clone(), graph.clone());
        let search = SearchIndex::new(tree.clone(), config.search.cache_capacity);
        Self {
            config,
            objects,
            refs,
            tree,
            graph,
            branches,
            search,
        }
    }

    /// Repository over in-memory stores with default configuration.
    pub fn in_memory() -> Self {
        let config = VkvConfig {
            storage: crate::config::StorageConfig {
                backend: StorageBackend::Memory,
                ..Default::default()
            },
            ..Default::default()
        };
        Self::new(
            Arc::new(MemoryObjectStore::new()),
            Arc::new(MemoryRefStore::new()),
            config,
        )
    }

    /// Open the repository for `workspace_root` using the configured backend.
    pub fn open(config: VkvConfig, workspace_root: &Path) -> Result<Self, ApiError> {
        match config.storage.backend {
            StorageBackend::Memory => Ok(Self::new(
                Arc::new(MemoryObjectStore::new()),
                Arc::new(MemoryRefStore::new()),
                config,
            )),
            StorageBackend::Sled => {
                let path = config.storage.resolve_path(workspace_root)?;
                let (objects, refs) = open_sled_stores(&path)?;
                info!(path = %path.display(), "Opened repository");
                Ok(Self::new(Arc::new(objects), Arc::new(refs), config))
            }
        }
    }

    pub fn config(&self) -> &VkvConfig {
        &self.config
    }

    pub fn tree(&self) -> &SnapshotTree {
        &self.tree
    }

    pub fn graph(&self) -> &CommitGraph {
        &self.graph
    }

    pub fn branches(&self) -> &BranchRegistry {
        &self.branches
    }

    pub fn default_branch(&self) -> &str {
        &self.config.repository.default_branch
    }

    pub fn default_author(&self) -> &str {
        &self.config.repository.default_author
    }

    // ---- read side ----

    /// Resolve a branch name, full commit hash or unique hash prefix.
    pub fn resolve_ref(&self, reference: &str) -> Result<CommitID, ApiError> {
        if let Some(branch) = self.branches.find(reference)? {
            return Ok(branch.head_commit);
        }
        if is_full_hex(reference) {
            let hash = parse_hash(&reference.to_ascii_lowercase())?;
            return if self.graph.contains(&hash)? {
                Ok(hash)
            } else {
                Err(ApiError::CommitNotFound(reference.to_string()))
            };
        }
        if reference.len() >= MIN_PREFIX_LEN && reference.bytes().all(|b| b.is_ascii_hexdigit()) {
            let matches = self.graph.find_by_prefix(reference)?;
            return match matches.as_slice() {
                [] => Err(ApiError::CommitNotFound(reference.to_string())),
                [hash] => Ok(*hash),
                _ => Err(ApiError::AmbiguousRef {
                    reference: reference.to_string(),
                    matches: matches.len(),
                }),
            };
        }
        Err(ApiError::BranchNotFound(reference.to_string()))
    }

    pub fn resolve_commit(&self, reference: &str) -> Result<Arc<Commit>, ApiError> {
        let hash = self.resolve_ref(reference)?;
        self.graph.get(&hash)
    }

    /// Materialize the full snapshot of a branch or commit.
    pub fn resolve_tree(&self, reference: &str) -> Result<SnapshotNode, ApiError> {
        let commit = self.resolve_commit(reference)?;
        self.tree.materialize(&commit.root)
    }

    /// Materialize the node at `path` in a branch or commit.
    pub fn get_node(&self, reference: &str, path: &str) -> Result<SnapshotNode, ApiError> {
        let commit = self.resolve_commit(reference)?;
        let (node_id, _) = self.tree.resolve(&commit.root, path)?;
        let key = split_path(path)?.last().copied().unwrap_or(ROOT_KEY);
        self.tree.materialize_node(key, &node_id)
    }

    /// Value of the file at `path` in a branch or commit.
    pub fn get_value(&self, reference: &str, path: &str) -> Result<String, ApiError> {
        let commit = self.resolve_commit(reference)?;
        self.tree.resolve_value(&commit.root, path)
    }

    /// Commits newest first: the ancestry of `branch`, or every commit when `None`.
    pub fn list_commits(&self, branch: Option<&str>) -> Result<Vec<Commit>, ApiError> {
        let mut commits: Vec<Arc<Commit>> = match branch {
            None => self.graph.list()?,
            Some(name) => {
                let head = self.branches.get(name)?.head_commit;
                self.graph.ancestors(&head)?.collect::<Result<_, _>>()?
            }
        };
        commits.sort_by(|a, b| {
            b.timestamp
                .cmp(&a.timestamp)
                .then_with(|| b.generation.cmp(&a.generation))
                .then_with(|| a.hash.cmp(&b.hash))
        });
        Ok(commits.iter().map(|c| c.as_ref().clone()).collect())
    }

    pub fn list_branches(&self) -> Result<Vec<Branch>, ApiError> {
        self.branches.list()
    }

    /// Search keys in `scope` (default branch head when `None`).
    pub fn search_keys(&self, query: &str, scope: Option<&str>) -> Result<Vec<SearchResult>, ApiError> {
        self.search_keys_limited(query, scope, usize::MAX)
    }

    pub fn search_keys_limited(
        &self,
        query: &str,
        scope: Option<&str>,
        limit: usize,
    ) -> Result<Vec<SearchResult>, ApiError> {
        let commit = self.resolve_commit(scope.unwrap_or(self.default_branch()))?;
        self.search.search_limited(&commit.root, query, limit)
    }

    pub fn get_commit_diff(&self, from: &str, to: &str) -> Result<CommitDiff, ApiError> {
        let from = self.resolve_ref(from)?;
        let to = self.resolve_ref(to)?;
        diff_commits(&self.graph, &self.tree, &from, &to)
    }

    // ---- write side ----

    /// Create the root commit (an empty tree) and the default branch.
    pub fn init(&self, author: &str, message: &str) -> Result<Arc<Commit>, ApiError> {
        let branch = self.default_branch().to_string();
        if self.branches.find(&branch)?.is_some() {
            return Err(ApiError::AlreadyExists(branch));
        }
        let root = self.tree.empty_root()?;
        let commit = self
            .graph
            .commit(root, message, author, Utc::now(), Vec::new(), &branch)?;
        self.branches.create(&branch, &commit.hash)?;
        self.flush_if_configured()?;
        info!(commit = %to_hex(&commit.hash), branch = %branch, "Initialized repository");
        Ok(commit)
    }

    /// Apply `writes` to the head of `branch`, commit, and advance the branch.
    ///
    /// A concurrent commit on the same branch makes this fail with
    /// `NonFastForward`; nothing becomes visible in that case.
    pub fn commit_writes(
        &self,
        branch: &str,
        writes: &[Write],
        author: &str,
        message: &str,
    ) -> Result<Arc<Commit>, ApiError> {
        let head = self.branches.get(branch)?.head_commit;
        let parent = self.graph.get(&head)?;
        let now = Utc::now();
        let root = self.tree.apply(&parent.root, writes, now)?;
        let commit = self
            .graph
            .commit(root, message, author, now, vec![parent.hash], branch)?;
        self.branches.advance_from(branch, &parent.hash, &commit.hash)?;
        self.flush_if_configured()?;
        Ok(commit)
    }

    /// Create `name` at `from` (default branch head when `None`).
    pub fn create_branch(&self, name: &str, from: Option<&str>) -> Result<Branch, ApiError> {
        let start = self.resolve_ref(from.unwrap_or(self.default_branch()))?;
        let branch = self.branches.create(name, &start)?;
        self.flush_if_configured()?;
        Ok(branch)
    }

    pub fn delete_branch(&self, name: &str) -> Result<Branch, ApiError> {
        let branch = self.branches.delete(name)?;
        self.flush_if_configured()?;
        Ok(branch)
    }

    /// Merge `source` (any reference) into the branch `into`.
    ///
    /// Source-side changes since the merge base are replayed onto the target
    /// snapshot. A path changed differently on both sides is a conflict and
    /// aborts the merge without committing anything.
    pub fn merge(
        &self,
        source: &str,
        into: &str,
        author: &str,
        message: &str,
    ) -> Result<MergeOutcome, ApiError> {
        let source_head = self.resolve_ref(source)?;
        let into_head = self.branches.get(into)?.head_commit;

        if self.graph.is_ancestor(&source_head, &into_head)? {
            debug!(source = %source, into = %into, "Merge source already contained");
            return Ok(MergeOutcome::UpToDate { head: into_head });
        }

        let source_commit = self.graph.get(&source_head)?;
        let into_commit = self.graph.get(&into_head)?;
        let base_root = match self.graph.merge_base(&source_head, &into_head)? {
            Some(base) => self.graph.get(&base)?.root,
            None => self.tree.empty_root()?,
        };

        let ours = diff_trees(&self.tree, &base_root, &into_commit.root)?;
        let theirs = diff_trees(&self.tree, &base_root, &source_commit.root)?;
        let ours_by_path: HashMap<&str, &Change> =
            ours.iter().map(|c| (c.path.as_str(), c)).collect();

        let mut conflicts = Vec::new();
        let mut accepted = Vec::new();
        for change in &theirs {
            match ours_by_path.get(change.path.as_str()) {
                Some(our) if our.new_value == change.new_value => {}
                Some(_) => conflicts.push(change.path.clone()),
                None => accepted.push(change.clone()),
            }
        }
        let writes = to_writes(&accepted);

        let now = Utc::now();
        let mut builder = TreeBuilder::new(&self.tree, into_commit.root, now);
        for write in &writes {
            match builder.write(write) {
                Ok(()) => {}
                Err(ApiError::TypeMismatch { .. }) => conflicts.push(write.path.clone()),
                Err(e) => return Err(e),
            }
        }
        if !conflicts.is_empty() {
            conflicts.sort();
            conflicts.dedup();
            warn!(source = %source, into = %into, conflicts = conflicts.len(), "Merge aborted");
            return Err(ApiError::MergeConflict(conflicts));
        }
        let root = builder.build()?;

        let commit = self.graph.commit(
            root,
            message,
            author,
            now,
            vec![into_head, source_head],
            into,
        )?;
        self.branches.advance_from(into, &into_head, &commit.hash)?;
        self.flush_if_configured()?;
        info!(
            commit = %to_hex(&commit.hash),
            source = %source,
            into = %into,
            applied = writes.len(),
            "Merged"
        );
        Ok(MergeOutcome::Merged {
            commit: commit.as_ref().clone(),
            applied: writes.len(),
        })
    }

    /// Summary of stored state; also verifies the default branch head loads.
    pub fn health(&self) -> Result<HealthReport, ApiError> {
        let branches = self.branches.list()?;
        let default_head = branches
            .iter()
            .find(|b| b.name == self.default_branch())
            .map(|b| b.head_commit);
        let healthy = match &default_head {
            Some(head) => self.graph.get(head).is_ok(),
            None => true,
        };
        Ok(HealthReport {
            healthy,
            backend: self.config.storage.backend,
            objects: self.objects.len()?,
            commits: self.graph.list()?.len(),
            branches: branches.len(),
            default_branch: self.default_branch().to_string(),
            default_head: default_head.map(|h| to_hex(&h)),
        })
    }

    fn flush_if_configured(&self) -> Result<(), ApiError> {
        if self.config.storage.flush_on_commit {
            self.objects.flush()?;
            self.refs.flush()?;
        }
        Ok(())
    }
}
