//! Commit Graph
//!
//! Commits are content-addressed: the hash covers the root snapshot, message,
//! author, timestamp and the ordered parent hashes. Since a parent must exist
//! before its child can be hashed, the graph is acyclic by construction; the
//! traversals below still carry a step budget so that damaged or hostile
//! storage surfaces as `MalformedGraph` instead of an endless walk.
//!
//! The branch a commit was created on, its generation number (1 for the
//! root commit, otherwise 1 + the highest parent generation) and its
//! first-parent depth are recorded in the ref store next to the commit,
//! outside the hashed body.

use crate::error::{ApiError, StorageError};
use crate::store::{content_hash, ObjectStore, RefStore};
use crate::types::{hex_hash, hex_hashes, to_hex, CommitID, NodeID};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Ref key prefix for commit annotations.
pub const COMMIT_PREFIX: &str = "commit/";

/// Ref key holding the repository's single parentless commit.
const ROOT_COMMIT_KEY: &str = "root-commit";

pub const DEFAULT_MAX_TRAVERSAL: usize = 1_000_000;

/// Hashed portion of a commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct CommitBody {
    root: NodeID,
    message: String,
    author: String,
    timestamp: DateTime<Utc>,
    parents: Vec<CommitID>,
}

/// Unhashed commit annotation, written once at creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct CommitAnnotation {
    branch: String,
    generation: u64,
    depth: u64,
}

/// Commit record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commit {
    #[serde(with = "hex_hash")]
    pub hash: CommitID,
    #[serde(with = "hex_hash")]
    pub root: NodeID,
    pub message: String,
    pub author: String,
    pub timestamp: DateTime<Utc>,
    #[serde(with = "hex_hashes")]
    pub parents: Vec<CommitID>,
    pub branch: String,
    pub generation: u64,
    /// Length of the first-parent chain ending at this commit.
    pub depth: u64,
}

impl Commit {
    pub fn is_merge(&self) -> bool {
        self.parents.len() > 1
    }

    pub fn first_parent(&self) -> Option<CommitID> {
        self.parents.first().copied()
    }

    pub fn short_hash(&self) -> String {
        to_hex(&self.hash)[..12].to_string()
    }
}

fn commit_key(hash: &CommitID) -> String {
    format!("{}{}", COMMIT_PREFIX, to_hex(hash))
}

/// Heap entry ordering commits newest first: children always have a higher
/// generation than their parents, so they are popped before them.
struct Pending(Arc<Commit>);

impl PartialEq for Pending {
    fn eq(&self, other: &Self) -> bool {
        self.0.hash == other.0.hash
    }
}

impl Eq for Pending {}

impl Ord for Pending {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0
            .generation
            .cmp(&other.0.generation)
            .then_with(|| self.0.timestamp.cmp(&other.0.timestamp))
            .then_with(|| self.0.hash.cmp(&other.0.hash))
    }
}

impl PartialOrd for Pending {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Commit DAG over the object and ref stores.
pub struct CommitGraph {
    objects: Arc<dyn ObjectStore>,
    refs: Arc<dyn RefStore>,
    cache: RwLock<HashMap<CommitID, Arc<Commit>>>,
    max_traversal: usize,
}

impl CommitGraph {
    pub fn new(objects: Arc<dyn ObjectStore>, refs: Arc<dyn RefStore>, max_traversal: usize) -> Self {
        Self {
            objects,
            refs,
            cache: RwLock::new(HashMap::new()),
            max_traversal,
        }
    }

    /// Create (or find the identical existing) commit.
    pub fn commit(
        &self,
        root: NodeID,
        message: &str,
        author: &str,
        timestamp: DateTime<Utc>,
        parents: Vec<CommitID>,
        branch: &str,
    ) -> Result<Arc<Commit>, ApiError> {
        if !self.objects.contains(&root)? {
            return Err(ApiError::ObjectNotFound(root));
        }
        let mut seen = HashSet::new();
        for parent in &parents {
            if !seen.insert(*parent) {
                return Err(ApiError::InvalidCommit(format!(
                    "duplicate parent {}",
                    to_hex(parent)
                )));
            }
        }
        let mut generation = 1;
        let mut depth = 1;
        for (i, parent) in parents.iter().enumerate() {
            let parent = self.get(parent)?;
            generation = generation.max(parent.generation + 1);
            if i == 0 {
                depth = parent.depth + 1;
            }
        }

        let body = CommitBody {
            root,
            message: message.to_string(),
            author: author.to_string(),
            timestamp,
            parents,
        };
        let bytes = bincode::serialize(&body).map_err(StorageError::from)?;
        let hash = content_hash(&bytes);

        let annotation = CommitAnnotation {
            branch: branch.to_string(),
            generation,
            depth,
        };
        let encoded = bincode::serialize(&annotation).map_err(StorageError::from)?;

        // The annotation makes the commit visible, so it is written last.
        self.objects.put(&bytes)?;
        let claimed_root = body.parents.is_empty() && self.claim_root(&hash)?;
        let created = match self
            .refs
            .compare_and_swap(&commit_key(&hash), None, Some(encoded.as_slice()))
        {
            Ok(created) => created,
            Err(e) => {
                if claimed_root {
                    self.release_root(&hash);
                }
                return Err(e.into());
            }
        };
        if !created {
            debug!(commit = %to_hex(&hash), "Commit already exists, reusing");
            return self.get(&hash);
        }

        let commit = Arc::new(Commit {
            hash,
            root: body.root,
            message: body.message,
            author: body.author,
            timestamp: body.timestamp,
            parents: body.parents,
            branch: annotation.branch,
            generation,
            depth,
        });
        self.cache.write().insert(hash, commit.clone());
        info!(
            commit = %to_hex(&hash),
            branch = %commit.branch,
            parents = commit.parents.len(),
            generation,
            "Created commit"
        );
        Ok(commit)
    }

    /// Record `hash` as the repository's root commit. Returns false when it
    /// already was; any other existing root is an error.
    fn claim_root(&self, hash: &CommitID) -> Result<bool, ApiError> {
        if self
            .refs
            .compare_and_swap(ROOT_COMMIT_KEY, None, Some(&hash[..]))?
        {
            return Ok(true);
        }
        if self.refs.get(ROOT_COMMIT_KEY)?.as_deref() == Some(&hash[..]) {
            return Ok(false);
        }
        Err(ApiError::InvalidCommit(
            "repository already has a root commit; a commit needs at least one parent".to_string(),
        ))
    }

    fn release_root(&self, hash: &CommitID) {
        if let Err(e) = self
            .refs
            .compare_and_swap(ROOT_COMMIT_KEY, Some(&hash[..]), None)
        {
            warn!(commit = %to_hex(hash), error = %e, "Failed to release root commit claim");
        }
    }

    /// Load a commit by hash.
    pub fn get(&self, hash: &CommitID) -> Result<Arc<Commit>, ApiError> {
        if let Some(commit) = self.cache.read().get(hash) {
            return Ok(commit.clone());
        }
        let annotation_bytes = self
            .refs
            .get(&commit_key(hash))?
            .ok_or_else(|| ApiError::CommitNotFound(to_hex(hash)))?;
        let annotation: CommitAnnotation =
            bincode::deserialize(&annotation_bytes).map_err(StorageError::from)?;
        let bytes = self.objects.get(hash).map_err(|e| match e {
            StorageError::NotFound(_) => ApiError::MalformedGraph(format!(
                "commit {} is registered but its body is missing",
                to_hex(hash)
            )),
            other => ApiError::from(other),
        })?;
        let body: CommitBody = bincode::deserialize(&bytes).map_err(StorageError::from)?;
        let commit = Arc::new(Commit {
            hash: *hash,
            root: body.root,
            message: body.message,
            author: body.author,
            timestamp: body.timestamp,
            parents: body.parents,
            branch: annotation.branch,
            generation: annotation.generation,
            depth: annotation.depth,
        });
        self.cache.write().insert(*hash, commit.clone());
        Ok(commit)
    }

    pub fn contains(&self, hash: &CommitID) -> Result<bool, ApiError> {
        if self.cache.read().contains_key(hash) {
            return Ok(true);
        }
        Ok(self.refs.get(&commit_key(hash))?.is_some())
    }

    /// Load a parent referenced by `child`; absence is a graph integrity failure.
    fn load_parent(&self, child: &Commit, parent: &CommitID) -> Result<Arc<Commit>, ApiError> {
        self.get(parent).map_err(|e| match e {
            ApiError::CommitNotFound(_) => ApiError::MalformedGraph(format!(
                "commit {} references missing parent {}",
                to_hex(&child.hash),
                to_hex(parent)
            )),
            other => other,
        })
    }

    fn budget_exceeded(&self, start: &CommitID) -> ApiError {
        ApiError::MalformedGraph(format!(
            "traversal from {} exceeded {} steps",
            to_hex(start),
            self.max_traversal
        ))
    }

    /// Lazily enumerate `hash` and all of its ancestors, children first.
    pub fn ancestors(&self, hash: &CommitID) -> Result<Ancestors<'_>, ApiError> {
        let start = self.get(hash)?;
        let mut queue = BinaryHeap::new();
        let mut visited = HashSet::new();
        visited.insert(start.hash);
        queue.push(Pending(start));
        Ok(Ancestors {
            graph: self,
            start: *hash,
            queue,
            visited,
            steps: 0,
            failed: false,
        })
    }

    /// True iff `ancestor` is reachable from `descendant` along parent edges
    /// (including `ancestor == descendant`).
    pub fn is_ancestor(&self, ancestor: &CommitID, descendant: &CommitID) -> Result<bool, ApiError> {
        let target = self.get(ancestor)?;
        let start = self.get(descendant)?;
        if target.hash == start.hash {
            return Ok(true);
        }

        let mut stack = vec![start];
        let mut visited = HashSet::new();
        let mut steps = 0usize;
        while let Some(commit) = stack.pop() {
            steps += 1;
            if steps > self.max_traversal {
                return Err(self.budget_exceeded(descendant));
            }
            for parent in &commit.parents {
                if *parent == target.hash {
                    return Ok(true);
                }
                if !visited.insert(*parent) {
                    continue;
                }
                let parent = self.load_parent(&commit, parent)?;
                // Every ancestor of `target` has a lower generation than it.
                if parent.generation > target.generation {
                    stack.push(parent);
                }
            }
        }
        Ok(false)
    }

    /// Hashes along the first-parent chain starting at `hash` (inclusive).
    pub fn first_parent_chain(&self, hash: &CommitID) -> Result<Vec<CommitID>, ApiError> {
        let mut chain = Vec::new();
        let mut current = self.get(hash)?;
        loop {
            chain.push(current.hash);
            if chain.len() > self.max_traversal {
                return Err(self.budget_exceeded(hash));
            }
            match current.first_parent() {
                Some(parent) => current = self.load_parent(&current, &parent)?,
                None => return Ok(chain),
            }
        }
    }

    /// A best common ancestor of `a` and `b`: the common ancestor with the
    /// highest generation (ties broken by timestamp, then hash).
    pub fn merge_base(&self, a: &CommitID, b: &CommitID) -> Result<Option<CommitID>, ApiError> {
        let mut reachable = HashSet::new();
        for commit in self.ancestors(a)? {
            reachable.insert(commit?.hash);
        }
        for commit in self.ancestors(b)? {
            let commit = commit?;
            if reachable.contains(&commit.hash) {
                return Ok(Some(commit.hash));
            }
        }
        Ok(None)
    }

    /// Every commit in the repository, newest first.
    pub fn list(&self) -> Result<Vec<Arc<Commit>>, ApiError> {
        let mut commits = Vec::new();
        for (key, _) in self.refs.scan_prefix(COMMIT_PREFIX)? {
            let hash = crate::types::parse_hash(&key[COMMIT_PREFIX.len()..])?;
            commits.push(self.get(&hash)?);
        }
        commits.sort_by(|a, b| {
            b.timestamp
                .cmp(&a.timestamp)
                .then_with(|| b.generation.cmp(&a.generation))
                .then_with(|| a.hash.cmp(&b.hash))
        });
        Ok(commits)
    }

    /// Commits whose hex hash starts with `prefix`.
    pub fn find_by_prefix(&self, prefix: &str) -> Result<Vec<CommitID>, ApiError> {
        let prefix = prefix.to_ascii_lowercase();
        self.refs
            .scan_prefix(&format!("{}{}", COMMIT_PREFIX, prefix))?
            .into_iter()
            .map(|(key, _)| crate::types::parse_hash(&key[COMMIT_PREFIX.len()..]))
            .collect()
    }
}

/// Lazy ancestor iterator returned by [`CommitGraph::ancestors`].
pub struct Ancestors<'g> {
    graph: &'g CommitGraph,
    start: CommitID,
    queue: BinaryHeap<Pending>,
    visited: HashSet<CommitID>,
    steps: usize,
    failed: bool,
}

impl<'g> Iterator for Ancestors<'g> {
    type Item = Result<Arc<Commit>, ApiError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        let Pending(commit) = self.queue.pop()?;
        self.steps += 1;
        if self.steps > self.graph.max_traversal {
            self.failed = true;
            return Some(Err(self.graph.budget_exceeded(&self.start)));
        }
        for parent in &commit.parents {
            if !self.visited.insert(*parent) {
                continue;
            }
            match self.graph.load_parent(&commit, parent) {
                Ok(parent) => self.queue.push(Pending(parent)),
                Err(e) => {
                    self.failed = true;
                    return Some(Err(e));
                }
            }
        }
        Some(Ok(commit))
    }
}
