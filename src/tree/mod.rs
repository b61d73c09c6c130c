//! Snapshot Tree
//!
//! Immutable, content-addressed hierarchical map. Nodes live in the object
//! store keyed by their content hash; a snapshot is just the hash of its root.
//! Because nodes are never mutated, decoded nodes are cached per hash and
//! shared between snapshots.

pub mod builder;
pub mod hasher;
pub mod node;
pub mod path;

pub use builder::{TreeBuilder, Write};
pub use node::{
    DirectoryNode, FileNode, MerkleNode, NodeMetadata, NodeType, SnapshotNode, ROOT_KEY,
};

use crate::error::{ApiError, StorageError};
use crate::store::ObjectStore;
use crate::types::{to_hex, Hash, NodeID};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::debug;

const DEFAULT_NODE_CACHE_CAPACITY: usize = 65_536;

/// Timestamp used for directories without children.
pub fn epoch() -> DateTime<Utc> {
    DateTime::<Utc>::default()
}

/// One node visited by [`SnapshotTree::walk`].
#[derive(Debug, Clone)]
pub struct WalkEntry {
    pub path: String,
    pub key: String,
    pub node_id: NodeID,
    pub node: Arc<MerkleNode>,
}

/// Access to snapshot nodes stored in an object store.
pub struct SnapshotTree {
    objects: Arc<dyn ObjectStore>,
    cache: RwLock<HashMap<NodeID, Arc<MerkleNode>>>,
    cache_capacity: usize,
}

impl SnapshotTree {
    pub fn new(objects: Arc<dyn ObjectStore>) -> Self {
        Self::with_cache_capacity(objects, DEFAULT_NODE_CACHE_CAPACITY)
    }

    pub fn with_cache_capacity(objects: Arc<dyn ObjectStore>, cache_capacity: usize) -> Self {
        Self {
            objects,
            cache: RwLock::new(HashMap::new()),
            cache_capacity,
        }
    }

    pub fn objects(&self) -> &Arc<dyn ObjectStore> {
        &self.objects
    }

    /// Store the empty root directory and return its hash.
    pub fn empty_root(&self) -> Result<NodeID, ApiError> {
        self.put_node(MerkleNode::Directory(DirectoryNode::new(Vec::new(), epoch())))
    }

    /// Encode and store a node, returning its content hash.
    pub fn put_node(&self, node: MerkleNode) -> Result<NodeID, ApiError> {
        let bytes = hasher::encode_node(&node)?;
        let node_id = self.objects.put(&bytes)?;
        self.remember(node_id, Arc::new(node));
        Ok(node_id)
    }

    /// Load a node by hash.
    pub fn load(&self, node_id: &NodeID) -> Result<Arc<MerkleNode>, ApiError> {
        if let Some(node) = self.cache.read().get(node_id) {
            return Ok(node.clone());
        }
        let bytes = self.objects.get(node_id)?;
        let node = Arc::new(hasher::decode_node(&bytes).map_err(|e| {
            ApiError::StorageError(StorageError::Serialization(format!(
                "object {} is not a snapshot node: {}",
                to_hex(node_id),
                e
            )))
        })?);
        self.remember(*node_id, node.clone());
        Ok(node)
    }

    fn remember(&self, node_id: NodeID, node: Arc<MerkleNode>) {
        let mut cache = self.cache.write();
        if cache.len() >= self.cache_capacity {
            debug!(entries = cache.len(), "Node cache full, clearing");
            cache.clear();
        }
        cache.insert(node_id, node);
    }

    /// Store a value blob.
    pub fn put_value(&self, value: &str) -> Result<Hash, ApiError> {
        Ok(self.objects.put(value.as_bytes())?)
    }

    /// Load a value blob.
    pub fn read_value(&self, content_hash: &Hash) -> Result<String, ApiError> {
        let bytes = self.objects.get(content_hash)?;
        String::from_utf8(bytes).map_err(|e| {
            ApiError::StorageError(StorageError::Serialization(format!(
                "value {} is not UTF-8: {}",
                to_hex(content_hash),
                e
            )))
        })
    }

    /// Resolve `path` under `root` in O(depth).
    pub fn resolve(&self, root: &NodeID, path: &str) -> Result<(NodeID, Arc<MerkleNode>), ApiError> {
        let segments = path::split_path(path)?;
        let mut current_id = *root;
        let mut current = self.load(root)?;
        for segment in segments {
            let dir = current
                .as_directory()
                .ok_or_else(|| ApiError::PathNotFound(path.to_string()))?;
            current_id = dir
                .child(segment)
                .ok_or_else(|| ApiError::PathNotFound(path.to_string()))?;
            current = self.load(&current_id)?;
        }
        Ok((current_id, current))
    }

    /// Resolve the value of the file at `path`.
    pub fn resolve_value(&self, root: &NodeID, path: &str) -> Result<String, ApiError> {
        let (_, node) = self.resolve(root, path)?;
        match node.as_ref() {
            MerkleNode::File(file) => self.read_value(&file.content_hash),
            MerkleNode::Directory(_) => Err(ApiError::TypeMismatch {
                path: path::normalize_path(path)?,
                expected: NodeType::File.as_str(),
                found: NodeType::Directory.as_str(),
            }),
        }
    }

    /// Materialize the whole snapshot rooted at `root`.
    pub fn materialize(&self, root: &NodeID) -> Result<SnapshotNode, ApiError> {
        self.materialize_node(ROOT_KEY, root)
    }

    /// Materialize the subtree at `node_id`, labelled with `key`.
    pub fn materialize_node(&self, key: &str, node_id: &NodeID) -> Result<SnapshotNode, ApiError> {
        self.materialize_with(key, node_id, true)
    }

    /// The node at `node_id` alone: files carry their value, directories come
    /// back with no children.
    pub fn materialize_shallow(&self, key: &str, node_id: &NodeID) -> Result<SnapshotNode, ApiError> {
        self.materialize_with(key, node_id, false)
    }

    fn materialize_with(&self, key: &str, node_id: &NodeID, deep: bool) -> Result<SnapshotNode, ApiError> {
        let node = self.load(node_id)?;
        let (value, children) = match node.as_ref() {
            MerkleNode::File(file) => (Some(self.read_value(&file.content_hash)?), BTreeMap::new()),
            MerkleNode::Directory(dir) => {
                let mut children = BTreeMap::new();
                if deep {
                    for (child_key, child_id) in &dir.children {
                        children.insert(child_key.clone(), self.materialize_with(child_key, child_id, true)?);
                    }
                }
                (None, children)
            }
        };
        Ok(SnapshotNode {
            key: key.to_string(),
            hash: *node_id,
            value,
            node_type: node.node_type(),
            children,
            metadata: node.metadata().clone(),
        })
    }

    /// Depth-first enumeration of every node below `root` (root excluded),
    /// children visited in key order.
    pub fn walk(&self, root: &NodeID) -> Result<Vec<WalkEntry>, ApiError> {
        let mut entries = Vec::new();
        let mut stack: Vec<(String, String, NodeID)> = Vec::new();
        if let Some(dir) = self.load(root)?.as_directory() {
            for (key, id) in dir.children.iter().rev() {
                stack.push((path::join_path("/", key), key.clone(), *id));
            }
        }
        while let Some((path, key, node_id)) = stack.pop() {
            let node = self.load(&node_id)?;
            if let Some(dir) = node.as_directory() {
                for (child_key, child_id) in dir.children.iter().rev() {
                    stack.push((path::join_path(&path, child_key), child_key.clone(), *child_id));
                }
            }
            entries.push(WalkEntry {
                path,
                key,
                node_id,
                node,
            });
        }
        Ok(entries)
    }

    /// Apply `writes` on top of `base`, returning the new root.
    ///
    /// Only directories on written paths are rebuilt; every other subtree is
    /// shared with `base` by hash.
    pub fn apply(
        &self,
        base: &NodeID,
        writes: &[Write],
        now: DateTime<Utc>,
    ) -> Result<NodeID, ApiError> {
        let mut builder = TreeBuilder::new(self, *base, now);
        for write in writes {
            builder.write(write)?;
        }
        builder.build()
    }
}
