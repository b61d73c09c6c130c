//! Snapshot node types

use crate::types::{hex_hash, Hash, NodeID};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Permissions recorded on files written without an explicit override.
pub const DEFAULT_FILE_PERMISSIONS: &str = "644";

/// Permissions recorded on every directory.
pub const DIRECTORY_PERMISSIONS: &str = "755";

/// Key used for the root node of every snapshot.
pub const ROOT_KEY: &str = "/";

/// Node type enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeType {
    Directory,
    File,
}

impl NodeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeType::Directory => "directory",
            NodeType::File => "file",
        }
    }
}

/// Metadata carried by every node and covered by its hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeMetadata {
    pub last_modified: DateTime<Utc>,
    /// Byte length of the value; always `None` for directories.
    pub size: Option<u64>,
    pub permissions: String,
}

/// File node: a leaf holding a value by content hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileNode {
    pub content_hash: Hash,
    pub metadata: NodeMetadata,
}

impl FileNode {
    pub fn new(
        content_hash: Hash,
        size: u64,
        last_modified: DateTime<Utc>,
        permissions: String,
    ) -> Self {
        Self {
            content_hash,
            metadata: NodeMetadata {
                last_modified,
                size: Some(size),
                permissions,
            },
        }
    }

    pub fn size(&self) -> u64 {
        self.metadata.size.unwrap_or(0)
    }
}

/// Directory node representation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryNode {
    pub children: Vec<(String, NodeID)>, // (key, node_id) sorted by key
    pub metadata: NodeMetadata,
}

impl DirectoryNode {
    /// Build a directory; children are sorted by key so the encoding is canonical.
    pub fn new(mut children: Vec<(String, NodeID)>, last_modified: DateTime<Utc>) -> Self {
        children.sort_by(|a, b| a.0.cmp(&b.0));
        Self {
            children,
            metadata: NodeMetadata {
                last_modified,
                size: None,
                permissions: DIRECTORY_PERMISSIONS.to_string(),
            },
        }
    }

    pub fn child(&self, key: &str) -> Option<NodeID> {
        self.children
            .binary_search_by(|(k, _)| k.as_str().cmp(key))
            .ok()
            .map(|idx| self.children[idx].1)
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }
}

/// Merkle node type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MerkleNode {
    File(FileNode),
    Directory(DirectoryNode),
}

impl MerkleNode {
    pub fn node_type(&self) -> NodeType {
        match self {
            MerkleNode::File(_) => NodeType::File,
            MerkleNode::Directory(_) => NodeType::Directory,
        }
    }

    pub fn metadata(&self) -> &NodeMetadata {
        match self {
            MerkleNode::File(file) => &file.metadata,
            MerkleNode::Directory(dir) => &dir.metadata,
        }
    }

    pub fn as_directory(&self) -> Option<&DirectoryNode> {
        match self {
            MerkleNode::Directory(dir) => Some(dir),
            MerkleNode::File(_) => None,
        }
    }

    pub fn as_file(&self) -> Option<&FileNode> {
        match self {
            MerkleNode::File(file) => Some(file),
            MerkleNode::Directory(_) => None,
        }
    }
}

/// Fully materialized snapshot node as returned to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotNode {
    pub key: String,
    #[serde(with = "hex_hash")]
    pub hash: NodeID,
    pub value: Option<String>,
    pub node_type: NodeType,
    pub children: BTreeMap<String, SnapshotNode>,
    pub metadata: NodeMetadata,
}

impl SnapshotNode {
    /// Number of file nodes in this subtree.
    pub fn leaf_count(&self) -> usize {
        match self.node_type {
            NodeType::File => 1,
            NodeType::Directory => self.children.values().map(|c| c.leaf_count()).sum(),
        }
    }
}
