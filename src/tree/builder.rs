//! Copy-on-write tree construction.
//!
//! A [`TreeBuilder`] holds a private draft of the new snapshot. Untouched
//! subtrees stay as references to stored nodes; directories on written paths
//! are opened into editable maps. Nothing is published to the object store
//! until [`TreeBuilder::build`].

use super::node::{DirectoryNode, FileNode, MerkleNode, NodeMetadata, NodeType, DEFAULT_FILE_PERMISSIONS};
use super::path::{join_path, split_path};
use super::{epoch, SnapshotTree};
use crate::error::ApiError;
use crate::store::content_hash;
use crate::types::NodeID;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

/// A single key write. `value: None` deletes the key (or the whole subtree
/// when the path names a directory).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Write {
    pub path: String,
    pub value: Option<String>,
    /// Explicit metadata for the written leaf. `size` is ignored and always
    /// recomputed from the value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<NodeMetadata>,
}

impl Write {
    pub fn put(path: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            value: Some(value.into()),
            metadata: None,
        }
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            value: None,
            metadata: None,
        }
    }

    pub fn with_metadata(mut self, metadata: NodeMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

enum Draft {
    Stored(NodeID),
    File {
        value: String,
        last_modified: DateTime<Utc>,
        permissions: String,
    },
    Directory(BTreeMap<String, Draft>),
}

impl Draft {
    /// True when `finalize` would prune this draft: a directory holding no
    /// leaves at any depth.
    fn is_empty(&self) -> bool {
        match self {
            Draft::Directory(children) => children.values().all(Draft::is_empty),
            Draft::Stored(_) | Draft::File { .. } => false,
        }
    }
}

fn mismatch(path: &str, expected: NodeType, found: NodeType) -> ApiError {
    ApiError::TypeMismatch {
        path: path.to_string(),
        expected: expected.as_str(),
        found: found.as_str(),
    }
}

/// Builder for a new snapshot derived from a base root.
pub struct TreeBuilder<'a> {
    tree: &'a SnapshotTree,
    root: Draft,
    now: DateTime<Utc>,
}

impl<'a> TreeBuilder<'a> {
    pub fn new(tree: &'a SnapshotTree, base: NodeID, now: DateTime<Utc>) -> Self {
        Self {
            tree,
            root: Draft::Stored(base),
            now,
        }
    }

    /// Stage one write into the draft.
    pub fn write(&mut self, write: &Write) -> Result<(), ApiError> {
        let segments = split_path(&write.path)?;
        if segments.is_empty() {
            return Err(ApiError::InvalidPath(format!(
                "{}: cannot write the root",
                write.path
            )));
        }
        let tree = self.tree;
        let now = self.now;
        let root = open_directory(tree, &mut self.root, "/")?;
        write_path(tree, root, "/", &segments, write, now)
    }

    /// Publish the draft and return the new root hash.
    pub fn build(self) -> Result<NodeID, ApiError> {
        match finalize(self.tree, self.root, true)? {
            Some((root, _)) => Ok(root),
            None => self.tree.empty_root(),
        }
    }
}

/// Turn a stored directory into an editable map of stored children.
fn open_directory<'d>(
    tree: &SnapshotTree,
    draft: &'d mut Draft,
    path: &str,
) -> Result<&'d mut BTreeMap<String, Draft>, ApiError> {
    if let Draft::Stored(node_id) = *draft {
        let node = tree.load(&node_id)?;
        match node.as_ref() {
            MerkleNode::Directory(dir) => {
                let children = dir
                    .children
                    .iter()
                    .map(|(key, id)| (key.clone(), Draft::Stored(*id)))
                    .collect();
                *draft = Draft::Directory(children);
            }
            MerkleNode::File(_) => {
                return Err(mismatch(path, NodeType::Directory, NodeType::File))
            }
        }
    }
    match draft {
        Draft::Directory(children) => Ok(children),
        Draft::File { .. } | Draft::Stored(_) => {
            Err(mismatch(path, NodeType::Directory, NodeType::File))
        }
    }
}

fn write_path(
    tree: &SnapshotTree,
    dir: &mut BTreeMap<String, Draft>,
    parent: &str,
    segments: &[&str],
    write: &Write,
    now: DateTime<Utc>,
) -> Result<(), ApiError> {
    let Some((head, rest)) = segments.split_first() else {
        return Ok(());
    };
    let path = join_path(parent, head);

    if rest.is_empty() {
        return set_leaf(tree, dir, head, &path, write, now);
    }

    let child = match dir.entry(head.to_string()) {
        Entry::Occupied(entry) => entry.into_mut(),
        Entry::Vacant(entry) => {
            if write.value.is_none() {
                // Deleting below a missing directory is a no-op.
                return Ok(());
            }
            entry.insert(Draft::Directory(BTreeMap::new()))
        }
    };
    let children = open_directory(tree, child, &path)?;
    write_path(tree, children, &path, rest, write, now)
}

fn set_leaf(
    tree: &SnapshotTree,
    dir: &mut BTreeMap<String, Draft>,
    key: &str,
    path: &str,
    write: &Write,
    now: DateTime<Utc>,
) -> Result<(), ApiError> {
    let Some(value) = &write.value else {
        dir.remove(key);
        return Ok(());
    };

    match dir.get(key) {
        Some(Draft::Stored(node_id)) => match tree.load(node_id)?.as_ref() {
            MerkleNode::Directory(_) => {
                return Err(mismatch(path, NodeType::File, NodeType::Directory))
            }
            MerkleNode::File(file) => {
                if write.metadata.is_none() && file.content_hash == content_hash(value.as_bytes())
                {
                    // Same value: keep the existing leaf untouched.
                    return Ok(());
                }
            }
        },
        // A draft directory emptied earlier in this batch no longer exists.
        Some(draft @ Draft::Directory(_)) if !draft.is_empty() => {
            return Err(mismatch(path, NodeType::File, NodeType::Directory))
        }
        Some(Draft::Directory(_)) | Some(Draft::File { .. }) | None => {}
    }

    let (last_modified, permissions) = match &write.metadata {
        Some(meta) => (meta.last_modified, meta.permissions.clone()),
        None => (now, DEFAULT_FILE_PERMISSIONS.to_string()),
    };
    dir.insert(
        key.to_string(),
        Draft::File {
            value: value.clone(),
            last_modified,
            permissions,
        },
    );
    Ok(())
}

/// Store a draft bottom-up. Returns `None` for directories left empty
/// (except the root), which removes them from their parent.
fn finalize(
    tree: &SnapshotTree,
    draft: Draft,
    is_root: bool,
) -> Result<Option<(NodeID, DateTime<Utc>)>, ApiError> {
    match draft {
        Draft::Stored(node_id) => {
            let node = tree.load(&node_id)?;
            Ok(Some((node_id, node.metadata().last_modified)))
        }
        Draft::File {
            value,
            last_modified,
            permissions,
        } => {
            let content_hash = tree.put_value(&value)?;
            let node = FileNode::new(content_hash, value.len() as u64, last_modified, permissions);
            let node_id = tree.put_node(MerkleNode::File(node))?;
            Ok(Some((node_id, last_modified)))
        }
        Draft::Directory(children) => {
            let mut entries = Vec::with_capacity(children.len());
            let mut newest: Option<DateTime<Utc>> = None;
            for (key, child) in children {
                if let Some((child_id, modified)) = finalize(tree, child, false)? {
                    newest = Some(newest.map_or(modified, |n| n.max(modified)));
                    entries.push((key, child_id));
                }
            }
            if entries.is_empty() && !is_root {
                return Ok(None);
            }
            let last_modified = newest.unwrap_or_else(epoch);
            let node_id = tree.put_node(MerkleNode::Directory(DirectoryNode::new(
                entries,
                last_modified,
            )))?;
            Ok(Some((node_id, last_modified)))
        }
    }
}
