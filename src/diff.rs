//! Diff Engine
//!
//! Structural comparison of two snapshots. Both trees are walked in lockstep,
//! child lists merged by key; subtrees with equal hashes are skipped without
//! being loaded, so unchanged regions cost O(1) regardless of their size.
//! Only leaves are reported.

use crate::error::ApiError;
use crate::graph::CommitGraph;
use crate::tree::path::join_path;
use crate::tree::{MerkleNode, NodeMetadata, SnapshotTree, Write};
use crate::types::{hex_hash, CommitID, NodeID};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use tracing::debug;

/// Types of changes in a diff
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChangeType {
    Added,
    Modified,
    Deleted,
}

/// Individual change in a diff
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Change {
    pub path: String,
    pub change_type: ChangeType,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
    /// Metadata of the new leaf, so the change can be replayed exactly.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_metadata: Option<NodeMetadata>,
}

impl Change {
    /// The write that reproduces this change on the old snapshot.
    pub fn to_write(&self) -> Write {
        match (&self.new_value, &self.new_metadata) {
            (Some(value), Some(meta)) => {
                Write::put(self.path.clone(), value.clone()).with_metadata(meta.clone())
            }
            (Some(value), None) => Write::put(self.path.clone(), value.clone()),
            (None, _) => Write::delete(self.path.clone()),
        }
    }
}

/// Writes that turn the old snapshot of `changes` into the new one.
///
/// Deletions come first: when a directory became a file, the file's
/// addition sorts before the deletions of the directory's leaves.
pub fn to_writes(changes: &[Change]) -> Vec<Write> {
    let (deletes, puts): (Vec<&Change>, Vec<&Change>) = changes
        .iter()
        .partition(|c| c.change_type == ChangeType::Deleted);
    deletes.into_iter().chain(puts).map(Change::to_write).collect()
}

/// Diff between two commits
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitDiff {
    #[serde(with = "hex_hash")]
    pub from_commit: CommitID,
    #[serde(with = "hex_hash")]
    pub to_commit: CommitID,
    pub changes: Vec<Change>,
}

/// Diff the snapshots of two commits.
pub fn diff_commits(
    graph: &CommitGraph,
    tree: &SnapshotTree,
    from: &CommitID,
    to: &CommitID,
) -> Result<CommitDiff, ApiError> {
    let from_commit = graph.get(from)?;
    let to_commit = graph.get(to)?;
    let changes = if from == to {
        Vec::new()
    } else {
        diff_trees(tree, &from_commit.root, &to_commit.root)?
    };
    Ok(CommitDiff {
        from_commit: *from,
        to_commit: *to,
        changes,
    })
}

/// Diff two snapshot roots. Changes are ordered by path.
pub fn diff_trees(tree: &SnapshotTree, from: &NodeID, to: &NodeID) -> Result<Vec<Change>, ApiError> {
    let mut changes = Vec::new();
    if from != to {
        diff_pair(tree, "/", from, to, &mut changes)?;
        changes.sort_by(|a, b| a.path.cmp(&b.path));
    }
    debug!(changes = changes.len(), "Computed tree diff");
    Ok(changes)
}

fn diff_pair(
    tree: &SnapshotTree,
    path: &str,
    from: &NodeID,
    to: &NodeID,
    out: &mut Vec<Change>,
) -> Result<(), ApiError> {
    if from == to {
        return Ok(());
    }
    let old = tree.load(from)?;
    let new = tree.load(to)?;
    match (old.as_ref(), new.as_ref()) {
        (MerkleNode::File(a), MerkleNode::File(b)) => {
            if a.content_hash != b.content_hash {
                out.push(Change {
                    path: path.to_string(),
                    change_type: ChangeType::Modified,
                    old_value: Some(tree.read_value(&a.content_hash)?),
                    new_value: Some(tree.read_value(&b.content_hash)?),
                    new_metadata: Some(b.metadata.clone()),
                });
            }
        }
        (MerkleNode::Directory(a), MerkleNode::Directory(b)) => {
            let (mut i, mut j) = (0, 0);
            while i < a.children.len() || j < b.children.len() {
                let ordering = match (a.children.get(i), b.children.get(j)) {
                    (Some((ka, _)), Some((kb, _))) => ka.cmp(kb),
                    (Some(_), None) => Ordering::Less,
                    (None, _) => Ordering::Greater,
                };
                match ordering {
                    Ordering::Less => {
                        let (key, id) = &a.children[i];
                        emit_subtree(tree, &join_path(path, key), id, ChangeType::Deleted, out)?;
                        i += 1;
                    }
                    Ordering::Greater => {
                        let (key, id) = &b.children[j];
                        emit_subtree(tree, &join_path(path, key), id, ChangeType::Added, out)?;
                        j += 1;
                    }
                    Ordering::Equal => {
                        let (key, old_id) = &a.children[i];
                        let (_, new_id) = &b.children[j];
                        diff_pair(tree, &join_path(path, key), old_id, new_id, out)?;
                        i += 1;
                        j += 1;
                    }
                }
            }
        }
        // A type change is a deletion of the old entry plus an addition of the new one.
        _ => {
            emit_subtree(tree, path, from, ChangeType::Deleted, out)?;
            emit_subtree(tree, path, to, ChangeType::Added, out)?;
        }
    }
    Ok(())
}

/// Report every leaf below `node_id` as added or deleted.
fn emit_subtree(
    tree: &SnapshotTree,
    path: &str,
    node_id: &NodeID,
    change_type: ChangeType,
    out: &mut Vec<Change>,
) -> Result<(), ApiError> {
    let node = tree.load(node_id)?;
    match node.as_ref() {
        MerkleNode::File(file) => {
            let value = tree.read_value(&file.content_hash)?;
            let change = match change_type {
                ChangeType::Deleted => Change {
                    path: path.to_string(),
                    change_type,
                    old_value: Some(value),
                    new_value: None,
                    new_metadata: None,
                },
                _ => Change {
                    path: path.to_string(),
                    change_type,
                    old_value: None,
                    new_value: Some(value),
                    new_metadata: Some(file.metadata.clone()),
                },
            };
            out.push(change);
        }
        MerkleNode::Directory(dir) => {
            for (key, child) in &dir.children {
                emit_subtree(tree, &join_path(path, key), child, change_type, out)?;
            }
        }
    }
    Ok(())
}
