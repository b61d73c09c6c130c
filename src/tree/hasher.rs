//! Canonical encoding and NodeID computation for snapshot nodes

use crate::error::StorageError;
use crate::store::content_hash;
use crate::tree::node::MerkleNode;
use crate::types::NodeID;

/// Encode a node into the bytes stored in the object store.
///
/// The encoding covers the node type, the value's content hash, the sorted
/// `(key, child hash)` pairs and the metadata. The node's own key is not
/// encoded, so identical subtrees under different names share one object.
pub fn encode_node(node: &MerkleNode) -> Result<Vec<u8>, StorageError> {
    Ok(bincode::serialize(node)?)
}

pub fn decode_node(bytes: &[u8]) -> Result<MerkleNode, StorageError> {
    Ok(bincode::deserialize(bytes)?)
}

/// Compute NodeID for a snapshot node without storing it.
pub fn compute_node_id(node: &MerkleNode) -> Result<NodeID, StorageError> {
    Ok(content_hash(&encode_node(node)?))
}
