use chrono::{TimeZone, Utc};
use std::sync::Arc;
use vkv::store::{MemoryObjectStore, ObjectStore};
use vkv::tree::{MerkleNode, NodeType, SnapshotTree, Write};
use vkv::ApiError;

fn tree() -> SnapshotTree {
    SnapshotTree::new(Arc::new(MemoryObjectStore::new()))
}

#[test]
fn unrelated_write_shares_untouched_subtrees() {
    let tree = tree();
    let empty = tree.empty_root().unwrap();
    let v1 = tree
        .apply(
            &empty,
            &[
                Write::put("services/api/port", "8080"),
                Write::put("services/api/host", "localhost"),
                Write::put("users/alice", "admin"),
            ],
            Utc::now(),
        )
        .unwrap();
    let v2 = tree
        .apply(&v1, &[Write::put("users/bob", "viewer")], Utc::now())
        .unwrap();

    assert_ne!(v1, v2);
    let (before, _) = tree.resolve(&v1, "/services").unwrap();
    let (after, _) = tree.resolve(&v2, "/services").unwrap();
    assert_eq!(before, after);
    assert_eq!(tree.resolve_value(&v1, "users/alice").unwrap(), "admin");
    assert!(matches!(
        tree.resolve(&v1, "users/bob"),
        Err(ApiError::PathNotFound(_))
    ));
}

#[test]
fn rewriting_a_snapshot_stores_nothing_new() {
    let objects = Arc::new(MemoryObjectStore::new());
    let tree = SnapshotTree::new(objects.clone());
    let empty = tree.empty_root().unwrap();
    let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    let writes = [Write::put("a/b", "1"), Write::put("a/c", "2")];

    let first = tree.apply(&empty, &writes, now).unwrap();
    let stored = objects.len().unwrap();
    let second = tree.apply(&empty, &writes, now).unwrap();

    assert_eq!(first, second);
    assert_eq!(objects.len().unwrap(), stored);
}

#[test]
fn equivalent_paths_address_the_same_key() {
    let tree = tree();
    let empty = tree.empty_root().unwrap();
    let root = tree
        .apply(&empty, &[Write::put("//config.json/", "{}")], Utc::now())
        .unwrap();
    for path in ["config.json", "/config.json", "/config.json/"] {
        assert_eq!(tree.resolve_value(&root, path).unwrap(), "{}");
    }
    assert!(matches!(
        tree.resolve(&root, "/a/../config.json"),
        Err(ApiError::InvalidPath(_))
    ));
}

#[test]
fn file_and_directory_metadata() {
    let tree = tree();
    let empty = tree.empty_root().unwrap();
    let early = Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap();
    let late = Utc.with_ymd_and_hms(2024, 3, 2, 9, 0, 0).unwrap();
    let v1 = tree.apply(&empty, &[Write::put("d/one", "12345")], early).unwrap();
    let v2 = tree.apply(&v1, &[Write::put("d/two", "x")], late).unwrap();

    let (_, file) = tree.resolve(&v2, "d/one").unwrap();
    let file = file.as_file().unwrap();
    assert_eq!(file.metadata.size, Some(5));
    assert_eq!(file.metadata.permissions, "644");
    assert_eq!(file.metadata.last_modified, early);

    let (_, dir) = tree.resolve(&v2, "d").unwrap();
    assert_eq!(dir.node_type(), NodeType::Directory);
    assert_eq!(dir.metadata().last_modified, late);
    assert_eq!(dir.metadata().permissions, "755");
    assert_eq!(dir.metadata().size, None);
}

#[test]
fn materialized_snapshot_mirrors_stored_nodes() {
    let tree = tree();
    let empty = tree.empty_root().unwrap();
    let root = tree
        .apply(
            &empty,
            &[Write::put("x/y/z", "deep"), Write::put("top", "t")],
            Utc::now(),
        )
        .unwrap();
    let snapshot = tree.materialize(&root).unwrap();
    assert_eq!(snapshot.hash, root);
    assert_eq!(snapshot.leaf_count(), 2);

    let y = &snapshot.children["x"].children["y"];
    let (y_id, y_node) = tree.resolve(&root, "x/y").unwrap();
    assert_eq!(y.hash, y_id);
    match y_node.as_ref() {
        MerkleNode::Directory(dir) => assert_eq!(dir.children.len(), 1),
        MerkleNode::File(_) => panic!("x/y should be a directory"),
    }
}
