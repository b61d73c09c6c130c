use chrono::{Duration, TimeZone, Utc};
use std::sync::Arc;
use vkv::graph::CommitGraph;
use vkv::store::{MemoryObjectStore, MemoryRefStore, ObjectStore, RefStore};
use vkv::types::CommitID;

struct Fixture {
    graph: CommitGraph,
    root: [u8; 32],
}

fn fixture() -> Fixture {
    let objects: Arc<dyn ObjectStore> = Arc::new(MemoryObjectStore::new());
    let refs: Arc<dyn RefStore> = Arc::new(MemoryRefStore::new());
    let root = objects.put(b"tree").unwrap();
    Fixture {
        graph: CommitGraph::new(objects, refs, 10_000),
        root,
    }
}

fn linear(fx: &Fixture, len: usize) -> Vec<CommitID> {
    let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    let mut hashes: Vec<CommitID> = Vec::new();
    for i in 0..len {
        let parents = hashes.last().map(|h| vec![*h]).unwrap_or_default();
        let commit = fx
            .graph
            .commit(
                fx.root,
                &format!("c{}", i),
                "tester",
                start + Duration::seconds(i as i64),
                parents,
                "main",
            )
            .unwrap();
        hashes.push(commit.hash);
    }
    hashes
}

#[test]
fn ancestry_is_transitive_along_a_chain() {
    let fx = fixture();
    let chain = linear(&fx, 6);
    for (i, older) in chain.iter().enumerate() {
        for (j, newer) in chain.iter().enumerate() {
            assert_eq!(
                fx.graph.is_ancestor(older, newer).unwrap(),
                i <= j,
                "is_ancestor(c{}, c{})",
                i,
                j
            );
        }
    }
}

#[test]
fn generations_and_ancestor_order() {
    let fx = fixture();
    let chain = linear(&fx, 4);
    let head = fx.graph.get(&chain[3]).unwrap();
    assert_eq!(head.generation, 4);

    let walked: Vec<CommitID> = fx
        .graph
        .ancestors(&chain[3])
        .unwrap()
        .map(|c| c.unwrap().hash)
        .collect();
    let expected: Vec<CommitID> = chain.iter().rev().copied().collect();
    assert_eq!(walked, expected);
}

#[test]
fn merge_base_of_diverged_lines() {
    let fx = fixture();
    let chain = linear(&fx, 3);
    let t = Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap();
    let left = fx
        .graph
        .commit(fx.root, "left", "a", t, vec![chain[2]], "left")
        .unwrap();
    let right = fx
        .graph
        .commit(fx.root, "right", "b", t, vec![chain[2]], "right")
        .unwrap();
    assert_eq!(
        fx.graph.merge_base(&left.hash, &right.hash).unwrap(),
        Some(chain[2])
    );

    let merge = fx
        .graph
        .commit(
            fx.root,
            "merge",
            "a",
            t + Duration::minutes(1),
            vec![left.hash, right.hash],
            "left",
        )
        .unwrap();
    assert!(merge.is_merge());
    assert!(fx.graph.is_ancestor(&right.hash, &merge.hash).unwrap());
    assert!(!fx.graph.is_ancestor(&right.hash, &left.hash).unwrap());
    assert_eq!(fx.graph.first_parent_chain(&merge.hash).unwrap().len(), 5);
    assert_eq!(merge.depth, 5);
}

#[test]
fn listing_is_newest_first() {
    let fx = fixture();
    let chain = linear(&fx, 3);
    let listed: Vec<CommitID> = fx.graph.list().unwrap().iter().map(|c| c.hash).collect();
    assert_eq!(listed, vec![chain[2], chain[1], chain[0]]);
}

#[test]
fn commit_serializes_hashes_as_hex() {
    let fx = fixture();
    let chain = linear(&fx, 2);
    let commit = fx.graph.get(&chain[1]).unwrap();
    let value = serde_json::to_value(commit.as_ref()).unwrap();
    assert_eq!(value["hash"].as_str().unwrap().len(), 64);
    assert_eq!(value["parents"][0].as_str().unwrap(), hex::encode(chain[0]));
    assert!(value["timestamp"].as_str().unwrap().starts_with("2024-01-01T00:00:01"));
}
