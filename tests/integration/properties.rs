use chrono::{Duration, TimeZone, Utc};
use proptest::prelude::*;
use std::collections::BTreeSet;
use std::sync::Arc;
use vkv::diff::{diff_trees, to_writes};
use vkv::store::MemoryObjectStore;
use vkv::tree::{SnapshotTree, Write};

const PATHS: [&str; 8] = ["a/x", "a/y", "b", "c", "c/d", "c/d/e", "c/d/f", "c/g"];

fn is_under(path: &str, dir: &str) -> bool {
    path.len() > dir.len() && path.starts_with(dir) && path.as_bytes()[dir.len()] == b'/'
}

/// Turns raw `(path, is_put)` picks into a batch that never hits a type
/// mismatch against `live`, the set of leaf paths currently stored. A put
/// first clears any file in its way or any directory at its own path, so
/// batches regularly swap files and directories at every depth. Every put
/// carries a value unique to its tag and position.
fn plan(ops: &[(usize, bool)], tag: &str, live: &mut BTreeSet<&'static str>) -> Vec<Write> {
    let mut out = Vec::new();
    for (i, &(index, put)) in ops.iter().enumerate() {
        let path = PATHS[index];
        if put {
            let blockers: Vec<&'static str> =
                live.iter().copied().filter(|file| is_under(path, file)).collect();
            for file in blockers {
                out.push(Write::delete(file));
                live.remove(&file);
            }
            if live.iter().any(|file| is_under(file, path)) {
                out.push(Write::delete(path));
                live.retain(|file| !is_under(file, path));
            }
            out.push(Write::put(path, format!("{}-{}", tag, i)));
            live.insert(path);
        } else if !live.iter().any(|file| is_under(path, file)) {
            out.push(Write::delete(path));
            live.retain(|file| *file != path && !is_under(file, path));
        }
    }
    out
}

fn ops() -> impl Strategy<Value = Vec<(usize, bool)>> {
    prop::collection::vec((0..PATHS.len(), any::<bool>()), 0..12)
}

fn writes(tag: &'static str) -> impl Strategy<Value = Vec<Write>> {
    ops().prop_map(move |ops| plan(&ops, tag, &mut BTreeSet::new()))
}

/// Two consecutive batches, the second planned against what the first left.
fn history() -> impl Strategy<Value = (Vec<Write>, Vec<Write>)> {
    (ops(), ops()).prop_map(|(first, second)| {
        let mut live = BTreeSet::new();
        let first = plan(&first, "a", &mut live);
        let second = plan(&second, "b", &mut live);
        (first, second)
    })
}

fn tree() -> SnapshotTree {
    SnapshotTree::new(Arc::new(MemoryObjectStore::new()))
}

proptest! {
    #[test]
    fn diff_replay_reproduces_target((first, second) in history()) {
        let tree = tree();
        let t0 = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        let empty = tree.empty_root().unwrap();
        let a = tree.apply(&empty, &first, t0).unwrap();
        let b = tree.apply(&a, &second, t0 + Duration::hours(1)).unwrap();

        let replay = to_writes(&diff_trees(&tree, &a, &b).unwrap());
        let replayed = tree.apply(&a, &replay, t0 + Duration::days(1)).unwrap();
        prop_assert_eq!(replayed, b);
    }

    #[test]
    fn self_diff_is_empty(first in writes("a")) {
        let tree = tree();
        let empty = tree.empty_root().unwrap();
        let a = tree.apply(&empty, &first, Utc::now()).unwrap();
        prop_assert!(diff_trees(&tree, &a, &a).unwrap().is_empty());
    }

    #[test]
    fn unrelated_write_preserves_sibling_hashes(first in writes("a")) {
        let tree = tree();
        let empty = tree.empty_root().unwrap();
        let a = tree.apply(&empty, &first, Utc::now()).unwrap();
        let b = tree
            .apply(&a, &[Write::put("zz/new", "value")], Utc::now())
            .unwrap();

        let before = tree.materialize(&a).unwrap();
        let after = tree.materialize(&b).unwrap();
        for (key, child) in &before.children {
            prop_assert_eq!(child.hash, after.children[key].hash);
        }
        prop_assert!(after.children.contains_key("zz"));
    }
}
