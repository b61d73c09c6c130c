use vkv::diff::ChangeType;
use vkv::{ApiError, MergeOutcome, Repository, Write};

#[test]
fn add_then_delete_returns_to_the_initial_snapshot() {
    let repo = Repository::in_memory();
    let c1 = repo.init("alice", "Initial commit").unwrap();
    assert_eq!(repo.branches().get("main").unwrap().commit_count, 1);

    let c2 = repo
        .commit_writes("main", &[Write::put("config.json", "{}")], "alice", "Add config")
        .unwrap();
    let diff = repo
        .get_commit_diff(&hex::encode(c1.hash), &hex::encode(c2.hash))
        .unwrap();
    assert_eq!(diff.changes.len(), 1);
    assert_eq!(diff.changes[0].path, "/config.json");
    assert_eq!(diff.changes[0].change_type, ChangeType::Added);
    assert_eq!(diff.changes[0].new_value.as_deref(), Some("{}"));

    let c3 = repo
        .commit_writes("main", &[Write::delete("config.json")], "alice", "Remove config")
        .unwrap();
    let diff = repo
        .get_commit_diff(&hex::encode(c2.hash), &hex::encode(c3.hash))
        .unwrap();
    assert_eq!(diff.changes.len(), 1);
    assert_eq!(diff.changes[0].change_type, ChangeType::Deleted);
    assert_eq!(diff.changes[0].old_value.as_deref(), Some("{}"));

    let diff = repo
        .get_commit_diff(&hex::encode(c1.hash), &hex::encode(c3.hash))
        .unwrap();
    assert!(diff.changes.is_empty());
    assert_eq!(c1.root, c3.root);
    assert_eq!(repo.branches().get("main").unwrap().commit_count, 3);
}

#[test]
fn forked_branches_merge_with_both_parents() {
    let repo = Repository::in_memory();
    repo.init("alice", "Initial commit").unwrap();
    let c2 = repo
        .commit_writes("main", &[Write::put("config.json", "{}")], "alice", "Add config")
        .unwrap();

    let c2_hex = hex::encode(c2.hash);
    repo.create_branch("feature-a", Some(&c2_hex)).unwrap();
    repo.create_branch("feature-b", Some(&c2_hex)).unwrap();
    let a = repo
        .commit_writes("feature-a", &[Write::put("a.txt", "A")], "alice", "Add a")
        .unwrap();
    let b = repo
        .commit_writes("feature-b", &[Write::put("b.txt", "B")], "bob", "Add b")
        .unwrap();

    let merge = match repo.merge("feature-b", "feature-a", "alice", "Merge b").unwrap() {
        MergeOutcome::Merged { commit, .. } => commit,
        other => panic!("expected a merge commit, got {:?}", other),
    };
    assert_eq!(merge.parents, vec![a.hash, b.hash]);
    assert_eq!(merge.branch, "feature-a");
    assert!(repo.graph().is_ancestor(&a.hash, &merge.hash).unwrap());
    assert!(repo.graph().is_ancestor(&b.hash, &merge.hash).unwrap());
    assert!(repo.graph().is_ancestor(&c2.hash, &merge.hash).unwrap());

    let tree = repo.resolve_tree("feature-a").unwrap();
    let keys: Vec<&str> = tree.children.keys().map(String::as_str).collect();
    assert_eq!(keys, vec!["a.txt", "b.txt", "config.json"]);

    // first-parent line: c1, c2, a, merge
    assert_eq!(repo.branches().get("feature-a").unwrap().commit_count, 4);
    assert_eq!(repo.branches().get("feature-b").unwrap().commit_count, 3);
}

#[test]
fn merging_into_an_ancestor_replays_everything() {
    let repo = Repository::in_memory();
    repo.init("alice", "init").unwrap();
    repo.create_branch("topic", None).unwrap();
    let topic = repo
        .commit_writes("topic", &[Write::put("deep/key", "1")], "alice", "topic")
        .unwrap();

    match repo.merge("topic", "main", "alice", "bring topic").unwrap() {
        MergeOutcome::Merged { commit, applied } => {
            assert_eq!(applied, 1);
            assert_eq!(commit.root, topic.root);
        }
        other => panic!("expected a merge commit, got {:?}", other),
    }
}

#[test]
fn conflicting_type_changes_abort_the_merge() {
    let repo = Repository::in_memory();
    repo.init("alice", "init").unwrap();
    repo.create_branch("other", None).unwrap();
    repo.commit_writes("main", &[Write::put("node", "file")], "alice", "file")
        .unwrap();
    repo.commit_writes("other", &[Write::put("node/child", "dir")], "bob", "dir")
        .unwrap();

    match repo.merge("other", "main", "alice", "merge") {
        Err(ApiError::MergeConflict(paths)) => assert_eq!(paths, vec!["/node/child".to_string()]),
        other => panic!("expected conflict, got {:?}", other),
    }
}

#[test]
fn writes_to_unknown_branches_fail_cleanly() {
    let repo = Repository::in_memory();
    repo.init("alice", "init").unwrap();
    let err = repo
        .commit_writes("nope", &[Write::put("k", "v")], "alice", "x")
        .unwrap_err();
    assert!(matches!(err, ApiError::BranchNotFound(_)));
    assert_eq!(repo.list_commits(None).unwrap().len(), 1);
}
