use vkv::diff::{diff_trees, Change, ChangeType};
use vkv::{Repository, Write};

#[test]
fn diff_of_a_commit_with_itself_is_empty() {
    let repo = Repository::in_memory();
    repo.init("t", "init").unwrap();
    repo.commit_writes("main", &[Write::put("a/b", "1")], "t", "a").unwrap();
    let diff = repo.get_commit_diff("main", "main").unwrap();
    assert!(diff.changes.is_empty());
    assert_eq!(diff.from_commit, diff.to_commit);
}

#[test]
fn diff_is_reported_per_leaf_and_sorted() {
    let repo = Repository::in_memory();
    repo.init("t", "init").unwrap();
    let from = repo
        .commit_writes(
            "main",
            &[
                Write::put("zeta", "z"),
                Write::put("dir/old", "o"),
                Write::put("dir/keep", "k"),
            ],
            "t",
            "from",
        )
        .unwrap();
    let to = repo
        .commit_writes(
            "main",
            &[
                Write::delete("dir/old"),
                Write::put("alpha/one", "1"),
                Write::put("alpha/two", "2"),
                Write::put("zeta", "zz"),
            ],
            "t",
            "to",
        )
        .unwrap();

    let diff = repo
        .get_commit_diff(&hex::encode(from.hash), &hex::encode(to.hash))
        .unwrap();
    let summary: Vec<(&str, ChangeType)> = diff
        .changes
        .iter()
        .map(|c| (c.path.as_str(), c.change_type))
        .collect();
    assert_eq!(
        summary,
        vec![
            ("/alpha/one", ChangeType::Added),
            ("/alpha/two", ChangeType::Added),
            ("/dir/old", ChangeType::Deleted),
            ("/zeta", ChangeType::Modified),
        ]
    );
}

#[test]
fn replaying_a_diff_reproduces_the_target_root() {
    let repo = Repository::in_memory();
    repo.init("t", "init").unwrap();
    let a = repo
        .commit_writes("main", &[Write::put("p/q", "1"), Write::put("r", "2")], "t", "a")
        .unwrap();
    let b = repo
        .commit_writes(
            "main",
            &[Write::delete("p"), Write::put("r/s", "3"), Write::put("t/u", "4")],
            "t",
            "b",
        )
        .unwrap_err();
    // `r` is a file, so writing below it is rejected and nothing is committed.
    assert!(matches!(b, vkv::ApiError::TypeMismatch { .. }));
    assert_eq!(repo.branches().get("main").unwrap().head_commit, a.hash);

    let b = repo
        .commit_writes(
            "main",
            &[Write::delete("p"), Write::delete("r"), Write::put("r/s", "3")],
            "t",
            "b",
        )
        .unwrap();
    let changes = diff_trees(repo.tree(), &a.root, &b.root).unwrap();
    let writes: Vec<Write> = changes.iter().map(Change::to_write).collect();
    let replayed = repo.tree().apply(&a.root, &writes, chrono::Utc::now()).unwrap();
    assert_eq!(replayed, b.root);
}

#[test]
fn commit_diff_json_contract() {
    let repo = Repository::in_memory();
    let c1 = repo.init("t", "init").unwrap();
    repo.commit_writes("main", &[Write::put("k", "v")], "t", "k").unwrap();
    let diff = repo.get_commit_diff(&hex::encode(c1.hash), "main").unwrap();

    let value = serde_json::to_value(&diff).unwrap();
    assert_eq!(value["from_commit"].as_str().unwrap(), hex::encode(c1.hash));
    let change = &value["changes"][0];
    assert_eq!(change["path"], "/k");
    assert_eq!(change["change_type"], "Added");
    assert!(change["old_value"].is_null());
    assert_eq!(change["new_value"], "v");
}
