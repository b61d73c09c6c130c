use vkv::{Repository, Write};

fn repo() -> Repository {
    let repo = Repository::in_memory();
    repo.init("t", "init").unwrap();
    repo.commit_writes(
        "main",
        &[
            Write::put("app/config.json", "{}"),
            Write::put("app/Config.old", "x"),
            Write::put("reconfig", "y"),
            Write::put("data/blob", "z"),
        ],
        "t",
        "seed",
    )
    .unwrap();
    repo
}

#[test]
fn empty_query_lists_every_key_in_path_order() {
    let repo = repo();
    let results = repo.search_keys("", None).unwrap();
    let paths: Vec<&str> = results.iter().map(|r| r.path.as_str()).collect();
    assert_eq!(
        paths,
        vec![
            "/app",
            "/app/Config.old",
            "/app/config.json",
            "/data",
            "/data/blob",
            "/reconfig",
        ]
    );
}

#[test]
fn matches_are_case_insensitive_and_ranked() {
    let repo = repo();
    let results = repo.search_keys("CONFIG", None).unwrap();
    let ranked: Vec<(&str, f32)> = results
        .iter()
        .map(|r| (r.path.as_str(), r.relevance_score))
        .collect();
    assert_eq!(
        ranked,
        vec![
            ("/app/Config.old", 0.75),
            ("/app/config.json", 0.75),
            ("/reconfig", 0.5),
        ]
    );
}

#[test]
fn search_scope_selects_the_snapshot() {
    let repo = repo();
    let first = repo.list_commits(Some("main")).unwrap().pop().unwrap();
    let scoped = repo
        .search_keys("config", Some(&hex::encode(first.hash)))
        .unwrap();
    assert!(scoped.is_empty());

    let limited = repo.search_keys_limited("", Some("main"), 2).unwrap();
    assert_eq!(limited.len(), 2);
    assert_eq!(limited[0].path, "/app");
}

#[test]
fn results_carry_materialized_nodes() {
    let repo = repo();
    let results = repo.search_keys("blob", None).unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].relevance_score, 1.0);
    assert_eq!(results[0].node.key, "blob");
    assert_eq!(results[0].node.value.as_deref(), Some("z"));

    let json = serde_json::to_value(&results[0]).unwrap();
    assert_eq!(json["path"], "/data/blob");
    assert_eq!(json["node"]["node_type"], "File");
}
