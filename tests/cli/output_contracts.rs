use tempfile::TempDir;
use vkv::tooling::cli::{BranchCommands, CliContext, Commands};

use crate::cli::support::{initialized, json, put, workspace};

fn text() -> String {
    "text".to_string()
}

fn as_json() -> String {
    "json".to_string()
}

#[test]
fn log_json_contract_has_required_fields() {
    let temp_dir = TempDir::new().unwrap();
    let cli = initialized(&temp_dir);
    put(&cli, "config.json", "{}");

    let output = cli
        .execute(&Commands::Log {
            branch: Some("main".to_string()),
            format: as_json(),
        })
        .unwrap();
    let parsed = json(&output);
    assert_eq!(parsed["total"].as_u64(), Some(2));
    let newest = &parsed["commits"][0];
    assert_eq!(newest["message"], "Set config.json");
    assert_eq!(newest["author"], "cli-test");
    assert_eq!(newest["branch"], "main");
    assert_eq!(newest["hash"].as_str().map(str::len), Some(64));
    assert_eq!(newest["parents"].as_array().map(Vec::len), Some(1));
    assert!(newest["timestamp"].as_str().is_some());
}

#[test]
fn tree_and_get_contracts() {
    let temp_dir = TempDir::new().unwrap();
    let cli = initialized(&temp_dir);
    put(&cli, "services/api/port", "8080");

    let tree = json(
        &cli.execute(&Commands::Tree {
            reference: None,
            format: as_json(),
        })
        .unwrap(),
    );
    assert_eq!(tree["key"], "/");
    assert_eq!(tree["node_type"], "Directory");
    let port = &tree["children"]["services"]["children"]["api"]["children"]["port"];
    assert_eq!(port["value"], "8080");
    assert_eq!(port["metadata"]["size"], 4);
    assert_eq!(port["metadata"]["permissions"], "644");

    let value = cli
        .execute(&Commands::Get {
            path: "/services/api/port".to_string(),
            at: None,
            format: text(),
        })
        .unwrap();
    assert_eq!(value, "8080");

    let listing = cli
        .execute(&Commands::Tree {
            reference: Some("main".to_string()),
            format: text(),
        })
        .unwrap();
    assert!(listing.contains("port = 8080"));
}

#[test]
fn diff_and_search_contracts() {
    let temp_dir = TempDir::new().unwrap();
    let cli = initialized(&temp_dir);
    let first = json(
        &cli.execute(&Commands::Status { format: as_json() })
            .unwrap(),
    )["default_head"]
        .as_str()
        .unwrap()
        .to_string();
    put(&cli, "users/alice", "admin");

    let diff = json(
        &cli.execute(&Commands::Diff {
            from: first.clone(),
            to: "main".to_string(),
            format: as_json(),
        })
        .unwrap(),
    );
    assert_eq!(diff["from_commit"], first.as_str());
    assert_eq!(diff["changes"][0]["path"], "/users/alice");
    assert_eq!(diff["changes"][0]["change_type"], "Added");

    let text_diff = cli
        .execute(&Commands::Diff {
            from: first[..8].to_string(),
            to: "main".to_string(),
            format: text(),
        })
        .unwrap();
    assert!(text_diff.contains("/users/alice"));

    let search = json(
        &cli.execute(&Commands::Search {
            query: "alice".to_string(),
            at: None,
            limit: Some(10),
            format: as_json(),
        })
        .unwrap(),
    );
    assert_eq!(search["total"], 1);
    assert_eq!(search["results"][0]["path"], "/users/alice");
    assert_eq!(search["results"][0]["relevance_score"], 1.0);
}

#[test]
fn branch_merge_flow() {
    let temp_dir = TempDir::new().unwrap();
    let cli = initialized(&temp_dir);
    put(&cli, "base", "1");
    cli.execute(&Commands::Branch {
        command: BranchCommands::Create {
            name: "feature".to_string(),
            from: None,
        },
    })
    .unwrap();
    cli.execute(&Commands::Put {
        path: "feature.txt".to_string(),
        value: "f".to_string(),
        branch: Some("feature".to_string()),
        author: Some("bob".to_string()),
        message: None,
    })
    .unwrap();

    let merged = json(
        &cli.execute(&Commands::Merge {
            source: "feature".to_string(),
            into: None,
            author: None,
            message: None,
            format: as_json(),
        })
        .unwrap(),
    );
    assert_eq!(merged["status"], "merged");
    assert_eq!(merged["applied"], 1);
    assert_eq!(merged["commit"]["parents"].as_array().map(Vec::len), Some(2));

    let branches = json(&cli.execute(&Commands::Branches { format: as_json() }).unwrap());
    assert_eq!(branches["total"], 2);
    assert_eq!(branches["default_branch"], "main");

    let removed = cli
        .execute(&Commands::Branch {
            command: BranchCommands::Delete {
                name: "feature".to_string(),
            },
        })
        .unwrap();
    assert!(removed.starts_with("Deleted branch feature"));
}

#[test]
fn state_persists_across_contexts() {
    let temp_dir = TempDir::new().unwrap();
    {
        let cli = initialized(&temp_dir);
        put(&cli, "k", "v");
    }
    let cli = CliContext::new(workspace(&temp_dir), None).unwrap();
    let status = json(&cli.execute(&Commands::Status { format: as_json() }).unwrap());
    assert_eq!(status["healthy"], true);
    assert_eq!(status["commits"], 2);
    assert_eq!(status["backend"], "sled");
}

#[test]
fn config_reports_effective_settings() {
    let temp_dir = TempDir::new().unwrap();
    let cli = CliContext::new(workspace(&temp_dir), None).unwrap();

    let rendered = cli.execute(&Commands::Config { format: "toml".to_string() }).unwrap();
    assert!(rendered.contains("[storage]"));
    assert!(rendered.contains("default_author = \"cli-test\""));

    let parsed = json(&cli.execute(&Commands::Config { format: as_json() }).unwrap());
    assert_eq!(parsed["storage"]["backend"], "sled");
    assert_eq!(parsed["repository"]["default_branch"], "main");
}

#[test]
fn errors_surface_as_api_errors() {
    let temp_dir = TempDir::new().unwrap();
    let cli = initialized(&temp_dir);
    let err = cli
        .execute(&Commands::Get {
            path: "missing".to_string(),
            at: None,
            format: text(),
        })
        .unwrap_err();
    assert!(err.is_not_found());

    let err = cli
        .execute(&Commands::Init {
            author: None,
            message: "again".to_string(),
        })
        .unwrap_err();
    assert!(err.to_string().contains("already exists"));
}
