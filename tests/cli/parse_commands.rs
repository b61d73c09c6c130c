use clap::{CommandFactory, Parser};
use vkv::tooling::cli::{BranchCommands, Cli, Commands};

#[test]
fn parse_valid_command_matrix() {
    let cases: Vec<Vec<&str>> = vec![
        vec!["vkv", "init"],
        vec!["vkv", "tree"],
        vec!["vkv", "tree", "main", "--format", "json"],
        vec!["vkv", "get", "/config.json", "--at", "abcd1234"],
        vec!["vkv", "log", "--branch", "main"],
        vec!["vkv", "branches"],
        vec!["vkv", "branch", "create", "feature", "--from", "main"],
        vec!["vkv", "branch", "delete", "feature"],
        vec!["vkv", "put", "users/alice", "admin", "--branch", "main"],
        vec!["vkv", "rm", "users/alice"],
        vec!["vkv", "diff", "main", "feature"],
        vec!["vkv", "search", "user", "--at", "main", "--limit", "5"],
        vec!["vkv", "merge", "feature", "--into", "main"],
        vec!["vkv", "status", "--format", "json"],
        vec!["vkv", "config"],
        vec!["vkv", "config", "--format", "json"],
        vec!["vkv", "--workspace", "/tmp/ws", "--log-level", "debug", "status"],
    ];

    for args in cases {
        let parsed = Cli::try_parse_from(args.clone());
        assert!(parsed.is_ok(), "expected valid parse for args: {args:?}");
    }
}

#[test]
fn parse_rejects_invalid_input() {
    assert!(Cli::try_parse_from(["vkv", "tree", "--format", "yaml"]).is_err());
    assert!(Cli::try_parse_from(["vkv", "put", "only-path"]).is_err());
    assert!(Cli::try_parse_from(["vkv", "diff", "main"]).is_err());
    assert!(Cli::try_parse_from(["vkv", "search", "x", "--limit", "many"]).is_err());
}

#[test]
fn parse_branch_create_fields() {
    let cli = Cli::try_parse_from(["vkv", "branch", "create", "topic", "--from", "deadbeef"]).unwrap();
    match cli.command {
        Commands::Branch {
            command: BranchCommands::Create { name, from },
        } => {
            assert_eq!(name, "topic");
            assert_eq!(from.as_deref(), Some("deadbeef"));
        }
        other => panic!("unexpected command: {:?}", other),
    }
}

#[test]
fn command_definition_is_consistent() {
    Cli::command().debug_assert();
}
