//! CLI Tooling
//!
//! Command-line interface over a workspace repository. Read commands print
//! either human-readable text or JSON (`--format json`); write commands print
//! a one-line summary.

use crate::api::{HealthReport, MergeOutcome, Repository};
use crate::config::{ConfigLoader, VkvConfig};
use crate::diff::{ChangeType, CommitDiff};
use crate::error::{ApiError, StorageError};
use crate::graph::Commit;
use crate::heads::Branch;
use crate::search::SearchResult;
use crate::tree::{NodeType, SnapshotNode, Write};
use crate::types::to_hex;
use clap::{Parser, Subcommand};
use comfy_table::presets::UTF8_BORDERS_ONLY;
use comfy_table::Table;
use owo_colors::OwoColorize;
use serde::Serialize;
use serde_json::json;
use std::path::{Path, PathBuf};
use tracing::debug;

/// vkv - versioned hierarchical key-value store
#[derive(Parser, Debug)]
#[command(name = "vkv")]
#[command(about = "Versioned hierarchical key-value store with branches, diffs and search")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Workspace root directory
    #[arg(long, default_value = ".")]
    pub workspace: PathBuf,

    /// Configuration file path (overrides default config loading)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Log format (json, text)
    #[arg(long)]
    pub log_format: Option<String>,

    /// Log output (stdout, stderr, file, file+stderr, both)
    #[arg(long)]
    pub log_output: Option<String>,

    /// Log file path (if output includes "file")
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create the root commit and the default branch
    Init {
        #[arg(long)]
        author: Option<String>,
        #[arg(long, default_value = "Initial commit")]
        message: String,
    },
    /// Show the snapshot of a branch or commit
    Tree {
        /// Branch name, commit hash or hash prefix (default branch when omitted)
        reference: Option<String>,
        #[arg(long, default_value = "text", value_parser = ["text", "json"])]
        format: String,
    },
    /// Read the value or subtree at a path
    Get {
        path: String,
        /// Branch or commit to read from
        #[arg(long)]
        at: Option<String>,
        #[arg(long, default_value = "text", value_parser = ["text", "json"])]
        format: String,
    },
    /// Show commit history, newest first
    Log {
        /// Only commits reachable from this branch
        #[arg(long)]
        branch: Option<String>,
        #[arg(long, default_value = "text", value_parser = ["text", "json"])]
        format: String,
    },
    /// List branches
    Branches {
        #[arg(long, default_value = "text", value_parser = ["text", "json"])]
        format: String,
    },
    /// Create or delete branches
    Branch {
        #[command(subcommand)]
        command: BranchCommands,
    },
    /// Set a key and commit
    Put {
        path: String,
        value: String,
        #[arg(long)]
        branch: Option<String>,
        #[arg(long)]
        author: Option<String>,
        #[arg(long)]
        message: Option<String>,
    },
    /// Delete a key (or subtree) and commit
    Rm {
        path: String,
        #[arg(long)]
        branch: Option<String>,
        #[arg(long)]
        author: Option<String>,
        #[arg(long)]
        message: Option<String>,
    },
    /// Show changes between two commits
    Diff {
        from: String,
        to: String,
        #[arg(long, default_value = "text", value_parser = ["text", "json"])]
        format: String,
    },
    /// Search keys
    Search {
        query: String,
        /// Branch or commit to search (default branch when omitted)
        #[arg(long)]
        at: Option<String>,
        #[arg(long)]
        limit: Option<usize>,
        #[arg(long, default_value = "text", value_parser = ["text", "json"])]
        format: String,
    },
    /// Merge a branch or commit into a branch
    Merge {
        source: String,
        /// Target branch (default branch when omitted)
        #[arg(long)]
        into: Option<String>,
        #[arg(long)]
        author: Option<String>,
        #[arg(long)]
        message: Option<String>,
        #[arg(long, default_value = "text", value_parser = ["text", "json"])]
        format: String,
    },
    /// Show repository status
    Status {
        #[arg(long, default_value = "text", value_parser = ["text", "json"])]
        format: String,
    },
    /// Print the effective configuration
    Config {
        #[arg(long, default_value = "toml", value_parser = ["toml", "json"])]
        format: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum BranchCommands {
    /// Create a branch
    Create {
        name: String,
        /// Starting point (default branch head when omitted)
        #[arg(long)]
        from: Option<String>,
    },
    /// Delete a branch
    Delete { name: String },
}

/// CLI context for managing workspace state
pub struct CliContext {
    repo: Repository,
    workspace_root: PathBuf,
}

impl CliContext {
    /// Create a new CLI context
    pub fn new(workspace_root: PathBuf, config_path: Option<PathBuf>) -> Result<Self, ApiError> {
        let config = load_config(&workspace_root, config_path.as_deref())?;
        let repo = Repository::open(config, &workspace_root)?;
        Ok(Self {
            repo,
            workspace_root,
        })
    }

    /// Get a reference to the underlying repository
    pub fn repository(&self) -> &Repository {
        &self.repo
    }

    pub fn config(&self) -> &VkvConfig {
        self.repo.config()
    }

    pub fn workspace_root(&self) -> &Path {
        &self.workspace_root
    }

    /// Execute a CLI command
    pub fn execute(&self, command: &Commands) -> Result<String, ApiError> {
        debug!(command = command_name(command), "Executing command");
        match command {
            Commands::Init { author, message } => {
                let commit = self.repo.init(self.author(author), message)?;
                Ok(format!(
                    "Initialized repository on branch {} (root commit {})",
                    self.repo.default_branch(),
                    commit.short_hash()
                ))
            }
            Commands::Tree { reference, format } => {
                let reference = self.reference(reference);
                let tree = self.repo.resolve_tree(reference)?;
                if format == "json" {
                    to_json(&tree)
                } else {
                    Ok(format_tree_text(&tree))
                }
            }
            Commands::Get { path, at, format } => {
                let node = self.repo.get_node(self.reference(at), path)?;
                match (format.as_str(), node.node_type) {
                    ("json", _) => to_json(&node),
                    (_, NodeType::File) => Ok(node.value.unwrap_or_default()),
                    (_, NodeType::Directory) => Ok(format_tree_text(&node)),
                }
            }
            Commands::Log { branch, format } => {
                let commits = self.repo.list_commits(branch.as_deref())?;
                if format == "json" {
                    to_json(&json!({ "commits": commits, "total": commits.len() }))
                } else {
                    Ok(format_log_text(&commits))
                }
            }
            Commands::Branches { format } => {
                let branches = self.repo.list_branches()?;
                if format == "json" {
                    to_json(&json!({
                        "branches": branches,
                        "default_branch": self.repo.default_branch(),
                        "total": branches.len(),
                    }))
                } else {
                    Ok(format_branches_text(&branches, self.repo.default_branch()))
                }
            }
            Commands::Branch { command } => match command {
                BranchCommands::Create { name, from } => {
                    let branch = self.repo.create_branch(name, from.as_deref())?;
                    Ok(format!(
                        "Created branch {} at {}",
                        branch.name,
                        short(&to_hex(&branch.head_commit))
                    ))
                }
                BranchCommands::Delete { name } => {
                    let branch = self.repo.delete_branch(name)?;
                    Ok(format!(
                        "Deleted branch {} (was {})",
                        branch.name,
                        short(&to_hex(&branch.head_commit))
                    ))
                }
            },
            Commands::Put {
                path,
                value,
                branch,
                author,
                message,
            } => {
                let message = message.clone().unwrap_or_else(|| format!("Set {}", path));
                let commit = self.repo.commit_writes(
                    self.branch(branch),
                    &[Write::put(path.clone(), value.clone())],
                    self.author(author),
                    &message,
                )?;
                Ok(format!("[{} {}] {}", commit.branch, commit.short_hash(), commit.message))
            }
            Commands::Rm {
                path,
                branch,
                author,
                message,
            } => {
                let message = message.clone().unwrap_or_else(|| format!("Delete {}", path));
                let commit = self.repo.commit_writes(
                    self.branch(branch),
                    &[Write::delete(path.clone())],
                    self.author(author),
                    &message,
                )?;
                Ok(format!("[{} {}] {}", commit.branch, commit.short_hash(), commit.message))
            }
            Commands::Diff { from, to, format } => {
                let diff = self.repo.get_commit_diff(from, to)?;
                if format == "json" {
                    to_json(&diff)
                } else {
                    Ok(format_diff_text(&diff))
                }
            }
            Commands::Search {
                query,
                at,
                limit,
                format,
            } => {
                let results = self.repo.search_keys_limited(
                    query,
                    at.as_deref(),
                    limit.unwrap_or(usize::MAX),
                )?;
                if format == "json" {
                    to_json(&json!({ "query": query, "results": results, "total": results.len() }))
                } else {
                    Ok(format_search_text(query, &results))
                }
            }
            Commands::Merge {
                source,
                into,
                author,
                message,
                format,
            } => {
                let into = self.branch(into);
                let message = message
                    .clone()
                    .unwrap_or_else(|| format!("Merge {} into {}", source, into));
                let outcome = self.repo.merge(source, into, self.author(author), &message)?;
                if format == "json" {
                    return to_json(&outcome);
                }
                Ok(match outcome {
                    MergeOutcome::UpToDate { head } => {
                        format!("Already up to date ({} at {})", into, short(&to_hex(&head)))
                    }
                    MergeOutcome::Merged { commit, applied } => format!(
                        "Merged {} into {}: commit {} ({} change(s) applied)",
                        source,
                        into,
                        commit.short_hash(),
                        applied
                    ),
                })
            }
            Commands::Status { format } => {
                let report = self.repo.health()?;
                if format == "json" {
                    to_json(&report)
                } else {
                    Ok(format_status_text(&report, &self.workspace_root))
                }
            }
            Commands::Config { format } => {
                if format == "json" {
                    to_json(self.repo.config())
                } else {
                    self.repo.config().to_toml()
                }
            }
        }
    }

    fn reference<'a>(&'a self, reference: &'a Option<String>) -> &'a str {
        reference.as_deref().unwrap_or(self.repo.default_branch())
    }

    fn branch<'a>(&'a self, branch: &'a Option<String>) -> &'a str {
        branch.as_deref().unwrap_or(self.repo.default_branch())
    }

    fn author<'a>(&'a self, author: &'a Option<String>) -> &'a str {
        author.as_deref().unwrap_or(self.repo.default_author())
    }
}

/// Load config from an explicit file or from the standard layers.
fn load_config(workspace_root: &Path, config_path: Option<&Path>) -> Result<VkvConfig, ApiError> {
    match config_path {
        Some(path) => ConfigLoader::load_from_file(path),
        None => ConfigLoader::load(workspace_root),
    }
}

fn command_name(command: &Commands) -> &'static str {
    match command {
        Commands::Init { .. } => "init",
        Commands::Tree { .. } => "tree",
        Commands::Get { .. } => "get",
        Commands::Log { .. } => "log",
        Commands::Branches { .. } => "branches",
        Commands::Branch {
            command: BranchCommands::Create { .. },
        } => "branch create",
        Commands::Branch {
            command: BranchCommands::Delete { .. },
        } => "branch delete",
        Commands::Put { .. } => "put",
        Commands::Rm { .. } => "rm",
        Commands::Diff { .. } => "diff",
        Commands::Search { .. } => "search",
        Commands::Merge { .. } => "merge",
        Commands::Status { .. } => "status",
        Commands::Config { .. } => "config",
    }
}

fn to_json<T: Serialize>(value: &T) -> Result<String, ApiError> {
    serde_json::to_string_pretty(value)
        .map_err(|e| ApiError::StorageError(StorageError::Serialization(e.to_string())))
}

fn short(hex: &str) -> &str {
    &hex[..hex.len().min(12)]
}

/// Indented listing: directories end with `/`, files show their value.
fn format_tree_text(root: &SnapshotNode) -> String {
    fn render(node: &SnapshotNode, depth: usize, out: &mut String) {
        for child in node.children.values() {
            let indent = "  ".repeat(depth);
            match child.node_type {
                NodeType::Directory => {
                    out.push_str(&format!("{}{}/\n", indent, child.key.bold()));
                    render(child, depth + 1, out);
                }
                NodeType::File => out.push_str(&format!(
                    "{}{} = {}\n",
                    indent,
                    child.key,
                    child.value.as_deref().unwrap_or_default()
                )),
            }
        }
    }

    let mut out = format!("{} ({})\n", root.key, short(&to_hex(&root.hash)).dimmed());
    if root.node_type == NodeType::File {
        out.push_str(root.value.as_deref().unwrap_or_default());
        return out;
    }
    render(root, 1, &mut out);
    out.trim_end().to_string()
}

fn format_log_text(commits: &[Commit]) -> String {
    if commits.is_empty() {
        return "No commits.".to_string();
    }
    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    table.set_header(vec!["Commit", "Date", "Author", "Branch", "Message"]);
    for commit in commits {
        let mut message = commit.message.clone();
        if commit.is_merge() {
            message = format!("(merge) {}", message);
        }
        table.add_row(vec![
            commit.short_hash(),
            commit.timestamp.to_rfc3339(),
            commit.author.clone(),
            commit.branch.clone(),
            message,
        ]);
    }
    format!("{}\n\nTotal: {} commit(s)", table, commits.len())
}

fn format_branches_text(branches: &[Branch], default_branch: &str) -> String {
    if branches.is_empty() {
        return "No branches. Run `vkv init` to create one.".to_string();
    }
    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    table.set_header(vec!["", "Branch", "Head", "Commits", "Updated"]);
    for branch in branches {
        let marker = if branch.name == default_branch { "*" } else { "" };
        table.add_row(vec![
            marker.to_string(),
            branch.name.clone(),
            short(&to_hex(&branch.head_commit)).to_string(),
            branch.commit_count.to_string(),
            branch.last_updated.to_rfc3339(),
        ]);
    }
    table.to_string()
}

fn format_diff_text(diff: &CommitDiff) -> String {
    let from = to_hex(&diff.from_commit);
    let to = to_hex(&diff.to_commit);
    let mut out = format!("{}\n", "Diff".bold().underline());
    out.push_str(&format!("From: {}\n", short(&from).yellow()));
    out.push_str(&format!("To:   {}\n\n", short(&to).yellow()));
    if diff.changes.is_empty() {
        out.push_str(&format!("{}", "No changes".dimmed()));
        return out;
    }
    for change in &diff.changes {
        let line = match change.change_type {
            ChangeType::Added => format!(
                "{}",
                format!(
                    "+ {} = {}",
                    change.path,
                    change.new_value.as_deref().unwrap_or_default()
                )
                .green()
            ),
            ChangeType::Deleted => format!("{}", format!("- {}", change.path).red()),
            ChangeType::Modified => format!(
                "{}",
                format!(
                    "~ {}: {} -> {}",
                    change.path,
                    change.old_value.as_deref().unwrap_or_default(),
                    change.new_value.as_deref().unwrap_or_default()
                )
                .yellow()
            ),
        };
        out.push_str(&line);
        out.push('\n');
    }
    out.push_str(&format!("\n{} change(s)", diff.changes.len()));
    out
}

fn format_search_text(query: &str, results: &[SearchResult]) -> String {
    if results.is_empty() {
        return format!("No keys match '{}'.", query);
    }
    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    table.set_header(vec!["Score", "Path", "Type"]);
    for result in results {
        table.add_row(vec![
            format!("{:.2}", result.relevance_score),
            result.path.clone(),
            result.node.node_type.as_str().to_string(),
        ]);
    }
    format!("{}\n\n{} result(s)", table, results.len())
}

fn format_status_text(report: &HealthReport, workspace_root: &Path) -> String {
    let mut out = format!("{}\n\n", "Repository Status".bold().underline());
    out.push_str(&format!("  Workspace: {}\n", workspace_root.display()));
    out.push_str(&format!("  Backend: {:?}\n", report.backend));
    out.push_str(&format!("  Healthy: {}\n", if report.healthy { "yes" } else { "no" }));
    out.push_str(&format!("  Objects: {}\n", report.objects));
    out.push_str(&format!("  Commits: {}\n", report.commits));
    out.push_str(&format!("  Branches: {}\n", report.branches));
    match &report.default_head {
        Some(head) => out.push_str(&format!(
            "  Default branch: {} at {}",
            report.default_branch,
            short(head)
        )),
        None => out.push_str(&format!(
            "  Default branch: {} (not initialized)",
            report.default_branch
        )),
    }
    out
}
