//! Tooling & Integration Layer
//!
//! Command-line entry points over the repository API.

pub mod cli;

pub use cli::{BranchCommands, Cli, CliContext, Commands};
