//! CLI parse and output contract tests

mod output_contracts;
mod parse_commands;
