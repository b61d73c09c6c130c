//! vkv CLI Binary
//!
//! Command-line interface for the versioned key-value store.

use anyhow::Context;
use clap::Parser;
use std::process;
use vkv::logging::{init_logging, LoggingConfig};
use vkv::tooling::cli::{Cli, CliContext};

fn main() {
    let cli = Cli::parse();

    let context = match CliContext::new(cli.workspace.clone(), cli.config.clone())
        .context("Error initializing workspace")
    {
        Ok(ctx) => ctx,
        Err(e) => {
            eprintln!("{:#}", e);
            process::exit(1);
        }
    };

    let logging = logging_config(&cli, context.config().logging.clone());
    if let Err(e) = init_logging(Some(&logging)) {
        eprintln!("Warning: {}", e);
    }

    match context.execute(&cli.command) {
        Ok(output) => {
            println!("{}", output);
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    }
}

/// Fold CLI logging flags over the configured logging section.
fn logging_config(cli: &Cli, mut config: LoggingConfig) -> LoggingConfig {
    if let Some(level) = &cli.log_level {
        config.level = level.clone();
    }
    if let Some(format) = &cli.log_format {
        config.format = format.clone();
    }
    if let Some(output) = &cli.log_output {
        config.output = output.clone();
    }
    if let Some(file) = &cli.log_file {
        config.file = Some(file.clone());
    }
    config
}
