// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Knita Contributors

//! The `knita` CLI: launches a build pattern and hosts the in-process
//! director, broker, and executor it talks to.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod commands;
mod config;
mod exit_error;

use clap::{Parser, Subcommand};
use exit_error::ExitError;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "knita", about = "Knita distributed build orchestration")]
struct Cli {
    /// Path to the config file (default: $HOME/.knita.yaml).
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Executes the specified build pattern.
    Build {
        /// Disables the build UI and routes the build log to stdout.
        #[arg(short, long)]
        verbose: bool,

        /// The pattern command and its arguments.
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        pattern: Vec<String>,
    },
    /// Prints the Knita version.
    Version,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let result = match cli.command {
        Command::Build { verbose, pattern } => {
            commands::build::run(cli.config.as_deref(), verbose, &pattern).await
        }
        Command::Version => commands::version::run(),
    };
    if let Err(e) = result {
        if !e.message.is_empty() {
            eprintln!("{e}");
        }
        std::process::exit(e.code);
    }
}

#[cfg(test)]
#[path = "main_tests.rs"]
mod tests;
