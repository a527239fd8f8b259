// SPDX-FileCopyrightText: 2026 Convoflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Convoflow - a memory-augmented Gemini agent for real-time chat rooms.
//!
//! This is the binary entry point for the Convoflow agent.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

mod check;
mod serve;

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use convoflow_config::{ConvoflowConfig, Credentials};

/// Convoflow - a memory-augmented Gemini agent for real-time chat rooms.
#[derive(Parser, Debug)]
#[command(name = "convoflow", version, about, long_about = None)]
struct Cli {
    /// Load configuration from this file instead of the XDG hierarchy.
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug, PartialEq, Eq)]
enum Commands {
    /// Join the room and relay messages until interrupted (default).
    Serve,
    /// Validate configuration and credentials, then check each service.
    Check {
        /// Disable colored output.
        #[arg(long)]
        plain: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let loaded = match &cli.config {
        Some(path) => convoflow_config::load_and_validate_path(path),
        None => convoflow_config::load_and_validate(),
    };
    let config = match loaded {
        Ok(config) => config,
        Err(errors) => {
            convoflow_config::render_errors(&errors);
            std::process::exit(1);
        }
    };

    let config_path = cli.config.as_deref();
    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => {
            let credentials = credentials_or_exit(&config, config_path);
            if let Err(e) = serve::run_serve(config, credentials).await {
                eprintln!("error: {e}");
                std::process::exit(1);
            }
        }
        Commands::Check { plain } => {
            let credentials = credentials_or_exit(&config, config_path);
            let failures = check::run_check(&config, &credentials, plain).await;
            if failures > 0 {
                std::process::exit(1);
            }
        }
    }
}

fn credentials_or_exit(config: &ConvoflowConfig, config_path: Option<&Path>) -> Credentials {
    match convoflow_config::resolve_credentials(config) {
        Ok(credentials) => credentials,
        Err(errors) => {
            let sources = convoflow_config::config_sources(config_path);
            convoflow_config::render_errors(&convoflow_config::locate_errors(errors, &sources));
            std::process::exit(1);
        }
    }
}
