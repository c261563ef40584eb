// SPDX-FileCopyrightText: 2026 Hearth Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Hearth - a local-first AI assistant gateway.
//!
//! Binary entry point: parses the CLI and hands off to the subcommand
//! implementations.

use clap::{Parser, Subcommand};

mod serve;
mod status;

/// Hearth - a local-first AI assistant gateway.
#[derive(Parser, Debug)]
#[command(name = "hearth", version, about, long_about = None)]
struct Cli {
    /// Override the data directory (default: the platform data dir).
    #[arg(long, global = true)]
    data_dir: Option<std::path::PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the gateway server.
    Serve,
    /// Print configuration and credential status.
    Status,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Serve => serve::run_serve(cli.data_dir).await,
        Commands::Status => status::run_status(cli.data_dir).await,
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
