// Copyright 2026 Lanemap Contributors
// SPDX-License-Identifier: Apache-2.0

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

mod cli;
mod map;
mod query;

#[derive(Parser)]
#[command(
    name = "lanemap",
    about = "Lanemap — query and traversal helpers for lanelet road-network maps",
    version,
    after_help = "Run 'lanemap <command> --help' for details on each command."
)]
struct Cli {
    /// Output results as JSON (machine-readable)
    #[arg(long, global = true)]
    json: bool,

    /// Suppress non-essential output
    #[arg(long, short, global = true)]
    quiet: bool,

    /// Enable verbose/debug logging
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show layer and usage statistics for a map
    Info {
        /// Path to the OSM map file
        map: PathBuf,
    },
    /// List lanelets, optionally filtered by subtype
    Lanelets {
        /// Path to the OSM map file
        map: PathBuf,
        /// Only lanelets with this subtype (e.g. "road", "crosswalk")
        #[arg(long)]
        subtype: Option<String>,
    },
    /// Extract stop lines from the map's lanelets
    Stoplines {
        /// Path to the OSM map file
        map: PathBuf,
        /// Only stop lines of traffic signs with this type (e.g. "stop_sign")
        #[arg(long)]
        sign_type: Option<String>,
    },
    /// Find every primitive referencing a given one
    Refs {
        /// Path to the OSM map file
        map: PathBuf,
        /// Layer of the queried primitive (point, line_string, lanelet, area, regulatory_element)
        #[arg(long)]
        layer: String,
        /// Id of the queried primitive
        #[arg(long)]
        id: i64,
    },
    /// Generate shell completion scripts
    Completions {
        /// Shell type (bash, zsh, fish, powershell)
        shell: Shell,
    },
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose { "lanemap=debug" } else { "warn" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set global flags via environment variables so all modules can check them
    if cli.json {
        std::env::set_var("LANEMAP_JSON", "1");
    }
    if cli.quiet {
        std::env::set_var("LANEMAP_QUIET", "1");
    }
    if cli.verbose {
        std::env::set_var("LANEMAP_VERBOSE", "1");
    }

    init_tracing(cli.verbose);

    let result = match cli.command {
        Commands::Info { map } => cli::info_cmd::run(&map),
        Commands::Lanelets { map, subtype } => cli::lanelets_cmd::run(&map, subtype.as_deref()),
        Commands::Stoplines { map, sign_type } => {
            cli::stoplines_cmd::run(&map, sign_type.as_deref())
        }
        Commands::Refs { map, layer, id } => cli::refs_cmd::run(&map, &layer, id),
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "lanemap", &mut std::io::stdout());
            Ok(())
        }
    };

    // Consistent exit codes: 0=success, 1=error
    if let Err(e) = &result {
        if !cli::output::is_quiet() && !cli::output::is_json() {
            eprintln!("  Error: {e:#}");
        }
        if cli::output::is_json() {
            cli::output::print_json(&serde_json::json!({
                "error": true,
                "message": format!("{e:#}"),
            }));
        }
        std::process::exit(1);
    }

    result
}
