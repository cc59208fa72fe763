// SPDX-FileCopyrightText: 2026 Chronofact Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Chronofact -- a fact-grounded timeline construction service.
//!
//! Binary entry point: `serve` runs the HTTP service, `doctor` checks the
//! environment, and the one-shot subcommands drive single operations from
//! the command line.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod app;
mod doctor;
mod oneshot;
mod serve;

/// Chronofact -- fact-grounded timeline construction.
#[derive(Parser, Debug)]
#[command(name = "chronofact", version, about, long_about = None)]
struct Cli {
    /// Path to a configuration file (overrides the XDG lookup).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the Chronofact HTTP service.
    Serve,
    /// Run diagnostic checks against the environment.
    Doctor,
    /// Build one timeline and print it as JSON.
    Timeline {
        /// Topic to build the timeline for.
        topic: String,
        /// Number of events.
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
    /// Run one hybrid search and print the hits as JSON.
    Search {
        /// Search query.
        query: String,
        /// Number of results.
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
    /// Run one memory decay and consolidation sweep.
    Sweep,
}

fn load_config(path: Option<&PathBuf>) -> chronofact_config::ChronofactConfig {
    let result = match path {
        Some(path) => chronofact_config::load_config_from_path(path),
        None => chronofact_config::load_config(),
    };
    let config = match result {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: failed to load configuration: {e}");
            std::process::exit(2);
        }
    };
    if let Err(errors) = chronofact_config::validate_config(&config) {
        for error in &errors {
            eprintln!("error: {error}");
        }
        std::process::exit(2);
    }
    config
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_ref());

    let result = match cli.command {
        Commands::Serve => serve::run_serve(config).await,
        Commands::Doctor => doctor::run_doctor(&config).await,
        Commands::Timeline { topic, limit } => oneshot::run_timeline(config, &topic, limit).await,
        Commands::Search { query, limit } => oneshot::run_search(config, &query, limit).await,
        Commands::Sweep => oneshot::run_sweep(config).await,
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    #[test]
    #[cfg(not(target_env = "msvc"))]
    fn jemalloc_is_active() {
        // Verify jemalloc is the global allocator by advancing the epoch.
        // Only jemalloc supports this; the system allocator would fail.
        use tikv_jemalloc_ctl::{epoch, stats};
        epoch::advance().unwrap();
        let allocated = stats::allocated::read().unwrap();
        assert!(allocated > 0, "jemalloc should report non-zero allocation");
    }
}
