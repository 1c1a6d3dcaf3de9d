//! Command-line argument definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Pump history importer.
///
/// Normalizes decoded insulin pump history into bolus, temp basal, suspend and
/// resume doses, and stores them in a local database.
#[derive(Debug, Parser)]
#[command(name = "pd", version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to config file.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Normalize history files and store the resulting pump events.
    Import {
        /// JSON-lines history files (`.gz` files are decompressed).
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Print normalized pump events as JSON lines without storing them.
    Normalize {
        /// JSON-lines history file (`.gz` files are decompressed).
        file: PathBuf,
    },

    /// List stored pump events.
    Events {
        /// Only events at or after this time (ISO 8601 or e.g. "2 hours ago").
        #[arg(long)]
        after: Option<String>,

        /// Only events before this time (ISO 8601 or e.g. "2 hours ago").
        #[arg(long)]
        before: Option<String>,

        /// Output JSON lines instead of a table.
        #[arg(long)]
        json: bool,
    },

    /// Show what is stored.
    Status,
}
