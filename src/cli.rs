//! CLI definitions for sheetstream.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// sheetstream CLI.
#[derive(Parser)]
#[command(name = "sheetstream")]
#[command(about = "Parallel streaming scheduler for spreadsheet-driven AI chat automation")]
#[command(version)]
pub(crate) struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "config/default.toml", global = true, env = "SHEETSTREAM_CONFIG")]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub(crate) enum Commands {
    /// Analyze a grid and print the task plan
    Plan {
        /// Grid file: a JSON array of string rows
        #[arg(long)]
        grid: PathBuf,

        /// Print tasks and warnings as JSON
        #[arg(long)]
        json: bool,
    },

    /// Stream a grid through simulated windows
    Run {
        /// Grid file: a JSON array of string rows
        #[arg(long)]
        grid: PathBuf,

        /// Skip windows and prompts, answer after a random delay
        #[arg(long)]
        test_mode: bool,

        /// Write the resulting grid here
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Exclusive marker helpers
    Marker {
        #[command(subcommand)]
        action: MarkerAction,
    },

    /// Configuration helpers
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
pub(crate) enum MarkerAction {
    /// Print a fresh marker for this worker
    Create {
        /// Special feature, e.g. "Deep Research"
        #[arg(long)]
        feature: Option<String>,
    },

    /// Parse a marker and report whether it has timed out
    Check {
        /// Marker text
        marker: String,

        /// Feature the marker was written for
        #[arg(long)]
        feature: Option<String>,
    },
}

#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Validate the configuration file
    Validate,

    /// Print the effective configuration as TOML
    Show,
}
