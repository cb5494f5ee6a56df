//! # Tidemark CLI Module
//!
//! This module implements the CLI interface for Tidemark.
//!
//! ## Available Commands
//!
//! - `init` - Initialize a new database
//! - `ingest` - Ingest readings from a CSV file into a dataset
//! - `reduce` - Locate measurements and calculate values
//! - `status` - Show stored datasets
//! - `flags` - Summarize reading flags of a dataset

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tidemark_core::TidemarkError;

pub use commands::*;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// Tidemark - underway sensor QC and reduction
///
/// Turns raw instrument readings into flagged measurement values.
#[derive(Parser, Debug)]
#[command(name = "tidemark")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress banner output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to the sensor value database
    #[arg(short = 'D', long, global = true, default_value = "tidemark.db")]
    pub database: PathBuf,

    /// Path to the instrument configuration (TOML)
    #[arg(short = 'C', long, global = true, default_value = "tidemark.toml")]
    pub config: PathBuf,

    /// Output in JSON format (for programmatic access)
    #[arg(long, global = true)]
    pub json_mode: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize a new empty database
    Init {
        /// Force initialization even if database exists
        #[arg(short, long)]
        force: bool,
    },

    /// Ingest readings from a CSV file
    ///
    /// The header row is `time` followed by column ids; each further row is
    /// a timestamp and one value per column.
    Ingest {
        /// Path to the input file
        #[arg(short, long)]
        file: PathBuf,

        /// Dataset to ingest into
        #[arg(short = 's', long)]
        dataset: u64,

        /// Dataset name (defaults to the file name)
        #[arg(short, long)]
        name: Option<String>,
    },

    /// Reduce datasets of the configured instrument
    Reduce {
        /// Reduce only this dataset
        #[arg(short = 's', long)]
        dataset: Option<u64>,

        /// Write all export records to this file in canonical format
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show stored datasets
    Status,

    /// Summarize reading flags of a dataset
    Flags {
        /// Dataset to summarize
        #[arg(short = 's', long)]
        dataset: u64,
    },
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

/// Execute the CLI with parsed arguments.
pub async fn execute(cli: Cli) -> Result<(), TidemarkError> {
    let json_mode = cli.json_mode;

    match cli.command {
        Some(Commands::Init { force }) => cmd_init(&cli.database, force),
        Some(Commands::Ingest {
            file,
            dataset,
            name,
        }) => cmd_ingest(
            &cli.database,
            &cli.config,
            json_mode,
            &file,
            dataset,
            name.as_deref(),
        ),
        Some(Commands::Reduce { dataset, output }) => {
            cmd_reduce(
                &cli.database,
                &cli.config,
                json_mode,
                dataset,
                output.as_deref(),
            )
            .await
        }
        Some(Commands::Flags { dataset }) => {
            cmd_flags(&cli.database, &cli.config, json_mode, dataset)
        }
        Some(Commands::Status) | None => cmd_status(&cli.database, json_mode),
    }
}
