//! FavorDB CLI
//!
//! Operator tools for a Favor store file. Never run these against a store
//! the app currently has open; `migrate` and `compact` take the store lock
//! and fail if it is held.
//!
//! # Commands
//!
//! - `locate` - Print the resolved store path
//! - `inspect` - Display header, frame and entity counts
//! - `verify` - Check frames and decode every known entity
//! - `migrate` - Bring the store to the current schema version
//! - `compact` - Rewrite the store as a single snapshot frame

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// FavorDB store tools.
#[derive(Parser)]
#[command(name = "favordb")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the store file
    #[arg(global = true, short, long)]
    path: Option<PathBuf>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the resolved store path
    Locate,

    /// Display store statistics and metadata
    Inspect {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Verify store integrity without modifying it
    Verify,

    /// Migrate the store to the current schema version
    Migrate {
        /// Dry run - show which steps would run
        #[arg(short, long)]
        dry_run: bool,
    },

    /// Compact the store into a single snapshot
    Compact,

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Locate => {
            let path = cli.path.ok_or("Store path required for locate")?;
            commands::locate::run(&path)?;
        }
        Commands::Inspect { format } => {
            let path = cli.path.ok_or("Store path required for inspect")?;
            commands::inspect::run(&path, &format)?;
        }
        Commands::Verify => {
            let path = cli.path.ok_or("Store path required for verify")?;
            commands::verify::run(&path)?;
        }
        Commands::Migrate { dry_run } => {
            let path = cli.path.ok_or("Store path required for migrate")?;
            commands::migrate::run(&path, dry_run)?;
        }
        Commands::Compact => {
            let path = cli.path.ok_or("Store path required for compact")?;
            commands::compact::run(&path)?;
        }
        Commands::Version => {
            println!("FavorDB CLI v{}", env!("CARGO_PKG_VERSION"));
            println!(
                "Store format v{}, schema v{}",
                favordb_core::format::FORMAT_VERSION,
                favordb_model::TARGET_SCHEMA_VERSION
            );
        }
    }

    Ok(())
}
