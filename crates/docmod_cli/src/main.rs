//! DocMod CLI
//!
//! Command-line front end for batch document modification against a
//! file-backed store.
//!
//! # Commands
//!
//! - `run` - Apply a regex rewrite to selected documents
//! - `check-locks` - Report which selected documents are checked out
//! - `inspect` - Summarize the documents in a store file

mod commands;
mod logging;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// DocMod batch document modification tools.
#[derive(Parser)]
#[command(name = "docmod")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    /// Suppress log output on stderr
    #[arg(global = true, short, long)]
    quiet: bool,

    /// Also append log output to this file
    #[arg(global = true, long)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply a regex rewrite to selected documents
    Run(commands::run::RunArgs),

    /// Report which selected documents are checked out
    CheckLocks {
        /// Path to the store file
        #[arg(short, long)]
        store: PathBuf,

        /// Document ids, comma separated
        #[arg(long, value_delimiter = ',', conflicts_with = "ids_file")]
        ids: Vec<String>,

        /// File with one document id per line
        #[arg(long)]
        ids_file: Option<PathBuf>,

        /// Session name used to open the store
        #[arg(long, default_value = docmod_core::DEFAULT_SESSION)]
        session: String,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Summarize the documents in a store file
    Inspect {
        /// Path to the store file
        #[arg(short, long)]
        store: PathBuf,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    logging::init(cli.verbose, cli.quiet, cli.log_file.as_deref())?;

    match cli.command {
        Commands::Run(args) => {
            commands::run::run(&args)?;
        }
        Commands::CheckLocks {
            store,
            ids,
            ids_file,
            session,
            format,
        } => {
            let selector = commands::IdSource::new(ids, ids_file);
            commands::check_locks::run(&store, &selector, &session, &format)?;
        }
        Commands::Inspect { store, format } => {
            commands::inspect::run(&store, &format)?;
        }
        Commands::Version => {
            println!("DocMod CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("DocMod Core v{}", docmod_core::VERSION);
        }
    }

    Ok(())
}
