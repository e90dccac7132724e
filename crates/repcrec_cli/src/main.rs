//! RepCRec CLI
//!
//! Runs instruction scripts against the replicated engine.
//!
//! # Commands
//!
//! - `run` - Execute a script and print one line per outcome
//! - `check` - Parse a script without running it
//! - `version` - Show version information

mod commands;

use clap::{Parser, Subcommand};
use commands::run::{OutputFormat, RunOptions};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Replicated concurrency control and recovery simulator.
#[derive(Parser)]
#[command(name = "repcrec")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable debug logging on stderr
    #[arg(global = true, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a script
    Run {
        /// Script file (omit with --stdin)
        script: Option<PathBuf>,

        /// Read the script from standard input
        #[arg(short = 'i', long)]
        stdin: bool,

        /// Number of sites
        #[arg(short = 'n', long)]
        sites: Option<u32>,

        /// Number of variables
        #[arg(short = 'v', long)]
        variables: Option<u32>,

        /// Write outcome lines to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// JSON configuration file; flags take precedence
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Abort a transaction after this many retries of a deferred read
        #[arg(long)]
        retry_limit: Option<u32>,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Parse a script and report syntax errors
    Check {
        /// Script file
        script: PathBuf,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Diagnostics go to stderr so they never mix with outcome lines.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if cli.verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("warn")
        }
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Run {
            script,
            stdin,
            sites,
            variables,
            output,
            config,
            retry_limit,
            format,
        } => {
            if script.is_none() && !stdin {
                return Err("a script path or --stdin is required".into());
            }
            let options = RunOptions {
                script: if stdin { None } else { script },
                output,
                config,
                sites,
                variables,
                retry_limit,
                format: OutputFormat::parse(&format)?,
            };
            commands::run::run(&options)?;
        }
        Commands::Check { script } => {
            commands::check::run(&script)?;
        }
        Commands::Version => {
            println!("RepCRec CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("RepCRec Core v{}", repcrec_core::VERSION);
        }
    }

    Ok(())
}
