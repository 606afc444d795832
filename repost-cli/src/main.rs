//! Repost CLI - near-duplicate media detection for chat archives.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use tracing_subscriber::EnvFilter;

mod commands;
mod exit_codes;
mod utils;

use exit_codes::ExitCode;

const EXIT_CODES_HELP: &str = "\
Exit codes:
  0   Success
  1   General error
  64  Usage error
  65  Malformed input (message or export file)
  66  Input file not found
  69  Hash store unavailable";

#[derive(Parser)]
#[command(name = "repost")]
#[command(author, version, about = "Near-duplicate media detection for chat archives", long_about = None)]
#[command(after_help = EXIT_CODES_HELP)]
struct Cli {
    /// Enable debug logging (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Only print errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Output format
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable output
    Text,
    /// One JSON document on stdout
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Hash a message's media and record it in the hash store
    HashMessage {
        /// Message JSON file
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },

    /// Hash every message of a JSON-lines backlog export
    Scan {
        /// Backlog export, one message per line
        #[arg(value_name = "EXPORT")]
        export: PathBuf,

        /// Messages processed in parallel (default: REPOST_SCAN_CONCURRENCY or 10)
        #[arg(short, long)]
        concurrency: Option<usize>,

        /// Also hash messages posted inside threads
        #[arg(long)]
        include_threads: bool,

        /// Skip messages older than this date (YYYY-MM-DD or RFC 3339)
        #[arg(long, value_name = "DATE")]
        since: Option<String>,

        /// Messages read from the export per batch
        #[arg(long, default_value_t = 100)]
        batch_size: usize,
    },

    /// Look for earlier posts of a message's media without storing anything
    Check {
        /// Message JSON file
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Maximum Hamming distance (default: REPOST_SIMILAR_THRESHOLD or 24)
        #[arg(short, long)]
        threshold: Option<u32>,
    },

    /// Show hash store size and backend
    Stats,
}

fn init_tracing(verbose: bool, quiet: bool) {
    let default = if verbose {
        "repost_cli=debug,repost_core=debug"
    } else if quiet {
        "error"
    } else {
        "warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            // --help and --version also arrive here, on stdout
            let code = if err.use_stderr() {
                exit_codes::USAGE_ERROR
            } else {
                exit_codes::SUCCESS
            };
            let _ = err.print();
            std::process::exit(code);
        }
    };
    init_tracing(cli.verbose, cli.quiet);

    let result = match cli.command {
        Commands::HashMessage { file } => {
            commands::hash::execute(file, cli.format, cli.quiet).await
        }
        Commands::Scan {
            export,
            concurrency,
            include_threads,
            since,
            batch_size,
        } => {
            commands::scan::execute(
                commands::scan::ScanArgs {
                    export,
                    concurrency,
                    include_threads,
                    since,
                    batch_size,
                },
                cli.format,
                cli.quiet,
            )
            .await
        }
        Commands::Check { file, threshold } => {
            commands::check::execute(file, threshold, cli.format, cli.quiet).await
        }
        Commands::Stats => commands::stats::execute(cli.format).await,
    };

    let exit = match result {
        Ok(()) => ExitCode::success(),
        Err(err) => ExitCode::from_anyhow(&err),
    };

    if let Some(message) = &exit.message {
        eprintln!("{} {}", "Error:".red().bold(), message);
    }
    std::process::exit(exit.code);
}
