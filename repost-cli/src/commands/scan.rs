//! Scan command implementation.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use colored::Colorize;
use repost_core::{BulkScanner, DetectorConfig, JsonlMessageSource, ScanOptions};
use tracing::info;

use crate::utils::{open_detector, parse_since};
use crate::OutputFormat;

/// Arguments of the scan command.
pub struct ScanArgs {
    pub export: PathBuf,
    pub concurrency: Option<usize>,
    pub include_threads: bool,
    pub since: Option<String>,
    pub batch_size: usize,
}

/// Execute the scan command.
pub async fn execute(args: ScanArgs, format: OutputFormat, quiet: bool) -> Result<()> {
    let since = args.since.as_deref().map(parse_since).transpose()?;
    let source = JsonlMessageSource::open(&args.export, args.batch_size)
        .await
        .context("Failed to read export")?;

    let config = DetectorConfig::from_env();
    let options = ScanOptions {
        concurrency: args.concurrency.unwrap_or(config.scan_concurrency).max(1),
        include_threads: args.include_threads,
        since,
    };
    let detector = Arc::new(open_detector(config).await?);

    info!(
        export = %args.export.display(),
        concurrency = options.concurrency,
        include_threads = options.include_threads,
        "Starting scan"
    );

    let scanner = BulkScanner::new(detector, options);
    let (mut progress, handle) = scanner.spawn(source);

    let show_progress = format == OutputFormat::Text && !quiet;
    while let Some(update) = progress.recv().await {
        if show_progress {
            eprintln!(
                "{} {} messages, {} hashes stored, {} failed",
                "Progress:".cyan(),
                update.messages_processed,
                update.hashes_stored,
                update.media_failed
            );
        }
    }

    let summary = handle.await.context("Scan task failed")??;

    if format == OutputFormat::Json {
        let json = serde_json::to_string_pretty(&summary).context("Failed to serialize summary")?;
        println!("{json}");
        return Ok(());
    }

    if !quiet {
        let totals = summary.totals;
        println!();
        println!("{}", "Scan complete".green().bold());
        println!("   {} {}", "Messages:".dimmed(), totals.messages_processed);
        println!("   {} {}", "Skipped:".dimmed(), totals.messages_skipped);
        println!("   {} {}", "Media hashed:".dimmed(), totals.media_hashed);
        println!("   {} {}", "Hashes stored:".dimmed(), totals.hashes_stored);
        println!("   {} {}", "Failed:".dimmed(), totals.media_failed);
        println!("   {} {:.1}s", "Elapsed:".dimmed(), summary.elapsed.as_secs_f64());
    }

    Ok(())
}
