//! Check command implementation.

use std::path::PathBuf;

use anyhow::{Context, Result};
use colored::Colorize;
use repost_core::DetectorConfig;
use tracing::info;

use crate::utils::{describe_backend, format_timestamp, load_message, open_detector};
use crate::OutputFormat;

/// Execute the check command.
pub async fn execute(
    file: PathBuf,
    threshold: Option<u32>,
    format: OutputFormat,
    quiet: bool,
) -> Result<()> {
    let message = load_message(&file)?;
    let config = DetectorConfig::from_env();
    let threshold = threshold.unwrap_or(config.similar_threshold);
    let detector = open_detector(config).await?;

    let matches = detector.find_matches(&message, threshold).await;
    info!(threshold, matches = matches.len(), "Check finished");

    if format == OutputFormat::Json {
        let json = serde_json::to_string_pretty(&matches).context("Failed to serialize matches")?;
        println!("{json}");
        return Ok(());
    }

    if quiet {
        return Ok(());
    }

    println!("   {} {}", "Store:".dimmed(), describe_backend(&detector));

    let Some(original) = matches.first() else {
        println!("{} (threshold {threshold})", "No match".green().bold());
        return Ok(());
    };

    println!();
    println!(
        "{} first posted {} at {}",
        "Match:".yellow().bold(),
        format_timestamp(original.record.message.timestamp),
        original.record.message.jump_url()
    );
    println!();
    for (i, found) in matches.iter().enumerate() {
        let posted = &found.record.message;
        println!(
            "   {:>2}. {} {} ({} bits apart)",
            i + 1,
            format_timestamp(posted.timestamp).dimmed(),
            posted.jump_url(),
            found.distance
        );
    }

    Ok(())
}
