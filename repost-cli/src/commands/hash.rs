//! Hash-message command implementation.

use std::path::PathBuf;

use anyhow::{Context, Result};
use colored::Colorize;
use repost_core::DetectorConfig;
use tracing::info;

use crate::utils::{describe_backend, format_timestamp, load_message, open_detector};
use crate::OutputFormat;

/// Execute the hash-message command.
pub async fn execute(file: PathBuf, format: OutputFormat, quiet: bool) -> Result<()> {
    let message = load_message(&file)?;
    let detector = open_detector(DetectorConfig::from_env()).await?;

    let report = detector.hash_message(&message).await;
    info!(
        hashed = report.hashed,
        stored = report.stored,
        failed = report.failed,
        prior_posts = report.prior_posts.len(),
        "Message hashed"
    );

    if format == OutputFormat::Json {
        let json = serde_json::to_string_pretty(&report).context("Failed to serialize report")?;
        println!("{json}");
        return Ok(());
    }

    if quiet {
        return Ok(());
    }

    println!(
        "{} {} new hash(es) stored ({} media hashed, {} failed)",
        "Done:".green().bold(),
        report.stored,
        report.hashed,
        report.failed
    );
    println!("   {} {}", "Store:".dimmed(), describe_backend(&detector));

    if report.prior_posts.is_empty() {
        return Ok(());
    }

    println!();
    println!("{}", "Already posted:".yellow().bold());
    for prior in &report.prior_posts {
        let posted = &prior.record.message;
        println!(
            "   {} {} by {} ({} bits apart)",
            format_timestamp(posted.timestamp).dimmed(),
            posted.jump_url(),
            posted.author_name.as_deref().unwrap_or(&posted.author_id),
            prior.distance
        );
    }

    Ok(())
}
