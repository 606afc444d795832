//! Stats command implementation.

use anyhow::Result;
use colored::Colorize;
use repost_core::DetectorConfig;

use crate::utils::open_detector;
use crate::OutputFormat;

/// Execute the stats command.
pub async fn execute(format: OutputFormat) -> Result<()> {
    let detector = open_detector(DetectorConfig::from_env()).await?;
    let store = detector.store();
    let records = store.len().await;

    match format {
        OutputFormat::Json => {
            let json = serde_json::json!({
                "records": records,
                "backend": store.backend_name(),
            });
            println!("{json}");
        }
        OutputFormat::Text => {
            println!("   {} {}", "Records:".dimmed(), records);
            println!("   {} {}", "Backend:".dimmed(), store.backend_name());
        }
    }

    Ok(())
}
