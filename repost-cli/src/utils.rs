//! Common utility functions shared across CLI commands.

use std::path::Path;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use repost_core::{Detector, DetectorConfig, MemoryLedger, Message};
use tracing::debug;

/// Load a single message from a JSON file.
pub fn load_message(path: &Path) -> Result<Message> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("Failed to read message file: {}", path.display()))?;

    let message: Message = serde_json::from_slice(&bytes)
        .with_context(|| format!("Failed to parse message file: {}", path.display()))?;

    debug!(id = %message.reference.id, media = message.media().len(), "Loaded message");
    Ok(message)
}

/// Build the detector from the environment, loading the whole hash store.
pub async fn open_detector(config: DetectorConfig) -> Result<Detector> {
    Detector::from_config(config)
        .await
        .context("Failed to load hash store")
}

/// Backend line for text output, flagging stores that do not outlive the process.
pub fn describe_backend(detector: &Detector) -> String {
    let backend = detector.store().backend_name();
    if backend == MemoryLedger::BACKEND_NAME {
        format!("{backend} (records are not kept after exit; set DATABASE_URL to persist)")
    } else {
        backend.to_string()
    }
}

/// Parse a `--since` value: either a plain date (midnight UTC) or RFC 3339.
pub fn parse_since(value: &str) -> Result<DateTime<Utc>> {
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        if let Some(midnight) = date.and_hms_opt(0, 0, 0) {
            return Ok(midnight.and_utc());
        }
    }
    match DateTime::parse_from_rfc3339(value) {
        Ok(dt) => Ok(dt.with_timezone(&Utc)),
        Err(_) => bail!("Invalid date '{value}', expected YYYY-MM-DD or RFC 3339"),
    }
}

/// Format a timestamp as a human-readable UTC string.
pub fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_parse_since() {
        assert_eq!(
            parse_since("2024-02-01").unwrap(),
            Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap()
        );
        assert_eq!(
            parse_since("2024-02-01T10:00:00+02:00").unwrap(),
            Utc.with_ymd_and_hms(2024, 2, 1, 8, 0, 0).unwrap()
        );
        assert!(parse_since("last tuesday").is_err());
    }

    #[test]
    fn test_format_timestamp() {
        let ts = Utc.with_ymd_and_hms(2024, 1, 15, 12, 30, 45).unwrap();
        let formatted = format_timestamp(ts);
        assert!(formatted.contains("2024-01-15"));
        assert!(formatted.contains("UTC"));
    }

    #[test]
    fn test_load_message_missing_file() {
        let err = load_message(Path::new("/nonexistent/message.json")).unwrap_err();
        assert!(format!("{err:#}").contains("Failed to read message file"));
    }
}
