//! CLI integration tests for repost-cli.
//!
//! These tests run the actual binary against the in-memory ledger and
//! check outputs and exit codes.

use std::fs;
use std::io::Cursor;
use std::path::Path;

use assert_cmd::Command;
use image::{DynamicImage, ImageBuffer, Rgb};
use predicates::prelude::*;
use tempfile::TempDir;

/// Get a Command for the repost binary, always on the in-memory ledger.
fn repost() -> Command {
    let mut cmd = Command::cargo_bin("repost").unwrap();
    cmd.env_remove("DATABASE_URL").env_remove("RUST_LOG");
    cmd
}

fn write_png(path: &Path, seed: u32) {
    let img = ImageBuffer::from_fn(64, 64, |x, y| {
        if (x / 8 + y / 8 + seed) % 3 == 0 {
            Rgb([240u8, 240, 240])
        } else {
            Rgb([20u8, 20, 20])
        }
    });
    let mut buffer = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(img)
        .write_to(&mut buffer, image::ImageFormat::Png)
        .unwrap();
    fs::write(path, buffer.into_inner()).unwrap();
}

fn message_json(id: &str, date: &str, media: &Path) -> String {
    let url = url::Url::from_file_path(media).unwrap();
    format!(
        r#"{{"id":"{id}","channel_id":"c","guild_id":"g","author_id":"u","timestamp":"{date}T00:00:00Z","attachments":[{{"url":"{url}"}}]}}"#
    )
}

// ============================================================================
// Help and Version Tests
// ============================================================================

#[test]
fn test_help_displays_usage() {
    repost()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Near-duplicate media detection"))
        .stdout(predicate::str::contains("hash-message"))
        .stdout(predicate::str::contains("scan"))
        .stdout(predicate::str::contains("check"))
        .stdout(predicate::str::contains("stats"));
}

#[test]
fn test_version_displays_version() {
    repost()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("repost"));
}

#[test]
fn test_help_shows_exit_codes() {
    repost()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Exit codes:"))
        .stdout(predicate::str::contains("66"));
}

#[test]
fn test_scan_help_shows_options() {
    repost()
        .args(["scan", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--concurrency"))
        .stdout(predicate::str::contains("--include-threads"))
        .stdout(predicate::str::contains("--since"));
}

// ============================================================================
// Exit Code Tests
// ============================================================================

#[test]
fn test_unknown_subcommand_is_usage_error() {
    repost().arg("frobnicate").assert().code(64);
}

#[test]
fn test_missing_file_returns_input_error() {
    repost()
        .args(["hash-message", "nonexistent_message.json"])
        .assert()
        .code(66)
        .stderr(predicate::str::contains("Failed to read message file"));
}

#[test]
fn test_invalid_message_returns_data_error() {
    let temp = TempDir::new().unwrap();
    let file = temp.path().join("message.json");
    fs::write(&file, b"{ not a message").unwrap();

    repost()
        .args(["check", file.to_str().unwrap()])
        .assert()
        .code(65)
        .stderr(predicate::str::contains("Failed to parse message file"));
}

#[test]
fn test_invalid_since_returns_data_error() {
    let temp = TempDir::new().unwrap();
    let export = temp.path().join("export.jsonl");
    fs::write(&export, b"").unwrap();

    repost()
        .args(["scan", export.to_str().unwrap(), "--since", "yesterday"])
        .assert()
        .code(65)
        .stderr(predicate::str::contains("Invalid date"));
}

// ============================================================================
// Command Tests
// ============================================================================

#[test]
fn test_hash_message_stores_hash() {
    let temp = TempDir::new().unwrap();
    let image = temp.path().join("meme.png");
    write_png(&image, 1);
    let file = temp.path().join("message.json");
    fs::write(&file, message_json("1", "2024-01-01", &image)).unwrap();

    repost()
        .args(["hash-message", file.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("1 new hash(es) stored"))
        .stdout(predicate::str::contains("not kept after exit"));
}

#[test]
fn test_hash_message_json_output() {
    let temp = TempDir::new().unwrap();
    let image = temp.path().join("meme.png");
    write_png(&image, 2);
    let file = temp.path().join("message.json");
    fs::write(&file, message_json("1", "2024-01-01", &image)).unwrap();

    let output = repost()
        .args(["--format", "json", "hash-message", file.to_str().unwrap()])
        .output()
        .unwrap();
    assert!(output.status.success());

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["hashed"], 1);
    assert_eq!(report["stored"], 1);
    assert_eq!(report["failed"], 0);
}

#[test]
fn test_check_on_empty_store_reports_no_match() {
    let temp = TempDir::new().unwrap();
    let image = temp.path().join("meme.png");
    write_png(&image, 3);
    let file = temp.path().join("message.json");
    fs::write(&file, message_json("1", "2024-01-01", &image)).unwrap();

    repost()
        .args(["check", file.to_str().unwrap(), "--threshold", "10"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No match"))
        .stdout(predicate::str::contains("set DATABASE_URL to persist"));
}

#[test]
fn test_scan_export_reports_summary() {
    let temp = TempDir::new().unwrap();
    let mut lines = Vec::new();
    for i in 0..4u32 {
        let image = temp.path().join(format!("{i}.png"));
        write_png(&image, i);
        lines.push(message_json(&i.to_string(), "2024-01-02", &image));
    }
    // A message whose attachment does not exist is skipped, not fatal
    lines.push(message_json("gone", "2024-01-02", &temp.path().join("gone.png")));
    let export = temp.path().join("export.jsonl");
    fs::write(&export, lines.join("\n")).unwrap();

    let output = repost()
        .args([
            "--format",
            "json",
            "scan",
            export.to_str().unwrap(),
            "--concurrency",
            "2",
        ])
        .output()
        .unwrap();
    assert!(output.status.success());

    let summary: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(summary["totals"]["messages_processed"], 5);
    assert_eq!(summary["totals"]["media_failed"], 1);
    // Seeds 0 and 3 draw the same stripes, so only three distinct hashes
    assert_eq!(summary["totals"]["hashes_stored"], 3);
}

#[test]
fn test_stats_reports_backend() {
    repost()
        .arg("stats")
        .assert()
        .success()
        .stdout(predicate::str::contains("Records:"))
        .stdout(predicate::str::contains("Memory"));
}
