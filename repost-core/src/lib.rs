//! Repost Core - near-duplicate detection for chat media
//!
//! This crate fingerprints images and videos posted in chat messages and finds
//! earlier posts of the same (or visually similar) media.
//!
//! # Features
//!
//! - 256-bit extended average hash over a 16×16 luminance grid
//! - Video support through a single ffmpeg-sampled frame
//! - Hash store loaded fully into memory, mirrored to PostgreSQL
//! - Earliest-post-wins ingestion, Hamming-distance matching
//! - Bounded-concurrency bulk scans of message backlogs
//!
//! # Example
//!
//! ```no_run
//! use repost_core::{Detector, DetectorConfig, Message};
//!
//! # async fn example(message: Message) -> repost_core::Result<()> {
//! let config = DetectorConfig::from_env();
//! let detector = Detector::from_config(config).await?;
//!
//! let report = detector.hash_message(&message).await;
//! for prior in &report.prior_posts {
//!     println!("already posted: {}", prior.record.message.jump_url());
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod detector;
pub mod error;
pub mod extract;
pub mod fetch;
pub mod fingerprint;
pub mod matcher;
pub mod media;
pub mod policy;
pub mod scanner;
pub mod store;

// Re-export main types for convenience
pub use config::{DetectorConfig, DEFAULT_SIMILAR_THRESHOLD, DEFAULT_STRICT_THRESHOLD};
pub use detector::{Detector, HashReport, MediaOutcome};
pub use error::{RepostError, Result};
pub use extract::{FfmpegFrameSampler, FrameSampler, HashExtractor};
pub use fetch::{FetchConfig, FetchedMedia, HttpMediaFetcher, MediaFetcher};
pub use fingerprint::{hash_bytes, hash_image, Fingerprint, FINGERPRINT_BITS};
pub use matcher::{rank_matches, DuplicateMatcher, MatchResult};
pub use media::{Attachment, Embed, MediaKind, MediaRef, MediaSource, Message, MessageRef};
pub use scanner::{
    BulkScanner, JsonlMessageSource, MessageSource, ScanOptions, ScanProgress, ScanSummary,
    VecMessageSource,
};
pub use store::{HashLedger, HashRecord, HashStore, MemoryLedger, StoreError};

#[cfg(feature = "postgres")]
pub use store::PostgresLedger;
