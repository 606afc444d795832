//! Detector configuration
//!
//! Loaded from environment variables with sensible defaults.

use std::path::PathBuf;
use std::time::Duration;

/// Default threshold for interactive "find similar" queries (~10% of 256 bits)
pub const DEFAULT_SIMILAR_THRESHOLD: u32 = 24;

/// Default threshold for the check run while hashing a message
pub const DEFAULT_STRICT_THRESHOLD: u32 = 6;

/// Detector configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct DetectorConfig {
    /// Per-request media download timeout (default: 20s)
    pub fetch_timeout: Duration,
    /// Retry attempts for transient download errors (default: 3)
    pub max_retries: u32,
    /// Largest media body accepted, in bytes (default: 50 MB)
    pub max_media_bytes: usize,
    /// Upper bound for fetch + decode of a single media item (default: 60s)
    pub item_timeout: Duration,
    /// ffmpeg binary used for frame sampling (default: `ffmpeg`)
    pub ffmpeg_path: PathBuf,
    /// Offset into a video at which the frame is sampled (default: 5s)
    pub frame_offset: Duration,
    /// Time limit for one ffmpeg invocation (default: 30s)
    pub frame_timeout: Duration,
    /// Messages processed in parallel by bulk scans (default: 10)
    pub scan_concurrency: usize,
    /// Threshold for "find similar" queries (default: 24)
    pub similar_threshold: u32,
    /// Threshold for the duplicate check done while hashing (default: 6)
    pub strict_threshold: u32,
    /// Database URL, None selects the in-memory ledger
    pub database_url: Option<String>,
    /// Database connection pool size (default: 10)
    pub database_max_connections: u32,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            fetch_timeout: Duration::from_secs(20),
            max_retries: 3,
            max_media_bytes: 50 * 1024 * 1024,
            item_timeout: Duration::from_secs(60),
            ffmpeg_path: PathBuf::from("ffmpeg"),
            frame_offset: Duration::from_secs(5),
            frame_timeout: Duration::from_secs(30),
            scan_concurrency: 10,
            similar_threshold: DEFAULT_SIMILAR_THRESHOLD,
            strict_threshold: DEFAULT_STRICT_THRESHOLD,
            database_url: None,
            database_max_connections: 10,
        }
    }
}

impl DetectorConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let fetch_timeout = env_parse("REPOST_FETCH_TIMEOUT_SECS")
            .map(Duration::from_secs)
            .unwrap_or(defaults.fetch_timeout);

        let max_retries = env_parse("REPOST_MAX_RETRIES").unwrap_or(defaults.max_retries);

        let max_media_bytes = env_parse::<usize>("REPOST_MAX_MEDIA_MB")
            .map(|mb| mb * 1024 * 1024)
            .unwrap_or(defaults.max_media_bytes);

        let item_timeout = env_parse("REPOST_ITEM_TIMEOUT_SECS")
            .map(Duration::from_secs)
            .unwrap_or(defaults.item_timeout);

        let ffmpeg_path = std::env::var("REPOST_FFMPEG_PATH")
            .ok()
            .filter(|p| !p.is_empty())
            .map(PathBuf::from)
            .unwrap_or(defaults.ffmpeg_path);

        let frame_offset = env_parse::<f64>("REPOST_FRAME_OFFSET_SECS")
            .filter(|secs| secs.is_finite() && *secs >= 0.0)
            .map(Duration::from_secs_f64)
            .unwrap_or(defaults.frame_offset);

        let frame_timeout = env_parse("REPOST_FRAME_TIMEOUT_SECS")
            .map(Duration::from_secs)
            .unwrap_or(defaults.frame_timeout);

        let scan_concurrency = env_parse::<usize>("REPOST_SCAN_CONCURRENCY")
            .filter(|n| *n > 0)
            .unwrap_or(defaults.scan_concurrency);

        let similar_threshold =
            env_parse("REPOST_SIMILAR_THRESHOLD").unwrap_or(defaults.similar_threshold);

        let strict_threshold =
            env_parse("REPOST_STRICT_THRESHOLD").unwrap_or(defaults.strict_threshold);

        let database_url = std::env::var("DATABASE_URL")
            .ok()
            .filter(|url| !url.is_empty());

        let database_max_connections =
            env_parse("DATABASE_MAX_CONNECTIONS").unwrap_or(defaults.database_max_connections);

        Self {
            fetch_timeout,
            max_retries,
            max_media_bytes,
            item_timeout,
            ffmpeg_path,
            frame_offset,
            frame_timeout,
            scan_concurrency,
            similar_threshold,
            strict_threshold,
            database_url,
            database_max_connections,
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}
