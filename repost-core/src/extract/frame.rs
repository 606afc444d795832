//! Video frame sampling via an external ffmpeg process.
//!
//! One still is taken per video, at a fixed offset into the clip so that
//! black lead-in and title cards are skipped. Clips shorter than the offset
//! produce no frame there; in that case the first frame is used instead.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, instrument};

use crate::config::DetectorConfig;
use crate::error::{RepostError, Result};

/// Produces a single encoded still image from video bytes.
#[async_trait]
pub trait FrameSampler: Send + Sync {
    /// Return one encoded frame (any format the image decoder accepts).
    async fn sample(&self, video: &[u8]) -> Result<Vec<u8>>;
}

/// Frame sampler backed by the `ffmpeg` command-line tool.
#[derive(Debug, Clone)]
pub struct FfmpegFrameSampler {
    ffmpeg_path: PathBuf,
    offset: Duration,
    timeout: Duration,
}

impl FfmpegFrameSampler {
    pub fn new(ffmpeg_path: impl Into<PathBuf>, offset: Duration, timeout: Duration) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
            offset,
            timeout,
        }
    }

    pub fn from_config(config: &DetectorConfig) -> Self {
        Self::new(
            config.ffmpeg_path.clone(),
            config.frame_offset,
            config.frame_timeout,
        )
    }

    /// Run ffmpeg once, returning whatever it wrote to stdout.
    async fn grab_frame(&self, input: &Path, offset: Duration) -> Result<Vec<u8>> {
        let mut command = Command::new(&self.ffmpeg_path);
        command
            .args(["-hide_banner", "-loglevel", "error", "-ss"])
            .arg(format!("{:.3}", offset.as_secs_f64()))
            .arg("-i")
            .arg(input)
            .args([
                "-frames:v",
                "1",
                "-f",
                "image2pipe",
                "-vcodec",
                "png",
                "pipe:1",
            ])
            .stdin(Stdio::null())
            .kill_on_drop(true);

        let output = tokio::time::timeout(self.timeout, command.output())
            .await
            .map_err(|_| RepostError::Timeout {
                what: "ffmpeg frame sample".into(),
                secs: self.timeout.as_secs(),
            })?
            .map_err(|e| RepostError::FrameSample(format!("Failed to run ffmpeg: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(RepostError::FrameSample(format!(
                "ffmpeg failed: {}",
                stderr.trim()
            )));
        }

        Ok(output.stdout)
    }
}

#[async_trait]
impl FrameSampler for FfmpegFrameSampler {
    #[instrument(skip(self, video), fields(bytes = video.len()))]
    async fn sample(&self, video: &[u8]) -> Result<Vec<u8>> {
        // Seeking inside mp4/mov needs a real file, stdin is not enough
        let input = tempfile::NamedTempFile::new()?;
        tokio::fs::write(input.path(), video).await?;

        let frame = self.grab_frame(input.path(), self.offset).await?;
        if !frame.is_empty() {
            return Ok(frame);
        }

        if !self.offset.is_zero() {
            debug!(
                offset_secs = self.offset.as_secs_f64(),
                "No frame at offset, sampling first frame"
            );
            let frame = self.grab_frame(input.path(), Duration::ZERO).await?;
            if !frame.is_empty() {
                return Ok(frame);
            }
        }

        Err(RepostError::FrameSample("ffmpeg produced no frame".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_binary_is_frame_error() {
        let sampler = FfmpegFrameSampler::new(
            "/nonexistent/ffmpeg-for-tests",
            Duration::from_secs(5),
            Duration::from_secs(5),
        );
        let err = sampler.sample(b"not a video").await.unwrap_err();
        assert!(matches!(err, RepostError::FrameSample(_)));
    }

    #[test]
    fn test_from_config() {
        let config = DetectorConfig {
            frame_offset: Duration::from_millis(2500),
            ..DetectorConfig::default()
        };
        let sampler = FfmpegFrameSampler::from_config(&config);
        assert_eq!(sampler.offset, Duration::from_millis(2500));
        assert_eq!(sampler.ffmpeg_path, PathBuf::from("ffmpeg"));
    }
}
