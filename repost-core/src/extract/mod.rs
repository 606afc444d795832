//! Fingerprint extraction for images and videos.

mod frame;

pub use frame::{FfmpegFrameSampler, FrameSampler};

use std::sync::Arc;

use crate::error::{RepostError, Result};
use crate::fingerprint::{self, Fingerprint};
use crate::media::MediaKind;

/// Turns media bytes into a fingerprint.
///
/// Images are decoded directly; videos go through the frame sampler first.
/// Decoding runs on the blocking pool so large images do not stall the
/// async workers.
#[derive(Clone)]
pub struct HashExtractor {
    sampler: Arc<dyn FrameSampler>,
}

impl HashExtractor {
    pub fn new(sampler: Arc<dyn FrameSampler>) -> Self {
        Self { sampler }
    }

    pub async fn extract(&self, bytes: Vec<u8>, kind: MediaKind) -> Result<Fingerprint> {
        let still = match kind {
            MediaKind::Image => bytes,
            MediaKind::Video => self.sampler.sample(&bytes).await?,
            MediaKind::Unknown => {
                return Err(RepostError::UnsupportedMedia(
                    "neither an image nor a video".into(),
                ))
            }
        };

        tokio::task::spawn_blocking(move || fingerprint::hash_bytes(&still))
            .await
            .map_err(|e| RepostError::Decode(format!("Hash task failed: {e}")))?
    }
}

impl std::fmt::Debug for HashExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HashExtractor").finish_non_exhaustive()
    }
}
