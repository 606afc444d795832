//! Media retrieval.
//!
//! Resolves a [`MediaRef`] into raw bytes plus a [`MediaKind`] so the
//! extractor knows which path to take.

mod http;

pub use http::{is_transient_error, is_transient_status, FetchConfig, HttpMediaFetcher};

use async_trait::async_trait;

use crate::error::Result;
use crate::media::{MediaKind, MediaRef};

/// Downloaded media bytes, classified.
#[derive(Debug, Clone)]
pub struct FetchedMedia {
    pub bytes: Vec<u8>,
    pub kind: MediaKind,
}

/// Source of media bytes.
///
/// Implementations must be thread-safe; the bulk scanner calls `fetch` from
/// many workers at once.
#[async_trait]
pub trait MediaFetcher: Send + Sync {
    /// Download the media behind `media`.
    async fn fetch(&self, media: &MediaRef) -> Result<FetchedMedia>;
}
