//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use image::{DynamicImage, ImageBuffer, Rgb};
use repost_core::{
    Attachment, Detector, DetectorConfig, FetchedMedia, FrameSampler, HashExtractor, HashLedger,
    HashStore, MediaFetcher, MediaKind, MediaRef, Message, MessageRef, RepostError, Result,
};

/// Encode a 16×16 PNG whose pixels come from a small LCG seeded by `seed`.
pub fn noise_png(seed: u32) -> Vec<u8> {
    let mut state = seed.wrapping_mul(2_654_435_761).wrapping_add(1);
    let img = ImageBuffer::from_fn(16, 16, |_, _| {
        state = state.wrapping_mul(1_103_515_245).wrapping_add(12_345);
        let v = (state >> 16) as u8;
        Rgb([v, v.wrapping_mul(3), v.wrapping_add(97)])
    });
    encode_png(&DynamicImage::ImageRgb8(img))
}

pub fn encode_png(img: &DynamicImage) -> Vec<u8> {
    let mut buffer = Cursor::new(Vec::new());
    img.write_to(&mut buffer, image::ImageFormat::Png)
        .expect("PNG encoding failed");
    buffer.into_inner()
}

pub fn at(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
}

pub fn message_ref(id: &str, secs: i64) -> MessageRef {
    MessageRef {
        id: id.into(),
        channel_id: "general".into(),
        guild_id: Some("guild".into()),
        thread_id: None,
        author_id: format!("user-{id}"),
        author_name: None,
        timestamp: at(secs),
    }
}

/// A message carrying one attachment per URL.
pub fn message(id: &str, secs: i64, urls: &[&str]) -> Message {
    Message {
        reference: message_ref(id, secs),
        attachments: urls
            .iter()
            .map(|url| Attachment {
                url: (*url).to_string(),
                content_type: Some("image/png".into()),
            })
            .collect(),
        embeds: Vec::new(),
        content: String::new(),
    }
}

/// Fetcher serving media from an in-memory table.
///
/// Tracks the highest number of concurrent fetches it has seen.
#[derive(Default)]
pub struct TableFetcher {
    media: HashMap<String, Vec<u8>>,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
    delay: Duration,
    slow: HashMap<String, Duration>,
}

impl TableFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn insert(&mut self, url: impl Into<String>, bytes: Vec<u8>) {
        self.media.insert(url.into(), bytes);
    }

    /// Serve `url` only after `delay`, overriding the table-wide delay.
    pub fn insert_slow(&mut self, url: impl Into<String>, bytes: Vec<u8>, delay: Duration) {
        let url = url.into();
        self.slow.insert(url.clone(), delay);
        self.media.insert(url, bytes);
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MediaFetcher for TableFetcher {
    async fn fetch(&self, media: &MediaRef) -> Result<FetchedMedia> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);

        let delay = self.slow.get(&media.url).copied().unwrap_or(self.delay);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        let result = self
            .media
            .get(&media.url)
            .cloned()
            .map(|bytes| FetchedMedia {
                bytes,
                kind: MediaKind::Image,
            })
            .ok_or_else(|| RepostError::FetchError(format!("404: {}", media.url)));

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

/// Sampler for pipelines that never see video.
pub struct NoVideo;

#[async_trait]
impl FrameSampler for NoVideo {
    async fn sample(&self, _video: &[u8]) -> Result<Vec<u8>> {
        Err(RepostError::FrameSample("video not expected in tests".into()))
    }
}

pub async fn detector(
    fetcher: Arc<dyn MediaFetcher>,
    ledger: Arc<dyn HashLedger>,
) -> Detector {
    detector_with_config(fetcher, ledger, DetectorConfig::default()).await
}

pub async fn detector_with_config(
    fetcher: Arc<dyn MediaFetcher>,
    ledger: Arc<dyn HashLedger>,
    config: DetectorConfig,
) -> Detector {
    let store = Arc::new(HashStore::load(ledger).await.unwrap());
    Detector::new(fetcher, HashExtractor::new(Arc::new(NoVideo)), store, config)
}
