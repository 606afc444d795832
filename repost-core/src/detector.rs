//! Per-message pipeline: fetch → sample → extract → ingest / match.
//!
//! The [`Detector`] is the explicit dependency handed to every caller (CLI
//! commands, the bulk scanner, chat hooks). It owns no global state; the
//! hash store is shared through an `Arc`.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::config::DetectorConfig;
use crate::error::{RepostError, Result};
use crate::extract::{FfmpegFrameSampler, HashExtractor};
use crate::fetch::{FetchConfig, HttpMediaFetcher, MediaFetcher};
use crate::fingerprint::Fingerprint;
use crate::matcher::{DuplicateMatcher, MatchResult};
use crate::media::{MediaRef, Message};
use crate::store::{self, HashRecord, HashStore};

/// Fingerprints computed for one message.
#[derive(Debug, Clone, Default)]
pub struct MediaOutcome {
    /// One fingerprint per successfully processed media item
    pub fingerprints: Vec<Fingerprint>,
    /// Media items that could not be fetched or decoded
    pub failed: usize,
}

/// Result of hashing one message's media.
#[derive(Debug, Clone, Default, Serialize)]
pub struct HashReport {
    /// Media items successfully fingerprinted
    pub hashed: usize,
    /// Fingerprints newly written to the store
    pub stored: usize,
    /// Media items skipped because of fetch/decode/store errors
    pub failed: usize,
    /// Earlier posts within the strict threshold, oldest first.
    /// Only filled by [`Detector::hash_message`].
    pub prior_posts: Vec<MatchResult>,
}

/// Near-duplicate detector over a shared hash store.
pub struct Detector {
    fetcher: Arc<dyn MediaFetcher>,
    extractor: HashExtractor,
    store: Arc<HashStore>,
    matcher: DuplicateMatcher,
    config: DetectorConfig,
}

impl Detector {
    pub fn new(
        fetcher: Arc<dyn MediaFetcher>,
        extractor: HashExtractor,
        store: Arc<HashStore>,
        config: DetectorConfig,
    ) -> Self {
        let matcher = DuplicateMatcher::new(store.clone());
        Self {
            fetcher,
            extractor,
            store,
            matcher,
            config,
        }
    }

    /// Build the production pipeline: HTTP fetcher, ffmpeg sampler and the
    /// ledger selected by `config`, fully loaded.
    pub async fn from_config(config: DetectorConfig) -> Result<Self> {
        let ledger = store::open_ledger(&config).await?;
        let store = Arc::new(HashStore::load(ledger).await?);

        let fetcher = HttpMediaFetcher::new(FetchConfig::from(&config))?;
        let sampler = FfmpegFrameSampler::from_config(&config);

        Ok(Self::new(
            Arc::new(fetcher),
            HashExtractor::new(Arc::new(sampler)),
            store,
            config,
        ))
    }

    pub fn store(&self) -> &Arc<HashStore> {
        &self.store
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// Fetch and fingerprint a single media item, bounded by the item timeout.
    pub async fn fingerprint_media(&self, media: &MediaRef) -> Result<Fingerprint> {
        let work = async {
            let fetched = self.fetcher.fetch(media).await?;
            debug!(url = %media.url, kind = ?fetched.kind, bytes = fetched.bytes.len(), "Fetched media");
            self.extractor.extract(fetched.bytes, fetched.kind).await
        };

        tokio::time::timeout(self.config.item_timeout, work)
            .await
            .map_err(|_| RepostError::Timeout {
                what: media.url.clone(),
                secs: self.config.item_timeout.as_secs(),
            })?
    }

    /// Fingerprint every media item of `message`. Failures are logged and
    /// counted, never propagated.
    pub async fn fingerprints(&self, message: &Message) -> MediaOutcome {
        let mut outcome = MediaOutcome::default();

        for media in message.media() {
            match self.fingerprint_media(&media).await {
                Ok(fp) => outcome.fingerprints.push(fp),
                Err(e) => {
                    warn!(
                        message_id = %message.reference.id,
                        url = %media.url,
                        error = %e,
                        "Skipping media item"
                    );
                    outcome.failed += 1;
                }
            }
        }

        outcome
    }

    /// Hash a message's media, report earlier posts within the strict
    /// threshold, then ingest every fingerprint.
    #[instrument(skip(self, message), fields(message_id = %message.reference.id))]
    pub async fn hash_message(&self, message: &Message) -> HashReport {
        let outcome = self.fingerprints(message).await;
        let prior_posts = self
            .matcher
            .find_matches(
                &message.reference,
                &outcome.fingerprints,
                self.config.strict_threshold,
            )
            .await;

        let mut report = self.ingest(message, &outcome).await;
        report.prior_posts = prior_posts;
        report
    }

    /// Hash and ingest without the duplicate check. Used by bulk scans, where
    /// matching every backlog message against the corpus is not wanted.
    #[instrument(skip(self, message), fields(message_id = %message.reference.id))]
    pub async fn ingest_message(&self, message: &Message) -> HashReport {
        let outcome = self.fingerprints(message).await;
        self.ingest(message, &outcome).await
    }

    /// Find earlier posts visually close to `message`'s media. Nothing is
    /// persisted.
    #[instrument(skip(self, message), fields(message_id = %message.reference.id))]
    pub async fn find_matches(&self, message: &Message, threshold: u32) -> Vec<MatchResult> {
        let outcome = self.fingerprints(message).await;
        if outcome.fingerprints.is_empty() {
            info!(failed = outcome.failed, "No fingerprintable media in message");
            return Vec::new();
        }
        self.matcher
            .find_matches(&message.reference, &outcome.fingerprints, threshold)
            .await
    }

    async fn ingest(&self, message: &Message, outcome: &MediaOutcome) -> HashReport {
        let mut report = HashReport {
            hashed: outcome.fingerprints.len(),
            failed: outcome.failed,
            ..HashReport::default()
        };

        for fp in &outcome.fingerprints {
            let record = HashRecord::new(fp.to_canonical(), message.reference.clone());
            match self.store.ingest(record).await {
                Ok(true) => report.stored += 1,
                Ok(false) => {}
                Err(e) => {
                    warn!(fingerprint = %fp, error = %e, "Failed to persist hash");
                    report.failed += 1;
                }
            }
        }

        debug!(
            hashed = report.hashed,
            stored = report.stored,
            failed = report.failed,
            "Message hashed"
        );
        report
    }
}

impl std::fmt::Debug for Detector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Detector")
            .field("store", &self.store)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
