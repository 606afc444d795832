//! Bulk backlog scanner.
//!
//! Pulls message batches from a [`MessageSource`] and runs every message
//! through [`Detector::ingest_message`]. The number of messages in flight is
//! capped by a semaphore; media items within one message are processed in
//! order. Per-item failures are counted and never abort the scan.

mod jsonl;

pub use jsonl::JsonlMessageSource;

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error, info, instrument};

use crate::detector::{Detector, HashReport};
use crate::error::{RepostError, Result};
use crate::media::Message;

/// Source of historical messages, read in batches until exhausted.
#[async_trait]
pub trait MessageSource: Send {
    /// Next batch of messages, `None` once the source is exhausted.
    async fn next_batch(&mut self) -> Result<Option<Vec<Message>>>;
}

/// Scan parameters.
#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// Maximum messages processed at once
    pub concurrency: usize,
    /// Also hash messages posted inside threads
    pub include_threads: bool,
    /// Skip messages posted before this instant
    pub since: Option<DateTime<Utc>>,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            concurrency: 10,
            include_threads: false,
            since: None,
        }
    }
}

impl ScanOptions {
    fn accepts(&self, message: &Message) -> bool {
        if !self.include_threads && message.reference.in_thread() {
            return false;
        }
        match self.since {
            Some(since) => message.reference.timestamp >= since,
            None => true,
        }
    }
}

/// Running totals, sent after every batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ScanProgress {
    /// Batches pulled from the source
    pub batches: usize,
    /// Messages that went through the pipeline
    pub messages_processed: usize,
    /// Messages filtered out by thread/date options
    pub messages_skipped: usize,
    /// Media items fingerprinted
    pub media_hashed: usize,
    /// Fingerprints newly written to the store
    pub hashes_stored: usize,
    /// Media items (or whole messages, if a worker died) that failed
    pub media_failed: usize,
}

impl ScanProgress {
    fn record(&mut self, report: &HashReport) {
        self.messages_processed += 1;
        self.media_hashed += report.hashed;
        self.hashes_stored += report.stored;
        self.media_failed += report.failed;
    }
}

/// Final result of a completed scan.
#[derive(Debug, Clone, Serialize)]
pub struct ScanSummary {
    pub totals: ScanProgress,
    pub elapsed: Duration,
}

/// Drives the hashing pipeline over a message backlog.
#[derive(Debug, Clone)]
pub struct BulkScanner {
    detector: Arc<Detector>,
    options: ScanOptions,
}

impl BulkScanner {
    pub fn new(detector: Arc<Detector>, options: ScanOptions) -> Self {
        Self { detector, options }
    }

    pub fn options(&self) -> &ScanOptions {
        &self.options
    }

    /// Scan `source` until it is exhausted.
    ///
    /// A progress snapshot is sent on `progress` after each batch. A closed
    /// receiver is ignored; the scan keeps going.
    #[instrument(skip_all, fields(concurrency = self.options.concurrency))]
    pub async fn scan<S>(
        &self,
        source: &mut S,
        progress: Option<mpsc::Sender<ScanProgress>>,
    ) -> Result<ScanSummary>
    where
        S: MessageSource + ?Sized,
    {
        let started = Instant::now();
        let semaphore = Arc::new(Semaphore::new(self.options.concurrency.max(1)));
        let mut workers: JoinSet<HashReport> = JoinSet::new();
        let mut totals = ScanProgress::default();

        while let Some(batch) = source.next_batch().await? {
            totals.batches += 1;
            debug!(batch = totals.batches, size = batch.len(), "Scanning batch");

            for message in batch {
                if !self.options.accepts(&message) {
                    totals.messages_skipped += 1;
                    continue;
                }

                let permit = semaphore
                    .clone()
                    .acquire_owned()
                    .await
                    .map_err(|e| RepostError::Source(format!("Worker pool closed: {e}")))?;
                let detector = self.detector.clone();
                workers.spawn(async move {
                    let _permit = permit;
                    detector.ingest_message(&message).await
                });

                while let Some(joined) = workers.try_join_next() {
                    collect(&mut totals, joined);
                }
            }

            // Let the batch drain so reported totals cover every message pulled so far
            while let Some(joined) = workers.join_next().await {
                collect(&mut totals, joined);
            }

            if let Some(tx) = &progress {
                let _ = tx.send(totals).await;
            }
        }

        let summary = ScanSummary {
            totals,
            elapsed: started.elapsed(),
        };
        info!(
            messages = totals.messages_processed,
            skipped = totals.messages_skipped,
            stored = totals.hashes_stored,
            failed = totals.media_failed,
            elapsed_ms = summary.elapsed.as_millis() as u64,
            "Scan finished"
        );
        Ok(summary)
    }

    /// Run [`scan`](Self::scan) on a background task.
    pub fn spawn<S>(
        self,
        mut source: S,
    ) -> (
        mpsc::Receiver<ScanProgress>,
        JoinHandle<Result<ScanSummary>>,
    )
    where
        S: MessageSource + 'static,
    {
        let (tx, rx) = mpsc::channel(16);
        let handle = tokio::spawn(async move { self.scan(&mut source, Some(tx)).await });
        (rx, handle)
    }
}

fn collect(totals: &mut ScanProgress, joined: std::result::Result<HashReport, tokio::task::JoinError>) {
    match joined {
        Ok(report) => totals.record(&report),
        Err(e) => {
            error!(error = %e, "Scan worker failed");
            totals.messages_processed += 1;
            totals.media_failed += 1;
        }
    }
}

/// In-memory source handing out fixed batches. Handy for tests and for
/// callers that already hold the backlog.
#[derive(Debug, Default)]
pub struct VecMessageSource {
    batches: std::collections::VecDeque<Vec<Message>>,
}

impl VecMessageSource {
    pub fn new(messages: Vec<Message>, batch_size: usize) -> Self {
        let batch_size = batch_size.max(1);
        let mut batches = std::collections::VecDeque::new();
        let mut iter = messages.into_iter().peekable();
        while iter.peek().is_some() {
            batches.push_back(iter.by_ref().take(batch_size).collect());
        }
        Self { batches }
    }
}

#[async_trait]
impl MessageSource for VecMessageSource {
    async fn next_batch(&mut self) -> Result<Option<Vec<Message>>> {
        Ok(self.batches.pop_front())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::MessageRef;
    use chrono::TimeZone;

    fn message(id: usize, secs: i64, thread: bool) -> Message {
        Message {
            reference: MessageRef {
                id: id.to_string(),
                channel_id: "chan".into(),
                guild_id: None,
                thread_id: thread.then(|| "thread".to_string()),
                author_id: "author".into(),
                author_name: None,
                timestamp: Utc.timestamp_opt(secs, 0).unwrap(),
            },
            attachments: Vec::new(),
            embeds: Vec::new(),
            content: String::new(),
        }
    }

    #[test]
    fn test_options_filter_threads_and_dates() {
        let options = ScanOptions {
            since: Some(Utc.timestamp_opt(100, 0).unwrap()),
            ..ScanOptions::default()
        };
        assert!(options.accepts(&message(1, 100, false)));
        assert!(!options.accepts(&message(2, 99, false)));
        assert!(!options.accepts(&message(3, 200, true)));

        let with_threads = ScanOptions {
            include_threads: true,
            ..ScanOptions::default()
        };
        assert!(with_threads.accepts(&message(4, 0, true)));
    }

    #[tokio::test]
    async fn test_vec_source_batches() {
        let messages = (0..7).map(|i| message(i, 0, false)).collect();
        let mut source = VecMessageSource::new(messages, 3);

        let mut sizes = Vec::new();
        while let Some(batch) = source.next_batch().await.unwrap() {
            sizes.push(batch.len());
        }
        assert_eq!(sizes, vec![3, 3, 1]);
    }

    #[test]
    fn test_worker_failure_is_counted() {
        let mut totals = ScanProgress::default();
        collect(
            &mut totals,
            Ok(HashReport {
                hashed: 2,
                stored: 1,
                failed: 1,
                prior_posts: Vec::new(),
            }),
        );
        assert_eq!(totals.messages_processed, 1);
        assert_eq!(totals.hashes_stored, 1);
        assert_eq!(totals.media_failed, 1);
    }
}
