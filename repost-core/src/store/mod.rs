//! Hash store: the permanent dedup ledger of media fingerprints.
//!
//! The store keeps every [`HashRecord`] in memory behind a reader/writer lock
//! and mirrors each write to a durable [`HashLedger`]:
//! - Reads (`get`, `snapshot`, `len`) take the shared lock.
//! - Writes (`put`, `ingest`) take the exclusive lock, persist first and only
//!   then update the map, so memory never claims a record the ledger refused.
//!
//! A store can only be obtained through [`HashStore::load`], which reads the
//! whole ledger before returning.

pub mod error;
pub mod memory;
#[cfg(feature = "postgres")]
pub mod postgres;

pub use error::StoreError;
pub use memory::MemoryLedger;
#[cfg(feature = "postgres")]
pub use postgres::PostgresLedger;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info, instrument, warn};

use crate::config::DetectorConfig;
use crate::media::MessageRef;
use crate::policy;

/// A fingerprint and the earliest known message that carried it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HashRecord {
    /// Canonical fingerprint string, the primary key
    pub fingerprint: String,
    /// The message the media was posted in
    pub message: MessageRef,
    /// When this record was written
    pub inserted_at: DateTime<Utc>,
}

impl HashRecord {
    /// Record `fingerprint` as seen in `message`, stamped with the current time.
    pub fn new(fingerprint: impl Into<String>, message: MessageRef) -> Self {
        Self {
            fingerprint: fingerprint.into(),
            message,
            inserted_at: Utc::now(),
        }
    }

    /// Timestamp of the originating message.
    pub fn posted_at(&self) -> DateTime<Utc> {
        self.message.timestamp
    }
}

/// Durable key→record table backing the in-memory store.
#[async_trait]
pub trait HashLedger: Send + Sync {
    /// Read every persisted record. Used once at startup.
    async fn load_all(&self) -> Result<Vec<HashRecord>, StoreError>;

    /// Point lookup by canonical fingerprint.
    async fn get(&self, fingerprint: &str) -> Result<Option<HashRecord>, StoreError>;

    /// Insert or replace the record keyed by its fingerprint.
    async fn upsert(&self, record: &HashRecord) -> Result<(), StoreError>;

    /// Human-readable backend name for diagnostics.
    fn backend_name(&self) -> &'static str;
}

/// Open the durable ledger selected by configuration.
///
/// Uses PostgreSQL when a database URL is configured, otherwise falls back to
/// the in-memory ledger (records are lost on exit).
pub async fn open_ledger(config: &DetectorConfig) -> Result<Arc<dyn HashLedger>, StoreError> {
    match config.database_url.as_deref() {
        #[cfg(feature = "postgres")]
        Some(url) => {
            info!("Using PostgreSQL hash ledger");
            let ledger = PostgresLedger::connect(url, config.database_max_connections).await?;
            Ok(Arc::new(ledger))
        }
        #[cfg(not(feature = "postgres"))]
        Some(_) => Err(StoreError::Connection(
            "DATABASE_URL is set but the postgres feature is disabled".into(),
        )),
        None => {
            warn!("DATABASE_URL not set, using in-memory ledger - hashes will be lost on exit!");
            Ok(Arc::new(MemoryLedger::new()))
        }
    }
}

/// Process-wide fingerprint index.
pub struct HashStore {
    records: RwLock<HashMap<String, HashRecord>>,
    ledger: Arc<dyn HashLedger>,
}

impl HashStore {
    /// Load every record from the ledger into memory.
    ///
    /// A failure here means the index would be missing arbitrary records, so
    /// callers must not serve matches from a store that failed to load.
    #[instrument(skip(ledger), fields(backend = ledger.backend_name()))]
    pub async fn load(ledger: Arc<dyn HashLedger>) -> Result<Self, StoreError> {
        let rows = ledger.load_all().await?;

        let mut records = HashMap::with_capacity(rows.len());
        for record in rows {
            // The ledger is keyed by fingerprint, but keep the earliest if a
            // backend ever hands back duplicates
            if policy::should_store(records.get(&record.fingerprint), &record) {
                records.insert(record.fingerprint.clone(), record);
            }
        }

        info!(records = records.len(), "Hash store loaded");

        Ok(Self {
            records: RwLock::new(records),
            ledger,
        })
    }

    /// Shared-read lookup by canonical fingerprint.
    pub async fn get(&self, fingerprint: &str) -> Option<HashRecord> {
        self.records.read().await.get(fingerprint).cloned()
    }

    /// Insert or replace a record unconditionally.
    ///
    /// Persists to the ledger while holding the write lock; the map is only
    /// updated once the ledger accepted the write.
    pub async fn put(&self, record: HashRecord) -> Result<(), StoreError> {
        let mut records = self.records.write().await;
        self.ledger.upsert(&record).await?;
        debug!(fingerprint = %record.fingerprint, message_id = %record.message.id, "Stored hash");
        records.insert(record.fingerprint.clone(), record);
        Ok(())
    }

    /// Whether the ingestion policy would accept `candidate` right now.
    pub async fn should_store(&self, candidate: &HashRecord) -> bool {
        let records = self.records.read().await;
        policy::should_store(records.get(&candidate.fingerprint), candidate)
    }

    /// Apply the ingestion policy and write in a single exclusive section.
    ///
    /// Returns `Ok(true)` when the record was stored, `Ok(false)` when an
    /// equal-or-earlier occurrence is already known.
    pub async fn ingest(&self, candidate: HashRecord) -> Result<bool, StoreError> {
        let mut records = self.records.write().await;

        if !policy::should_store(records.get(&candidate.fingerprint), &candidate) {
            return Ok(false);
        }

        self.ledger.upsert(&candidate).await?;
        debug!(
            fingerprint = %candidate.fingerprint,
            message_id = %candidate.message.id,
            "Ingested hash"
        );
        records.insert(candidate.fingerprint.clone(), candidate);
        Ok(true)
    }

    /// Number of records held.
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    /// Whether the store holds no records.
    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }

    /// Independent copy of every record, taken under the shared lock.
    pub async fn snapshot(&self) -> Vec<HashRecord> {
        self.records.read().await.values().cloned().collect()
    }

    /// Name of the durable backend.
    pub fn backend_name(&self) -> &'static str {
        self.ledger.backend_name()
    }
}

impl std::fmt::Debug for HashStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HashStore")
            .field("backend", &self.ledger.backend_name())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn message(id: &str, secs: i64) -> MessageRef {
        MessageRef {
            id: id.into(),
            channel_id: "chan".into(),
            guild_id: None,
            thread_id: None,
            author_id: format!("author-{id}"),
            author_name: None,
            timestamp: Utc.timestamp_opt(secs, 0).unwrap(),
        }
    }

    #[tokio::test]
    async fn test_load_reads_ledger() {
        let ledger = Arc::new(MemoryLedger::with_records(vec![
            HashRecord::new("a:01", message("1", 10)),
            HashRecord::new("a:02", message("2", 20)),
        ]));
        let store = HashStore::load(ledger).await.unwrap();
        assert_eq!(store.len().await, 2);
        assert_eq!(store.get("a:02").await.unwrap().message.id, "2");
        assert!(store.get("a:03").await.is_none());
    }

    #[tokio::test]
    async fn test_load_failure_is_returned() {
        let ledger = Arc::new(MemoryLedger::new());
        ledger.fail_loads(true);
        assert!(HashStore::load(ledger).await.is_err());
    }

    #[tokio::test]
    async fn test_put_persists_then_caches() {
        let ledger = Arc::new(MemoryLedger::new());
        let store = HashStore::load(ledger.clone()).await.unwrap();

        store
            .put(HashRecord::new("a:ff", message("1", 5)))
            .await
            .unwrap();

        assert_eq!(store.len().await, 1);
        assert!(ledger.get("a:ff").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_rejected_write_leaves_memory_unchanged() {
        let ledger = Arc::new(MemoryLedger::new());
        let store = HashStore::load(ledger.clone()).await.unwrap();
        ledger.fail_writes(true);

        let err = store.put(HashRecord::new("a:ff", message("1", 5))).await;
        assert!(err.is_err());
        assert!(store.get("a:ff").await.is_none());

        let ingested = store.ingest(HashRecord::new("a:ee", message("2", 5))).await;
        assert!(ingested.is_err());
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_ingest_keeps_earliest() {
        let store = HashStore::load(Arc::new(MemoryLedger::new())).await.unwrap();

        assert!(store
            .ingest(HashRecord::new("a:aa", message("late", 10)))
            .await
            .unwrap());
        assert!(!store
            .ingest(HashRecord::new("a:aa", message("later", 11)))
            .await
            .unwrap());
        assert!(store
            .ingest(HashRecord::new("a:aa", message("early", 5)))
            .await
            .unwrap());

        assert_eq!(store.get("a:aa").await.unwrap().message.id, "early");
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_snapshot_is_independent() {
        let store = HashStore::load(Arc::new(MemoryLedger::new())).await.unwrap();
        store
            .put(HashRecord::new("a:01", message("1", 1)))
            .await
            .unwrap();

        let snapshot = store.snapshot().await;
        store
            .put(HashRecord::new("a:02", message("2", 2)))
            .await
            .unwrap();

        assert_eq!(snapshot.len(), 1);
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_ingest_single_winner() {
        let store = Arc::new(HashStore::load(Arc::new(MemoryLedger::new())).await.unwrap());

        let mut handles = Vec::new();
        for i in 0..32 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store
                    .ingest(HashRecord::new("a:same", message(&i.to_string(), 100 - i)))
                    .await
                    .unwrap()
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(store.len().await, 1);
        // Earliest timestamp (100 - 31) always wins regardless of interleaving
        assert_eq!(store.get("a:same").await.unwrap().message.id, "31");
    }
}
