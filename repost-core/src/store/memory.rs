//! In-memory hash ledger.
//!
//! Development fallback when no database is configured, and the ledger used
//! by tests. Records are lost when the process exits.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;

use super::{HashLedger, HashRecord, StoreError};

/// Thread-safe in-memory ledger keyed by canonical fingerprint.
#[derive(Default)]
pub struct MemoryLedger {
    records: DashMap<String, HashRecord>,
    fail_loads: AtomicBool,
    fail_writes: AtomicBool,
}

impl MemoryLedger {
    /// Name reported by [`HashLedger::backend_name`].
    pub const BACKEND_NAME: &'static str = "Memory";

    /// Create an empty ledger
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a ledger pre-populated with records
    pub fn with_records(records: impl IntoIterator<Item = HashRecord>) -> Self {
        let ledger = Self::new();
        for record in records {
            ledger.records.insert(record.fingerprint.clone(), record);
        }
        ledger
    }

    /// Make `load_all` fail, simulating an unreachable database
    pub fn fail_loads(&self, fail: bool) {
        self.fail_loads.store(fail, Ordering::SeqCst);
    }

    /// Make `upsert` fail, simulating a rejected write
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of persisted records
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether nothing has been persisted
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl HashLedger for MemoryLedger {
    async fn load_all(&self) -> Result<Vec<HashRecord>, StoreError> {
        if self.fail_loads.load(Ordering::SeqCst) {
            return Err(StoreError::Connection("memory ledger unavailable".into()));
        }
        Ok(self
            .records
            .iter()
            .map(|entry| entry.value().clone())
            .collect())
    }

    async fn get(&self, fingerprint: &str) -> Result<Option<HashRecord>, StoreError> {
        Ok(self
            .records
            .get(fingerprint)
            .map(|entry| entry.value().clone()))
    }

    async fn upsert(&self, record: &HashRecord) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::WriteRejected(format!(
                "memory ledger refused {}",
                record.fingerprint
            )));
        }
        self.records
            .insert(record.fingerprint.clone(), record.clone());
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        Self::BACKEND_NAME
    }
}

impl std::fmt::Debug for MemoryLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryLedger")
            .field("records", &self.records.len())
            .finish()
    }
}
