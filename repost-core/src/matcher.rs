//! Near-duplicate matching over the hash store.
//!
//! Matching is a linear scan: every stored record is compared against every
//! fingerprint of the target message. That is O(records × fingerprints) per
//! query, which is fine at chat-archive scale. A prefix-bucketed or ANN index
//! would be the next step if the corpus grows by orders of magnitude.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::fingerprint::Fingerprint;
use crate::media::MessageRef;
use crate::store::{HashRecord, HashStore};

/// A stored record within the query threshold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchResult {
    /// Hamming distance from the closest target fingerprint (0 = identical)
    pub distance: u32,
    /// The matching stored record
    pub record: HashRecord,
}

/// Rank stored records against the fingerprints of `target`.
///
/// - Keeps records within `threshold` bits of any target fingerprint.
/// - Reports each record once, at its smallest distance, and each stored
///   message once per distance even when several of its media match.
/// - Drops records from `target` itself and records posted after it.
/// - Orders by posting time (earliest first), then distance, then fingerprint.
///
/// Records whose stored fingerprint cannot be parsed are skipped.
pub fn rank_matches(
    records: &[HashRecord],
    target: &MessageRef,
    fingerprints: &[Fingerprint],
    threshold: u32,
) -> Vec<MatchResult> {
    if fingerprints.is_empty() {
        return Vec::new();
    }

    // (distance, channel, message) -> record
    let mut best: HashMap<(u32, &str, &str), &HashRecord> = HashMap::new();

    for record in records {
        if record.message.same_message(target) || record.posted_at() > target.timestamp {
            continue;
        }

        let stored: Fingerprint = match record.fingerprint.parse() {
            Ok(fp) => fp,
            Err(e) => {
                warn!(fingerprint = %record.fingerprint, error = %e, "Skipping malformed stored fingerprint");
                continue;
            }
        };

        let Some(distance) = fingerprints.iter().map(|fp| fp.distance(&stored)).min() else {
            continue;
        };

        if distance > threshold {
            continue;
        }

        let key = (
            distance,
            record.message.channel_id.as_str(),
            record.message.id.as_str(),
        );
        best.entry(key)
            .and_modify(|kept| {
                if record.fingerprint < kept.fingerprint {
                    *kept = record;
                }
            })
            .or_insert(record);
    }

    let mut matches: Vec<MatchResult> = best
        .into_iter()
        .map(|((distance, _, _), record)| MatchResult {
            distance,
            record: record.clone(),
        })
        .collect();

    matches.sort_by(|a, b| {
        a.record
            .posted_at()
            .cmp(&b.record.posted_at())
            .then(a.distance.cmp(&b.distance))
            .then_with(|| a.record.fingerprint.cmp(&b.record.fingerprint))
    });

    matches
}

/// Query-side view of the hash store.
#[derive(Debug, Clone)]
pub struct DuplicateMatcher {
    store: Arc<HashStore>,
}

impl DuplicateMatcher {
    pub fn new(store: Arc<HashStore>) -> Self {
        Self { store }
    }

    /// Find prior occurrences of `fingerprints` posted no later than `target`.
    ///
    /// An empty result means "no match".
    pub async fn find_matches(
        &self,
        target: &MessageRef,
        fingerprints: &[Fingerprint],
        threshold: u32,
    ) -> Vec<MatchResult> {
        let snapshot = self.store.snapshot().await;
        let matches = rank_matches(&snapshot, target, fingerprints, threshold);
        debug!(
            scanned = snapshot.len(),
            matched = matches.len(),
            threshold,
            "Duplicate scan finished"
        );
        matches
    }
}
