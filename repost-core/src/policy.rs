//! Ingestion policy: which occurrence of an exact fingerprint the store keeps.
//!
//! The policy works on exact fingerprint equality only. Visually similar but
//! distinct fingerprints are all kept in the ledger; similarity is only
//! evaluated at query time by the matcher.

use crate::store::HashRecord;

/// Decide whether `candidate` should be written over `existing`.
///
/// - No existing record: store.
/// - Candidate posted strictly earlier: replace, so the store always cites
///   the earliest known occurrence.
/// - Otherwise: keep the existing record.
pub fn should_store(existing: Option<&HashRecord>, candidate: &HashRecord) -> bool {
    match existing {
        None => true,
        Some(existing) => candidate.posted_at() < existing.posted_at(),
    }
}
