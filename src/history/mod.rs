//! Bounded version history with checksum-guarded rollback verification.
//!
//! Every committed document is snapshotted together with a SHA-256
//! checksum over its canonical serialization.  The ring holds at most
//! `max_versions` entries and evicts the earliest-inserted entry first —
//! eviction is FIFO by insertion order, never by the numeric value of
//! the version number.
//!
//! `rollback_to_version` only verifies integrity and reports the
//! outcome; actually swapping the live document is the caller's separate,
//! explicit step, which keeps verify and commit independently testable.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::Serialize;
use subtle::ConstantTimeEq;
use tracing::error;

use crate::document::Document;
use crate::errors::{Result, TradeVaultError};

/// Default number of retained versions.
pub const DEFAULT_MAX_VERSIONS: usize = 50;

/// One retained snapshot.  Immutable once created.
#[derive(Debug, Clone, Serialize)]
pub struct ConfigVersion {
    pub version_number: u64,

    pub snapshot: Document,

    /// SHA-256 over the snapshot's canonical serialization
    /// (base64 in JSON).
    #[serde(serialize_with = "base64_encode")]
    pub checksum: Vec<u8>,

    pub created_at: DateTime<Utc>,
}

impl ConfigVersion {
    /// Recompute the snapshot's checksum and compare it constant-time
    /// against the one recorded at save time.
    ///
    /// A mismatch means the retained snapshot no longer matches what was
    /// committed and must never be restored.
    pub fn verify(&self) -> Result<()> {
        let recomputed = self.snapshot.checksum()?;
        let matches: bool = recomputed.ct_eq(&self.checksum).into();
        if matches {
            Ok(())
        } else {
            Err(TradeVaultError::IntegrityMismatch(self.version_number))
        }
    }
}

/// FIFO ring of checksummed snapshots.
pub struct VersionHistory {
    entries: VecDeque<ConfigVersion>,
    max_versions: usize,
}

impl VersionHistory {
    /// Create a history retaining at most `max_versions` entries.
    /// A capacity of zero is coerced to one — a history that can hold
    /// nothing cannot support rollback at all.
    pub fn new(max_versions: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            max_versions: max_versions.max(1),
        }
    }

    /// Snapshot `document` under `version_number`.
    ///
    /// Stores a deep copy plus its checksum; evicts the earliest-inserted
    /// entry once capacity is exceeded.
    pub fn save_version(&mut self, document: &Document, version_number: u64) -> Result<()> {
        let checksum = document.checksum()?;
        self.entries.push_back(ConfigVersion {
            version_number,
            snapshot: document.clone(),
            checksum,
            created_at: Utc::now(),
        });

        while self.entries.len() > self.max_versions {
            self.entries.pop_front();
        }
        Ok(())
    }

    /// Deep copy of the snapshot stored under `version_number`, if retained.
    pub fn get_version(&self, version_number: u64) -> Option<Document> {
        self.find(version_number).map(|v| v.snapshot.clone())
    }

    /// Verify the integrity of a stored snapshot.
    ///
    /// Returns false on absence or checksum mismatch — nothing is
    /// mutated in either case.
    pub fn rollback_to_version(&self, version_number: u64) -> bool {
        let Some(entry) = self.find(version_number) else {
            return false;
        };

        match entry.verify() {
            Ok(()) => true,
            Err(e) => {
                error!(version = version_number, "refusing rollback: {e}");
                false
            }
        }
    }

    /// Most recently inserted entry.
    pub fn latest(&self) -> Option<&ConfigVersion> {
        self.entries.back()
    }

    /// `(version_number, created_at)` for every retained entry, in
    /// insertion order.
    pub fn versions(&self) -> Vec<(u64, DateTime<Utc>)> {
        self.entries
            .iter()
            .map(|v| (v.version_number, v.created_at))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn find(&self, version_number: u64) -> Option<&ConfigVersion> {
        self.entries
            .iter()
            .find(|v| v.version_number == version_number)
    }
}

// ---------------------------------------------------------------------------
// Serde helper for the base64-encoded checksum field
// ---------------------------------------------------------------------------

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;

fn base64_encode<S>(data: &[u8], serializer: S) -> std::result::Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_str(&BASE64.encode(data))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(counter: u64) -> Document {
        Document::from_json(json!({ "counter": counter })).unwrap()
    }

    #[test]
    fn save_and_get_roundtrip() {
        let mut history = VersionHistory::new(10);
        history.save_version(&doc(1), 1).unwrap();
        history.save_version(&doc(2), 2).unwrap();

        assert_eq!(history.get_version(1), Some(doc(1)));
        assert_eq!(history.get_version(2), Some(doc(2)));
        assert_eq!(history.get_version(3), None);
    }

    #[test]
    fn capacity_overflow_evicts_oldest_inserted() {
        let mut history = VersionHistory::new(3);
        for n in 1..=5 {
            history.save_version(&doc(n), n).unwrap();
        }

        assert_eq!(history.len(), 3);
        assert_eq!(history.get_version(1), None);
        assert_eq!(history.get_version(2), None);
        for n in 3..=5 {
            assert!(history.get_version(n).is_some());
        }
    }

    #[test]
    fn eviction_is_fifo_even_with_out_of_order_version_numbers() {
        let mut history = VersionHistory::new(2);
        // Insert a high version number first: eviction must still drop it
        // first, because it was inserted first.
        history.save_version(&doc(99), 99).unwrap();
        history.save_version(&doc(1), 1).unwrap();
        history.save_version(&doc(2), 2).unwrap();

        assert_eq!(history.get_version(99), None);
        assert!(history.get_version(1).is_some());
        assert!(history.get_version(2).is_some());
    }

    #[test]
    fn rollback_verification_succeeds_on_intact_snapshot() {
        let mut history = VersionHistory::new(5);
        history.save_version(&doc(7), 1).unwrap();
        assert!(history.rollback_to_version(1));
    }

    #[test]
    fn rollback_verification_fails_on_missing_version() {
        let history = VersionHistory::new(5);
        assert!(!history.rollback_to_version(42));
    }

    #[test]
    fn rollback_verification_fails_on_corrupted_snapshot() {
        let mut history = VersionHistory::new(5);
        history.save_version(&doc(7), 1).unwrap();

        // Corrupt the stored snapshot in place, leaving the checksum as
        // recorded at save time.
        if let Some(entry) = history.entries.front_mut() {
            entry.snapshot.set_path("counter", json!(8));
        }

        assert!(!history.rollback_to_version(1));
        // The corrupted snapshot is still there — verification mutates nothing.
        assert_eq!(history.len(), 1);
    }

    #[test]
    fn zero_capacity_is_coerced_to_one() {
        let mut history = VersionHistory::new(0);
        history.save_version(&doc(1), 1).unwrap();
        assert_eq!(history.len(), 1);
    }

    #[test]
    fn latest_and_versions_follow_insertion_order() {
        let mut history = VersionHistory::new(5);
        history.save_version(&doc(1), 1).unwrap();
        history.save_version(&doc(2), 2).unwrap();

        assert_eq!(history.latest().map(|v| v.version_number), Some(2));
        let listed: Vec<u64> = history.versions().iter().map(|(n, _)| *n).collect();
        assert_eq!(listed, vec![1, 2]);
    }
}
