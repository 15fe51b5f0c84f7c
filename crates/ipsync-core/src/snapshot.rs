//! Snapshots: complete, sequence-tagged replacements of the IP table.

use serde::{Deserialize, Serialize};

use crate::record::IpRecord;
use crate::time::now_iso8601;

/// A snapshot as delivered by the stream or the HTTP fallback.
///
/// `sequence` is mandatory on the wire. A missing timestamp is stamped with
/// the local time on decode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub ips: Vec<IpRecord>,
    pub sequence: u64,
    #[serde(default = "now_iso8601")]
    pub timestamp: String,
}

impl Snapshot {
    pub fn new(ips: Vec<IpRecord>, sequence: u64, timestamp: impl Into<String>) -> Self {
        Self {
            ips,
            sequence,
            timestamp: timestamp.into(),
        }
    }

    /// Whether this snapshot may replace state currently at `current_sequence`.
    ///
    /// Equal sequences are accepted so that the stream and the HTTP fallback
    /// can both deliver the same generation.
    pub fn supersedes(&self, current_sequence: u64) -> bool {
        self.sequence >= current_sequence
    }
}

/// The single snapshot generation held by the durable store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredSnapshot {
    pub ips: Vec<IpRecord>,
    pub sequence: u64,
    pub timestamp: String,
    /// When the record was written locally. `None` for the empty default.
    pub saved_at: Option<String>,
}

impl StoredSnapshot {
    /// The safe default returned when nothing (or nothing readable) is stored.
    pub fn empty() -> Self {
        Self {
            ips: Vec::new(),
            sequence: 0,
            timestamp: now_iso8601(),
            saved_at: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.saved_at.is_none() && self.ips.is_empty() && self.sequence == 0
    }
}

impl From<StoredSnapshot> for Snapshot {
    fn from(stored: StoredSnapshot) -> Self {
        Self {
            ips: stored.ips,
            sequence: stored.sequence,
            timestamp: stored.timestamp,
        }
    }
}

/// Bookkeeping about the stored snapshot, readable without decoding the IPs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotMetadata {
    pub sequence: u64,
    pub timestamp: String,
    pub count: usize,
    pub saved_at: String,
}
