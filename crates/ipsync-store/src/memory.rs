//! In-memory implementation of the SnapshotStore trait.
//!
//! This is primarily for testing. It has the same semantics as SQLite
//! but keeps everything in memory with no persistence.

use std::sync::RwLock;

use async_trait::async_trait;

use ipsync_core::{SnapshotMetadata, StoredSnapshot};

use crate::error::{Result, StoreError};
use crate::traits::SnapshotStore;

/// In-memory snapshot store.
///
/// All data is lost when the store is dropped. Thread-safe via RwLock.
#[derive(Default)]
pub struct MemorySnapshotStore {
    latest: RwLock<Option<StoredSnapshot>>,
}

impl MemorySnapshotStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with a snapshot.
    pub fn with_snapshot(snapshot: StoredSnapshot) -> Self {
        Self {
            latest: RwLock::new(Some(snapshot)),
        }
    }
}

fn poisoned<E: std::fmt::Display>(e: E) -> StoreError {
    StoreError::LockPoisoned(e.to_string())
}

#[async_trait]
impl SnapshotStore for MemorySnapshotStore {
    async fn get_latest(&self) -> Result<Option<StoredSnapshot>> {
        let latest = self.latest.read().map_err(poisoned)?;
        Ok(latest.clone())
    }

    async fn put_latest(&self, snapshot: &StoredSnapshot) -> Result<()> {
        let mut latest = self.latest.write().map_err(poisoned)?;
        let mut snapshot = snapshot.clone();
        if snapshot.saved_at.is_none() {
            snapshot.saved_at = Some(ipsync_core::now_iso8601());
        }
        *latest = Some(snapshot);
        Ok(())
    }

    async fn delete_all(&self) -> Result<()> {
        let mut latest = self.latest.write().map_err(poisoned)?;
        *latest = None;
        Ok(())
    }

    async fn get_metadata(&self) -> Result<Option<SnapshotMetadata>> {
        let latest = self.latest.read().map_err(poisoned)?;
        Ok(latest.as_ref().map(|snap| SnapshotMetadata {
            sequence: snap.sequence,
            timestamp: snap.timestamp.clone(),
            count: snap.ips.len(),
            saved_at: snap.saved_at.clone().unwrap_or_default(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::SnapshotStoreExt;
    use ipsync_core::IpRecord;

    #[tokio::test]
    async fn test_memory_store_matches_contract() {
        let store = MemorySnapshotStore::new();
        assert!(store.load().await.is_empty());
        assert_eq!(store.metadata().await, None);

        let ips = vec![IpRecord::new("192.168.1.10"), IpRecord::new("192.168.1.11")];
        store.save(&ips, 2, "2024-03-03T00:00:00Z").await.unwrap();

        let loaded = store.load().await;
        assert_eq!(loaded.ips, ips);
        assert_eq!(loaded.sequence, 2);

        let meta = store.metadata().await.unwrap();
        assert_eq!(meta.count, 2);
        assert!(!meta.saved_at.is_empty());

        store.clear().await.unwrap();
        assert!(store.load().await.is_empty());
    }

    #[tokio::test]
    async fn test_with_snapshot_prepopulates() {
        let store = MemorySnapshotStore::with_snapshot(StoredSnapshot {
            ips: vec![IpRecord::new("10.1.1.1")],
            sequence: 40,
            timestamp: "t".into(),
            saved_at: Some("s".into()),
        });
        assert_eq!(store.load().await.sequence, 40);
    }
}
