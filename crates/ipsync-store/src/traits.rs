//! Store traits: the abstract interface for snapshot persistence.
//!
//! [`SnapshotStore`] holds the fallible primitives each backend implements.
//! [`SnapshotStoreExt`] layers the caller-facing contract on top: which
//! operations swallow errors and which propagate them.

use async_trait::async_trait;
use ipsync_core::{now_iso8601, IpRecord, SnapshotMetadata, StoredSnapshot};

use crate::error::Result;

/// The fixed logical key under which the single snapshot generation lives.
pub const LATEST_KEY: &str = "latest";

/// Async interface for single-generation snapshot persistence.
///
/// All methods are async to support both blocking (SQLite) and async
/// backends. For SQLite, we use `spawn_blocking` internally to avoid
/// blocking the runtime.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Read the stored snapshot, if any.
    async fn get_latest(&self) -> Result<Option<StoredSnapshot>>;

    /// Overwrite the stored snapshot unconditionally.
    async fn put_latest(&self, snapshot: &StoredSnapshot) -> Result<()>;

    /// Remove all stored data.
    async fn delete_all(&self) -> Result<()>;

    /// Read sequence, timestamp, count and save time without the IP table.
    async fn get_metadata(&self) -> Result<Option<SnapshotMetadata>>;
}

/// The load/save/clear/metadata contract used by the orchestrator and UIs.
pub trait SnapshotStoreExt: SnapshotStore {
    /// Load the stored snapshot.
    ///
    /// Never fails: on any storage error, or when nothing is stored, returns
    /// [`StoredSnapshot::empty`].
    fn load(&self) -> impl std::future::Future<Output = StoredSnapshot> + Send;

    /// Persist `ips` as the latest snapshot, stamping the save time.
    ///
    /// Errors are logged and propagated. Callers must not block state
    /// adoption on the outcome.
    fn save(
        &self,
        ips: &[IpRecord],
        sequence: u64,
        timestamp: &str,
    ) -> impl std::future::Future<Output = Result<()>> + Send;

    /// Remove all stored data. Errors are logged and propagated.
    fn clear(&self) -> impl std::future::Future<Output = Result<()>> + Send;

    /// Lightweight bookkeeping read. Errors are logged and yield `None`.
    fn metadata(&self) -> impl std::future::Future<Output = Option<SnapshotMetadata>> + Send;
}

impl<S: SnapshotStore + ?Sized> SnapshotStoreExt for S {
    async fn load(&self) -> StoredSnapshot {
        match self.get_latest().await {
            Ok(Some(snapshot)) => snapshot,
            Ok(None) => StoredSnapshot::empty(),
            Err(e) => {
                tracing::error!("Failed to load stored snapshot: {}", e);
                StoredSnapshot::empty()
            }
        }
    }

    async fn save(&self, ips: &[IpRecord], sequence: u64, timestamp: &str) -> Result<()> {
        let snapshot = StoredSnapshot {
            ips: ips.to_vec(),
            sequence,
            timestamp: timestamp.to_owned(),
            saved_at: Some(now_iso8601()),
        };

        self.put_latest(&snapshot).await.map_err(|e| {
            tracing::error!("Failed to save snapshot (sequence {}): {}", sequence, e);
            e
        })?;

        tracing::debug!(sequence, count = snapshot.ips.len(), "Snapshot saved");
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        self.delete_all().await.map_err(|e| {
            tracing::error!("Failed to clear stored snapshot: {}", e);
            e
        })
    }

    async fn metadata(&self) -> Option<SnapshotMetadata> {
        match self.get_metadata().await {
            Ok(meta) => meta,
            Err(e) => {
                tracing::error!("Failed to read snapshot metadata: {}", e);
                None
            }
        }
    }
}
