//! SQLite implementation of the SnapshotStore trait.
//!
//! This is the durable backend. It uses rusqlite with bundled SQLite,
//! wrapped in async via tokio::spawn_blocking.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};

use ipsync_core::{IpRecord, SnapshotMetadata, StoredSnapshot};

use crate::error::{Result, StoreError};
use crate::migration;
use crate::traits::{SnapshotStore, LATEST_KEY};

/// SQLite-based snapshot store.
///
/// Thread-safe via internal Mutex. All operations use spawn_blocking
/// to avoid blocking the async runtime.
#[derive(Clone)]
pub struct SqliteSnapshotStore {
    /// The SQLite connection, protected by a mutex.
    conn: Arc<Mutex<Connection>>,
}

impl SqliteSnapshotStore {
    /// Open a SQLite database at the given path.
    ///
    /// Creates the file and runs migrations if it doesn't exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let mut conn = Connection::open(path)?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an in-memory SQLite database.
    ///
    /// Useful for testing.
    pub fn open_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory()?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run a blocking operation on the connection off the async runtime.
    async fn blocking<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);

        tokio::task::spawn_blocking(move || {
            let mut conn = conn
                .lock()
                .map_err(|e| StoreError::LockPoisoned(e.to_string()))?;
            f(&mut conn)
        })
        .await
        .map_err(|e| StoreError::Background(format!("spawn_blocking failed: {}", e)))?
    }
}

// Helper to encode the IP table to CBOR
fn encode_ips(ips: &[IpRecord]) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    ciborium::into_writer(ips, &mut buf)
        .map_err(|e| StoreError::Serialization(e.to_string()))?;
    Ok(buf)
}

// Helper to decode the IP table from CBOR
fn decode_ips(bytes: &[u8]) -> Result<Vec<IpRecord>> {
    ciborium::from_reader(bytes).map_err(|e| StoreError::Serialization(e.to_string()))
}

fn sequence_to_sql(sequence: u64) -> Result<i64> {
    i64::try_from(sequence)
        .map_err(|_| StoreError::InvalidData(format!("sequence {} out of range", sequence)))
}

fn sequence_from_sql(raw: i64) -> Result<u64> {
    u64::try_from(raw).map_err(|_| StoreError::InvalidData(format!("negative sequence {}", raw)))
}

#[async_trait]
impl SnapshotStore for SqliteSnapshotStore {
    async fn get_latest(&self) -> Result<Option<StoredSnapshot>> {
        self.blocking(|conn| {
            let row: Option<(Vec<u8>, i64, String, String)> = conn
                .query_row(
                    "SELECT ips, sequence, timestamp, saved_at
                     FROM ip_snapshots WHERE id = ?1",
                    params![LATEST_KEY],
                    |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
                )
                .optional()?;

            match row {
                Some((ips, sequence, timestamp, saved_at)) => Ok(Some(StoredSnapshot {
                    ips: decode_ips(&ips)?,
                    sequence: sequence_from_sql(sequence)?,
                    timestamp,
                    saved_at: Some(saved_at),
                })),
                None => Ok(None),
            }
        })
        .await
    }

    async fn put_latest(&self, snapshot: &StoredSnapshot) -> Result<()> {
        let ips = encode_ips(&snapshot.ips)?;
        let count = snapshot.ips.len() as i64;
        let sequence = sequence_to_sql(snapshot.sequence)?;
        let timestamp = snapshot.timestamp.clone();
        let saved_at = snapshot
            .saved_at
            .clone()
            .unwrap_or_else(ipsync_core::now_iso8601);

        self.blocking(move |conn| {
            conn.execute(
                "INSERT OR REPLACE INTO ip_snapshots
                    (id, ips, ip_count, sequence, timestamp, saved_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![LATEST_KEY, ips, count, sequence, timestamp, saved_at],
            )?;
            Ok(())
        })
        .await
    }

    async fn delete_all(&self) -> Result<()> {
        self.blocking(|conn| {
            conn.execute("DELETE FROM ip_snapshots", [])?;
            Ok(())
        })
        .await
    }

    async fn get_metadata(&self) -> Result<Option<SnapshotMetadata>> {
        self.blocking(|conn| {
            let row: Option<(i64, String, i64, String)> = conn
                .query_row(
                    "SELECT sequence, timestamp, ip_count, saved_at
                     FROM ip_snapshots WHERE id = ?1",
                    params![LATEST_KEY],
                    |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
                )
                .optional()?;

            match row {
                Some((sequence, timestamp, count, saved_at)) => Ok(Some(SnapshotMetadata {
                    sequence: sequence_from_sql(sequence)?,
                    timestamp,
                    count: usize::try_from(count).map_err(|_| {
                        StoreError::InvalidData(format!("negative ip_count {}", count))
                    })?,
                    saved_at,
                })),
                None => Ok(None),
            }
        })
        .await
    }
}
