//! # IPSync
//!
//! Keeps a local, durable mirror of a QoS gateway's per-IP traffic table.
//!
//! ## Overview
//!
//! The gateway publishes full snapshots and per-IP deltas over a WebSocket
//! stream and serves the current snapshot over HTTP. IPSync:
//!
//! - **Buffers** deltas that arrive before the first snapshot
//! - **Adopts** a snapshot only if its sequence is not older than the
//!   current one
//! - **Merges** deltas into existing records without erasing fields
//! - **Persists** every adopted snapshot to SQLite in the background
//! - **Reconnects** after a fixed delay and falls back to HTTP while unsynced
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use ipsync::{SqliteSnapshotStore, SyncConfig, SyncState};
//!
//! # async fn example() -> ipsync::Result<()> {
//! let store = Arc::new(SqliteSnapshotStore::open("ipsync.db")?);
//! let handle = ipsync::start(SyncConfig::default(), store, |state: &SyncState| {
//!     println!("{} ips, sequence {}", state.ips.len(), state.sequence);
//! })?;
//!
//! // Later:
//! handle.reconnect();
//! handle.close();
//! # Ok(())
//! # }
//! ```
//!
//! ## Re-exports
//!
//! - `ipsync::core` - Records, deltas, snapshots and session state
//! - `ipsync::store` - Snapshot persistence
//! - `ipsync::client` - Transports, the sync engine and sessions

pub mod error;

use std::sync::Arc;

pub use ipsync_client as client;
pub use ipsync_core as core;
pub use ipsync_store as store;

pub use error::{IpSyncError, Result};

pub use ipsync_client::{
    HttpSnapshotFetcher, SessionHandle, SyncConfig, SyncObserver, SyncSession, WebSocketConnector,
};
pub use ipsync_core::{
    GlobalStat, IpDelta, IpRecord, Snapshot, SnapshotMetadata, StoredSnapshot, SyncPhase,
    SyncState,
};
pub use ipsync_store::{MemorySnapshotStore, SnapshotStore, SnapshotStoreExt, SqliteSnapshotStore};

/// A session over the WebSocket stream and the HTTP snapshot endpoint.
pub type GatewaySession<S> = SyncSession<WebSocketConnector, HttpSnapshotFetcher, S>;

/// Build a session against the gateway described by `config`.
pub fn session<S: SnapshotStore + 'static>(
    config: SyncConfig,
    store: Arc<S>,
) -> Result<GatewaySession<S>> {
    let connector = WebSocketConnector::new(config.stream_url.as_str());
    let fetcher = HttpSnapshotFetcher::new(&config.api_base_url, config.request_timeout)?;
    Ok(SyncSession::new(config, connector, fetcher, store))
}

/// Start syncing against the gateway. Must be called within a Tokio
/// runtime.
///
/// Fails only if the HTTP client cannot be built.
pub fn start<S, O>(config: SyncConfig, store: Arc<S>, observer: O) -> Result<SessionHandle>
where
    S: SnapshotStore + 'static,
    O: SyncObserver,
{
    tracing::info!(
        stream = %config.stream_url,
        api = %config.api_base_url,
        "Starting IP sync"
    );
    Ok(session(config, store)?.start(observer))
}
