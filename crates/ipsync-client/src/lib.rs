//! # IPSync Client
//!
//! Keeps a local mirror of the gateway's per-IP table in sync using a
//! snapshot + delta stream, with an HTTP fallback and durable caching.
//!
//! ## Protocol
//!
//! 1. Open the stream. Until a snapshot is adopted, deltas are buffered and
//!    the HTTP snapshot endpoint is queried in parallel.
//! 2. A snapshot is adopted iff its sequence is >= the current sequence.
//!    Adoption replaces the table, replays buffered deltas in arrival order
//!    and persists the result in the background.
//! 3. After that, deltas merge into the live table field by field.
//! 4. On close, reconnect after a fixed delay; if still unsynced, fetch
//!    the snapshot over HTTP as well.
//!
//! ## Key Types
//!
//! - [`SyncSession`] / [`SessionHandle`] - Start, observe and stop a session
//! - [`SyncEngine`] - The pure reducer behind a session
//! - [`InboundMessage`] - Decoded stream messages
//! - [`StreamConnector`] / [`SnapshotFetcher`] - Transport seams
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use ipsync_client::{HttpSnapshotFetcher, SyncConfig, SyncSession, WebSocketConnector};
//! use ipsync_store::MemorySnapshotStore;
//!
//! # async fn example() -> ipsync_client::Result<()> {
//! let config = SyncConfig::default();
//! let session = SyncSession::new(
//!     config.clone(),
//!     WebSocketConnector::new(&config.stream_url),
//!     HttpSnapshotFetcher::new(&config.api_base_url, config.request_timeout)?,
//!     Arc::new(MemorySnapshotStore::new()),
//! );
//!
//! let handle = session.start(|state: &ipsync_core::SyncState| {
//!     println!("{} ips at sequence {}", state.ips.len(), state.sequence);
//! });
//! handle.close();
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod fallback;
pub mod messages;
pub mod session;
pub mod transport;

pub use config::{SyncConfig, DEFAULT_API_BASE_URL, DEFAULT_STREAM_URL};
pub use engine::{DeltaDisposition, SnapshotOutcome, SyncEngine};
pub use error::{Result, SyncError};
pub use fallback::{HttpSnapshotFetcher, SnapshotFetcher, SNAPSHOT_PATH};
pub use messages::InboundMessage;
pub use session::{
    SessionHandle, SyncObserver, SyncSession, FALLBACK_ERROR, RECONNECT_EXHAUSTED_ERROR,
    STREAM_ERROR,
};
pub use transport::websocket::{WebSocketConnection, WebSocketConnector, DEFAULT_CLOSE_TIMEOUT};
pub use transport::{StreamConnection, StreamConnector};
