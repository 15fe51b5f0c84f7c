//! Error types for the IPSync facade.

use ipsync_client::SyncError;
use ipsync_store::StoreError;
use thiserror::Error;

/// Errors that can occur while setting up a session.
///
/// A running session never returns errors; it reports them through
/// `SyncState::error`.
#[derive(Debug, Error)]
pub enum IpSyncError {
    /// Storage error.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    /// Sync client error.
    #[error("sync error: {0}")]
    Sync(#[from] SyncError),
}

/// Result type for IPSync setup operations.
pub type Result<T> = std::result::Result<T, IpSyncError>;
