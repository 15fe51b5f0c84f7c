//! Error types for the sync client.

use thiserror::Error;

/// Errors that can occur during sync operations.
///
/// None of these escape a running session: the session converts them into
/// `SyncState::error` or log output.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Streaming transport failure (connect, read, protocol).
    #[error("transport error: {0}")]
    Transport(String),

    /// HTTP request failure.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// The snapshot endpoint answered with a non-2xx status.
    #[error("snapshot endpoint returned status {status}")]
    HttpStatus { status: u16 },

    /// Inbound payload was not valid JSON.
    #[error("decode error: {0}")]
    Decode(#[from] serde_json::Error),

    /// Inbound message was well-formed JSON but not a valid message.
    #[error("invalid message: {0}")]
    InvalidMessage(String),

    /// A delta or record failed validation.
    #[error("validation error: {0}")]
    Validation(#[from] ipsync_core::ValidationError),

    /// Timed out waiting on the peer.
    #[error("timeout: {0}")]
    Timeout(String),
}

/// Result type for sync operations.
pub type Result<T> = std::result::Result<T, SyncError>;
