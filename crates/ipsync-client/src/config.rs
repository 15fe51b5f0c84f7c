//! Session configuration.

use std::time::Duration;

/// Default streaming endpoint of the gateway.
pub const DEFAULT_STREAM_URL: &str = "ws://localhost:8080/qos/stream";

/// Default base URL of the gateway's HTTP API.
pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8080";

/// Configuration for a sync session.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// WebSocket endpoint delivering snapshot and delta messages.
    pub stream_url: String,
    /// Base URL for the HTTP snapshot fallback (`<base>/qos/ips`).
    pub api_base_url: String,
    /// How long to wait for a snapshot after the stream opens before
    /// logging a warning. Expiry takes no corrective action.
    pub snapshot_timeout: Duration,
    /// Fixed delay between a transport close and the next connect attempt.
    pub reconnect_delay: Duration,
    /// Stop scheduling automatic reconnects after this many consecutive
    /// attempts. `None` retries forever.
    pub max_reconnect_attempts: Option<u32>,
    /// Timeout for the HTTP fallback request.
    pub request_timeout: Duration,
    /// Show the cached snapshot while the first live snapshot is pending.
    pub load_cached_snapshot: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            stream_url: DEFAULT_STREAM_URL.to_string(),
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            snapshot_timeout: Duration::from_millis(2000),
            reconnect_delay: Duration::from_millis(3000),
            max_reconnect_attempts: None,
            request_timeout: Duration::from_secs(10),
            load_cached_snapshot: false,
        }
    }
}

impl SyncConfig {
    pub fn with_stream_url(mut self, url: impl Into<String>) -> Self {
        self.stream_url = url.into();
        self
    }

    pub fn with_api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into();
        self
    }

    pub fn with_snapshot_timeout(mut self, timeout: Duration) -> Self {
        self.snapshot_timeout = timeout;
        self
    }

    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    pub fn with_max_reconnect_attempts(mut self, attempts: u32) -> Self {
        self.max_reconnect_attempts = Some(attempts);
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_cached_snapshot(mut self, enabled: bool) -> Self {
        self.load_cached_snapshot = enabled;
        self
    }
}
