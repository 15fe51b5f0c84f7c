//! HTTP snapshot fallback.
//!
//! When the stream has not produced a snapshot, the session asks the
//! gateway's REST API for the current table directly.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use ipsync_core::Snapshot;

use crate::error::{Result, SyncError};

/// Path of the snapshot endpoint relative to the API base URL.
pub const SNAPSHOT_PATH: &str = "/qos/ips";

/// One-shot source of a full snapshot.
#[async_trait]
pub trait SnapshotFetcher: Send + Sync {
    /// Fetch the current snapshot. No retries.
    async fn fetch_snapshot(&self) -> Result<Snapshot>;
}

/// Fetches `GET <base>/qos/ips` over HTTP.
#[derive(Debug, Clone)]
pub struct HttpSnapshotFetcher {
    client: Client,
    url: String,
}

impl HttpSnapshotFetcher {
    pub fn new(api_base_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: snapshot_url(api_base_url),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

fn snapshot_url(api_base_url: &str) -> String {
    format!("{}{}", api_base_url.trim_end_matches('/'), SNAPSHOT_PATH)
}

#[async_trait]
impl SnapshotFetcher for HttpSnapshotFetcher {
    async fn fetch_snapshot(&self) -> Result<Snapshot> {
        tracing::debug!(url = %self.url, "Fetching snapshot over HTTP");

        let response = self.client.get(&self.url).send().await?;
        if !response.status().is_success() {
            return Err(SyncError::HttpStatus {
                status: response.status().as_u16(),
            });
        }

        let body = response.text().await?;
        serde_json::from_str(&body)
            .map_err(|e| SyncError::InvalidMessage(format!("snapshot response: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_url_joins_base() {
        assert_eq!(snapshot_url("http://gw:8080"), "http://gw:8080/qos/ips");
        assert_eq!(snapshot_url("http://gw:8080/"), "http://gw:8080/qos/ips");
        assert_eq!(snapshot_url("http://gw/api//"), "http://gw/api/qos/ips");
    }
}
