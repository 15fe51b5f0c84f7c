//! Test fixtures and helpers.
//!
//! Common setup code for integration tests.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};

use ipsync_client::{SessionHandle, SyncConfig, SyncSession};
use ipsync_core::{GlobalStat, IpDelta, IpRecord, Snapshot, SyncState};

use crate::doubles::{
    scripted_gateway, GatewayControl, RecordingStore, ScriptedFetcher, StateRecorder,
};

/// Timestamp carried by fixture snapshots.
pub const TEST_TIMESTAMP: &str = "2024-01-01T00:00:00Z";

/// Default config pointed at a gateway that does not exist.
pub fn test_config() -> SyncConfig {
    SyncConfig::default()
        .with_stream_url("ws://gateway.test/qos/stream")
        .with_api_base_url("http://gateway.test")
}

/// A snapshot stamped with [`TEST_TIMESTAMP`].
pub fn snapshot(sequence: u64, ips: Vec<IpRecord>) -> Snapshot {
    Snapshot::new(ips, sequence, TEST_TIMESTAMP)
}

/// `{"type":"snapshot","snapshot":{...}}`
pub fn snapshot_frame(sequence: u64, ips: &[IpRecord]) -> Value {
    json!({
        "type": "snapshot",
        "snapshot": {
            "ips": ips,
            "sequence": sequence,
            "timestamp": TEST_TIMESTAMP,
        }
    })
}

/// `{"type":"ip","ip_stat":{...}}`
pub fn delta_frame(delta: &IpDelta) -> Value {
    json!({ "type": "ip", "ip_stat": delta })
}

/// `{"type":"global","global_stat":{...}}`
pub fn global_frame(stat: &GlobalStat) -> Value {
    json!({ "type": "global", "global_stat": stat })
}

/// Let every runnable task finish its current work.
///
/// Meant for tests on a paused clock, where the short sleep only completes
/// once the runtime is otherwise idle.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(10)).await;
}

/// A running session wired to scripted doubles.
pub struct SessionFixture {
    pub handle: SessionHandle,
    pub control: GatewayControl,
    pub fetcher: ScriptedFetcher,
    pub store: Arc<RecordingStore>,
    pub recorder: StateRecorder,
}

impl SessionFixture {
    /// Start with an empty store and a fetcher that always fails.
    pub fn start(config: SyncConfig) -> Self {
        Self::start_with(config, ScriptedFetcher::new(), RecordingStore::new())
    }

    /// Start with prepared doubles. Queue fetcher replies before calling
    /// this; the first fetch goes out as soon as the stream opens.
    pub fn start_with(config: SyncConfig, fetcher: ScriptedFetcher, store: RecordingStore) -> Self {
        let (connector, control) = scripted_gateway();
        let store = Arc::new(store);
        let recorder = StateRecorder::new();

        let handle = SyncSession::new(config, connector, fetcher.clone(), Arc::clone(&store))
            .start(recorder.clone());

        Self {
            handle,
            control,
            fetcher,
            store,
            recorder,
        }
    }

    /// Wait until the published state satisfies `pred`, and return it.
    ///
    /// Panics after 60 s of (possibly paused) time.
    pub async fn wait_for_state(&self, pred: impl FnMut(&SyncState) -> bool) -> SyncState {
        let mut rx = self.handle.subscribe();
        let waited = tokio::time::timeout(Duration::from_secs(60), rx.wait_for(pred)).await;
        match waited {
            Ok(Ok(state)) => state.clone(),
            Ok(Err(_)) => panic!("session stopped before reaching the expected state"),
            Err(_) => panic!(
                "timed out waiting for state; last: {:?}",
                self.handle.get_state()
            ),
        }
    }

    /// Wait for the stream to open and the session to notice.
    pub async fn wait_connected(&self) -> SyncState {
        self.wait_for_state(|s| s.is_connected).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frames_decode() {
        use ipsync_client::InboundMessage;

        let snap = snapshot_frame(2, &[IpRecord::new("10.0.0.1")]);
        match InboundMessage::decode(&snap.to_string()).unwrap() {
            InboundMessage::Snapshot(s) => {
                assert_eq!(s.sequence, 2);
                assert_eq!(s.timestamp, TEST_TIMESTAMP);
            }
            other => panic!("unexpected {:?}", other),
        }

        let delta = delta_frame(&IpDelta::new("10.0.0.1").upload_rate(2.0));
        assert_eq!(
            InboundMessage::decode(&delta.to_string()).unwrap(),
            InboundMessage::Delta(IpDelta::new("10.0.0.1").upload_rate(2.0))
        );

        let global = global_frame(&GlobalStat::default());
        assert_eq!(InboundMessage::decode(&global.to_string()).unwrap().kind(), "global");
    }
}
