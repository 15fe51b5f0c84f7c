//! Session state handed to observers.

use serde::{Deserialize, Serialize};

use crate::global::GlobalStat;
use crate::record::IpRecord;
use crate::time::now_iso8601;

/// The orchestrator's session state, delivered whole on every change.
///
/// Observers always receive a complete value, never a diff.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncState {
    /// The IP table materialized as a sequence.
    pub ips: Vec<IpRecord>,
    /// Sequence of the most recently adopted snapshot.
    pub sequence: u64,
    /// ISO-8601 time the current state was produced.
    pub timestamp: String,
    /// False until the first acceptable snapshot has been adopted.
    pub initial_sync_complete: bool,
    /// Whether the streaming transport is currently open.
    pub is_connected: bool,
    /// Description of the last failure, cleared on connect or adoption.
    pub error: Option<String>,
    /// Most recent aggregate statistics seen on the stream.
    pub last_global: Option<GlobalStat>,
}

/// Coarse classification of a [`SyncState`] for display purposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    /// No snapshot adopted yet and no failure recorded.
    Syncing,
    /// Synced and the stream is open.
    Live,
    /// Synced at some point, but the stream is currently down.
    Disconnected,
    /// Never synced and the last attempt failed.
    Failed,
}

impl SyncState {
    /// The state at session start: empty table, sequence 0, disconnected.
    pub fn new() -> Self {
        Self {
            ips: Vec::new(),
            sequence: 0,
            timestamp: now_iso8601(),
            initial_sync_complete: false,
            is_connected: false,
            error: None,
            last_global: None,
        }
    }

    /// Look up a record by ip.
    pub fn ip(&self, ip: &str) -> Option<&IpRecord> {
        self.ips.iter().find(|record| record.ip == ip)
    }

    pub fn phase(&self) -> SyncPhase {
        match (self.initial_sync_complete, self.is_connected) {
            (true, true) => SyncPhase::Live,
            (true, false) => SyncPhase::Disconnected,
            (false, _) if self.error.is_some() => SyncPhase::Failed,
            (false, _) => SyncPhase::Syncing,
        }
    }
}

impl Default for SyncState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_state() {
        let state = SyncState::new();
        assert!(state.ips.is_empty());
        assert_eq!(state.sequence, 0);
        assert!(!state.initial_sync_complete);
        assert!(!state.is_connected);
        assert_eq!(state.error, None);
        assert_eq!(state.phase(), SyncPhase::Syncing);
    }

    #[test]
    fn test_phase_classification() {
        let mut state = SyncState::new();
        state.error = Some("boom".into());
        assert_eq!(state.phase(), SyncPhase::Failed);

        state.initial_sync_complete = true;
        assert_eq!(state.phase(), SyncPhase::Disconnected);

        state.is_connected = true;
        assert_eq!(state.phase(), SyncPhase::Live);
    }
}
