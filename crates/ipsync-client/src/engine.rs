//! The sync reducer.
//!
//! [`SyncEngine`] owns the IP table and session flags and applies the
//! snapshot/delta protocol to them. It performs no I/O: the session actor
//! feeds it decoded messages and transport events and decides, from the
//! returned outcomes, what to persist, log and schedule.

use std::collections::VecDeque;

use ipsync_core::{
    now_iso8601, DeltaOutcome, GlobalStat, IpDelta, IpTable, Snapshot, StoredSnapshot, SyncState,
};

/// What happened to an offered snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotOutcome {
    /// The snapshot replaced the table; `replayed` buffered deltas were
    /// applied on top of it.
    Adopted { replayed: usize },
    /// The snapshot was older than the current state and was discarded.
    Stale { incoming: u64, current: u64 },
}

impl SnapshotOutcome {
    pub fn is_adopted(&self) -> bool {
        matches!(self, Self::Adopted { .. })
    }
}

/// What happened to an offered delta.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeltaDisposition {
    /// No snapshot adopted yet; the delta is queued. `pending` is the queue
    /// length after insertion.
    Buffered { pending: usize },
    /// The delta was applied to the live table.
    Applied(DeltaOutcome),
}

/// Pure state machine for one sync session.
#[derive(Debug, Clone)]
pub struct SyncEngine {
    table: IpTable,
    sequence: u64,
    timestamp: String,
    initial_sync_complete: bool,
    is_connected: bool,
    error: Option<String>,
    last_global: Option<GlobalStat>,
    pending: VecDeque<IpDelta>,
}

impl SyncEngine {
    /// A fresh engine: empty table, sequence 0, disconnected, unsynced.
    pub fn new() -> Self {
        Self {
            table: IpTable::new(),
            sequence: 0,
            timestamp: now_iso8601(),
            initial_sync_complete: false,
            is_connected: false,
            error: None,
            last_global: None,
            pending: VecDeque::new(),
        }
    }

    /// Offer a snapshot from the stream or the HTTP fallback.
    ///
    /// Adopted iff `snapshot.sequence >= self.sequence`. Adoption replaces
    /// the table wholesale, completes the initial sync, clears the error
    /// and replays buffered deltas in arrival order. Replayed deltas keep
    /// the snapshot's timestamp.
    pub fn adopt_snapshot(&mut self, snapshot: Snapshot) -> SnapshotOutcome {
        if !snapshot.supersedes(self.sequence) {
            return SnapshotOutcome::Stale {
                incoming: snapshot.sequence,
                current: self.sequence,
            };
        }

        self.table.replace(snapshot.ips);
        self.sequence = snapshot.sequence;
        self.timestamp = snapshot.timestamp;
        self.initial_sync_complete = true;
        self.error = None;

        let replayed = self.pending.len();
        for delta in self.pending.drain(..) {
            self.table.apply_delta(&delta);
        }

        SnapshotOutcome::Adopted { replayed }
    }

    /// Offer a delta. Buffered until the first snapshot, applied after.
    pub fn apply_delta(&mut self, delta: IpDelta) -> DeltaDisposition {
        if !self.initial_sync_complete {
            self.pending.push_back(delta);
            return DeltaDisposition::Buffered {
                pending: self.pending.len(),
            };
        }

        let outcome = self.table.apply_delta(&delta);
        self.timestamp = now_iso8601();
        DeltaDisposition::Applied(outcome)
    }

    pub fn record_global(&mut self, stat: GlobalStat) {
        self.last_global = Some(stat);
    }

    /// The stream opened. Clears any recorded error.
    pub fn mark_connected(&mut self) {
        self.is_connected = true;
        self.error = None;
    }

    pub fn mark_disconnected(&mut self) {
        self.is_connected = false;
    }

    pub fn record_error(&mut self, error: impl Into<String>) {
        self.error = Some(error.into());
    }

    /// Show a cached snapshot while the first live one is pending.
    ///
    /// Only the table and timestamp are taken. The sequence stays 0 and the
    /// initial sync stays incomplete, so any live snapshot still wins.
    /// Returns false (and changes nothing) once synced, when the table is
    /// already populated, or when the cache is empty.
    pub fn seed(&mut self, cached: StoredSnapshot) -> bool {
        if self.initial_sync_complete || !self.table.is_empty() || cached.ips.is_empty() {
            return false;
        }
        self.table.replace(cached.ips);
        self.timestamp = cached.timestamp;
        true
    }

    /// The full state for observers.
    pub fn state(&self) -> SyncState {
        SyncState {
            ips: self.table.to_vec(),
            sequence: self.sequence,
            timestamp: self.timestamp.clone(),
            initial_sync_complete: self.initial_sync_complete,
            is_connected: self.is_connected,
            error: self.error.clone(),
            last_global: self.last_global.clone(),
        }
    }

    /// The current table as a snapshot, for persistence.
    pub fn current_snapshot(&self) -> Snapshot {
        Snapshot::new(self.table.to_vec(), self.sequence, self.timestamp.clone())
    }

    pub fn is_synced(&self) -> bool {
        self.initial_sync_complete
    }

    pub fn is_connected(&self) -> bool {
        self.is_connected
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Number of deltas waiting for the first snapshot.
    pub fn buffered_len(&self) -> usize {
        self.pending.len()
    }
}

impl Default for SyncEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ipsync_core::IpRecord;
    use proptest::prelude::*;

    fn snapshot(sequence: u64, ips: Vec<IpRecord>) -> Snapshot {
        Snapshot::new(ips, sequence, "2024-01-01T00:00:00Z")
    }

    #[test]
    fn test_delta_before_snapshot_is_buffered() {
        let mut engine = SyncEngine::new();
        let disposition = engine.apply_delta(IpDelta::new("10.0.0.5").download_rate(3.2));

        assert_eq!(disposition, DeltaDisposition::Buffered { pending: 1 });
        let state = engine.state();
        assert!(state.ips.is_empty());
        assert!(!state.initial_sync_complete);
        assert_eq!(engine.buffered_len(), 1);
    }

    #[test]
    fn test_adoption_replays_buffer_on_top() {
        let mut engine = SyncEngine::new();
        engine.apply_delta(IpDelta::new("10.0.0.5").download_rate(3.2));

        let outcome = engine.adopt_snapshot(snapshot(
            5,
            vec![IpRecord::new("10.0.0.5").with_download_rate(1.0)],
        ));

        assert_eq!(outcome, SnapshotOutcome::Adopted { replayed: 1 });
        let state = engine.state();
        assert_eq!(state.sequence, 5);
        assert!(state.initial_sync_complete);
        assert_eq!(state.ips.len(), 1);
        assert_eq!(state.ips[0].download_rate_mbps, 3.2);
        assert_eq!(state.timestamp, "2024-01-01T00:00:00Z");
        assert_eq!(engine.buffered_len(), 0);
    }

    #[test]
    fn test_older_snapshot_is_stale() {
        let mut engine = SyncEngine::new();
        engine.adopt_snapshot(snapshot(5, vec![IpRecord::new("10.0.0.5")]));

        let outcome = engine.adopt_snapshot(snapshot(4, vec![IpRecord::new("10.0.0.9")]));

        assert_eq!(outcome, SnapshotOutcome::Stale { incoming: 4, current: 5 });
        assert_eq!(engine.sequence(), 5);
        assert!(engine.state().ip("10.0.0.5").is_some());
        assert!(engine.state().ip("10.0.0.9").is_none());
    }

    #[test]
    fn test_equal_sequence_replaces_wholesale() {
        let mut engine = SyncEngine::new();
        engine.adopt_snapshot(snapshot(7, vec![IpRecord::new("10.0.0.1")]));
        let outcome = engine.adopt_snapshot(snapshot(7, vec![IpRecord::new("10.0.0.2")]));

        assert!(outcome.is_adopted());
        let ips: Vec<_> = engine.state().ips.into_iter().map(|r| r.ip).collect();
        assert_eq!(ips, vec!["10.0.0.2".to_string()]);
    }

    #[test]
    fn test_live_delta_merges_and_inserts() {
        let mut engine = SyncEngine::new();
        engine.adopt_snapshot(snapshot(
            1,
            vec![IpRecord::new("10.0.0.1").with_hostname("nas").with_upload_rate(0.5)],
        ));

        let merged = engine.apply_delta(IpDelta::new("10.0.0.1").download_rate(9.0));
        let inserted = engine.apply_delta(IpDelta::new("10.0.0.2").hostname("tv"));

        assert_eq!(merged, DeltaDisposition::Applied(DeltaOutcome::Merged));
        assert_eq!(inserted, DeltaDisposition::Applied(DeltaOutcome::Inserted));

        let state = engine.state();
        let nas = state.ip("10.0.0.1").unwrap();
        assert_eq!(nas.hostname.as_deref(), Some("nas"));
        assert_eq!(nas.upload_rate_mbps, 0.5);
        assert_eq!(nas.download_rate_mbps, 9.0);
        assert_eq!(state.sequence, 1);
        assert_ne!(state.timestamp, "2024-01-01T00:00:00Z");
    }

    #[test]
    fn test_connection_flags_and_error() {
        let mut engine = SyncEngine::new();
        engine.record_error("connection refused");
        assert_eq!(engine.error(), Some("connection refused"));

        engine.mark_connected();
        assert!(engine.is_connected());
        assert_eq!(engine.error(), None);

        engine.record_error("reset");
        engine.mark_disconnected();
        assert!(!engine.is_connected());
        assert_eq!(engine.error(), Some("reset"));

        engine.adopt_snapshot(snapshot(1, vec![]));
        assert_eq!(engine.error(), None);
    }

    #[test]
    fn test_global_stat_does_not_touch_table() {
        let mut engine = SyncEngine::new();
        engine.adopt_snapshot(snapshot(3, vec![IpRecord::new("10.0.0.1")]));
        let before = engine.state();

        let stat = GlobalStat {
            wan_interface: Some("eth1".into()),
            ..GlobalStat::default()
        };
        engine.record_global(stat.clone());

        let after = engine.state();
        assert_eq!(after.ips, before.ips);
        assert_eq!(after.sequence, before.sequence);
        assert_eq!(after.last_global, Some(stat));
    }

    #[test]
    fn test_seed_keeps_sequence_zero() {
        let mut engine = SyncEngine::new();
        let cached = StoredSnapshot {
            ips: vec![IpRecord::new("10.0.0.8")],
            sequence: 40,
            timestamp: "2024-02-02T00:00:00Z".into(),
            saved_at: Some("2024-02-02T00:00:01Z".into()),
        };

        assert!(engine.seed(cached.clone()));
        let state = engine.state();
        assert_eq!(state.ips.len(), 1);
        assert_eq!(state.sequence, 0);
        assert!(!state.initial_sync_complete);
        assert_eq!(state.timestamp, "2024-02-02T00:00:00Z");

        // A restarted gateway with a lower sequence still wins.
        assert!(engine.adopt_snapshot(snapshot(2, vec![])).is_adopted());
        assert!(engine.state().ips.is_empty());

        // Never reseeds after sync.
        assert!(!engine.seed(cached));
    }

    #[test]
    fn test_seed_ignores_empty_cache() {
        let mut engine = SyncEngine::new();
        assert!(!engine.seed(StoredSnapshot::empty()));
        assert!(engine.state().ips.is_empty());
    }

    #[test]
    fn test_current_snapshot_includes_replayed_deltas() {
        let mut engine = SyncEngine::new();
        engine.apply_delta(IpDelta::new("10.0.0.3").bandwidth_limit("5mbit"));
        engine.adopt_snapshot(snapshot(9, vec![IpRecord::new("10.0.0.4")]));

        let persisted = engine.current_snapshot();
        assert_eq!(persisted.sequence, 9);
        assert_eq!(persisted.ips.len(), 2);
        assert_eq!(
            persisted.ips[0].bandwidth_limit.as_deref(),
            Some("5mbit")
        );
    }

    fn arb_ip() -> impl Strategy<Value = String> {
        (0u8..6).prop_map(|n| format!("10.0.0.{}", n))
    }

    fn arb_record() -> impl Strategy<Value = IpRecord> {
        (arb_ip(), 0.0f64..100.0, 0.0f64..100.0).prop_map(|(ip, down, up)| {
            IpRecord::new(ip).with_download_rate(down).with_upload_rate(up)
        })
    }

    fn arb_delta() -> impl Strategy<Value = IpDelta> {
        (
            arb_ip(),
            prop::option::of(0.0f64..100.0),
            prop::option::of("[a-z]{1,8}"),
        )
            .prop_map(|(ip, down, host)| {
                let mut delta = IpDelta::new(ip);
                delta.download_rate_mbps = down;
                delta.hostname = host;
                delta
            })
    }

    proptest! {
        #[test]
        fn adopted_sequence_never_decreases(
            sequences in prop::collection::vec(0u64..50, 1..20),
        ) {
            let mut engine = SyncEngine::new();
            let mut high = 0u64;
            for seq in sequences {
                let outcome = engine.adopt_snapshot(snapshot(seq, vec![]));
                prop_assert_eq!(outcome.is_adopted(), seq >= high);
                high = high.max(seq);
                prop_assert_eq!(engine.sequence(), high);
            }
        }

        #[test]
        fn buffered_deltas_replay_in_arrival_order(
            base in prop::collection::vec(arb_record(), 0..6),
            deltas in prop::collection::vec(arb_delta(), 0..12),
        ) {
            let mut buffered = SyncEngine::new();
            for delta in &deltas {
                buffered.apply_delta(delta.clone());
            }
            buffered.adopt_snapshot(snapshot(1, base.clone()));

            let mut expected = IpTable::from_records(base);
            for delta in &deltas {
                expected.apply_delta(delta);
            }

            prop_assert_eq!(buffered.state().ips, expected.to_vec());
        }

        #[test]
        fn delta_never_erases_fields(
            record in arb_record(),
            hostname in "[a-z]{1,8}",
            down in 0.0f64..100.0,
        ) {
            let mut engine = SyncEngine::new();
            let seeded = record.clone().with_hostname(hostname.clone());
            engine.adopt_snapshot(snapshot(1, vec![seeded]));

            engine.apply_delta(IpDelta::new(record.ip.clone()).download_rate(down));

            let state = engine.state();
            let merged = state.ip(&record.ip).unwrap();
            prop_assert_eq!(merged.download_rate_mbps, down);
            prop_assert_eq!(merged.upload_rate_mbps, record.upload_rate_mbps);
            prop_assert_eq!(merged.hostname.as_deref(), Some(hostname.as_str()));
        }
    }
}
