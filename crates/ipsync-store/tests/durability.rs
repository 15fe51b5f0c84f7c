//! On-disk durability of the SQLite snapshot store.

use ipsync_core::IpRecord;
use ipsync_store::{SnapshotStoreExt, SqliteSnapshotStore};
use proptest::prelude::*;

#[tokio::test]
async fn snapshot_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ipsync.db");

    let ips = vec![
        IpRecord::new("10.0.0.2").with_bandwidth_limit("20mbit"),
        IpRecord::new("10.0.0.3").with_upload_rate(0.75),
    ];

    {
        let store = SqliteSnapshotStore::open(&path).unwrap();
        store.save(&ips, 21, "2024-05-05T10:00:00Z").await.unwrap();
    }

    let reopened = SqliteSnapshotStore::open(&path).unwrap();
    let loaded = reopened.load().await;
    assert_eq!(loaded.sequence, 21);
    assert_eq!(loaded.ips, ips);

    let meta = reopened.metadata().await.unwrap();
    assert_eq!(meta.count, 2);
    assert_eq!(meta.timestamp, "2024-05-05T10:00:00Z");
}

#[tokio::test]
async fn clear_is_durable() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ipsync.db");

    {
        let store = SqliteSnapshotStore::open(&path).unwrap();
        store.save(&[IpRecord::new("10.0.0.9")], 1, "t").await.unwrap();
        store.clear().await.unwrap();
    }

    let reopened = SqliteSnapshotStore::open(&path).unwrap();
    assert!(reopened.load().await.is_empty());
}

#[tokio::test]
async fn unreadable_path_fails_to_open() {
    let dir = tempfile::tempdir().unwrap();
    // A directory is not a database file.
    assert!(SqliteSnapshotStore::open(dir.path()).is_err());
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn last_save_always_wins(sequences in prop::collection::vec(0u64..1_000_000, 1..8)) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let store = SqliteSnapshotStore::open_memory().unwrap();
            for (i, seq) in sequences.iter().enumerate() {
                let ips: Vec<IpRecord> =
                    (0..=i).map(|n| IpRecord::new(format!("10.9.0.{}", n))).collect();
                store.save(&ips, *seq, "t").await.unwrap();
            }

            let loaded = store.load().await;
            let last = *sequences.last().unwrap();
            assert_eq!(loaded.sequence, last);
            assert_eq!(loaded.ips.len(), sequences.len());
        });
    }
}
