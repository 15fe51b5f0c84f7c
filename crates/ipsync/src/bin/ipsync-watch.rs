//! Mirror a QoS gateway's per-IP table and log every change.
//!
//! Usage:
//!   ipsync-watch --stream-url ws://10.0.0.1:8080/qos/stream --api-url http://10.0.0.1:8080
//!
//! The last adopted snapshot is kept in a SQLite file (`--db`), so the next
//! run can show it with `--use-cache` while the gateway is unreachable.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use ipsync::client::{DEFAULT_API_BASE_URL, DEFAULT_STREAM_URL};
use ipsync::{SnapshotStoreExt, SqliteSnapshotStore, SyncConfig, SyncObserver, SyncPhase, SyncState};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "ipsync-watch")]
#[command(about = "Mirror a QoS gateway's per-IP table and log every change")]
struct Args {
    /// WebSocket endpoint streaming snapshots and deltas
    #[arg(long, env = "IPSYNC_STREAM_URL", default_value = DEFAULT_STREAM_URL)]
    stream_url: String,

    /// Base URL of the gateway's HTTP API
    #[arg(long, env = "IPSYNC_API_URL", default_value = DEFAULT_API_BASE_URL)]
    api_url: String,

    /// Path to the snapshot cache
    #[arg(long, env = "IPSYNC_DB", default_value = "ipsync.db")]
    db: PathBuf,

    /// Clear the cached snapshot before starting
    #[arg(long)]
    clear_cache: bool,

    /// Show the cached snapshot until the first live one arrives
    #[arg(long)]
    use_cache: bool,

    /// Delay between reconnect attempts, in milliseconds
    #[arg(long, default_value = "3000")]
    reconnect_delay_ms: u64,

    /// Give up after this many consecutive failed reconnects
    #[arg(long)]
    max_reconnect_attempts: Option<u32>,

    /// Enable verbose debug logging
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    fn config(&self) -> SyncConfig {
        let mut config = SyncConfig::default()
            .with_stream_url(self.stream_url.as_str())
            .with_api_base_url(self.api_url.as_str())
            .with_reconnect_delay(Duration::from_millis(self.reconnect_delay_ms))
            .with_cached_snapshot(self.use_cache);
        if let Some(max) = self.max_reconnect_attempts {
            config = config.with_max_reconnect_attempts(max);
        }
        config
    }
}

/// Logs phase transitions at info and every update at debug.
#[derive(Default)]
struct StateLogger {
    phase: Option<SyncPhase>,
}

impl SyncObserver for StateLogger {
    fn on_update(&mut self, state: &SyncState) {
        let phase = state.phase();
        if self.phase != Some(phase) {
            match &state.error {
                Some(error) => warn!(?phase, error = %error, "Sync state changed"),
                None => info!(
                    ?phase,
                    sequence = state.sequence,
                    ips = state.ips.len(),
                    "Sync state changed"
                ),
            }
            self.phase = Some(phase);
        }

        debug!(
            connected = state.is_connected,
            synced = state.initial_sync_complete,
            sequence = state.sequence,
            ips = state.ips.len(),
            timestamp = %state.timestamp,
            "State update"
        );
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let default_level = if args.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();

    let store = Arc::new(
        SqliteSnapshotStore::open(&args.db)
            .with_context(|| format!("opening snapshot cache {}", args.db.display()))?,
    );

    if args.clear_cache {
        store.clear().await.context("clearing snapshot cache")?;
        info!("Snapshot cache cleared");
    }

    match store.metadata().await {
        Some(meta) => info!(
            sequence = meta.sequence,
            ips = meta.count,
            timestamp = %meta.timestamp,
            saved_at = %meta.saved_at,
            "Cached snapshot"
        ),
        None => info!("No cached snapshot"),
    }

    let handle = ipsync::start(args.config(), store, StateLogger::default())?;

    tokio::signal::ctrl_c()
        .await
        .context("waiting for Ctrl-C")?;
    info!("Shutting down");
    handle.close();

    Ok(())
}
