//! # IPSync Store
//!
//! Durable storage for the single latest IP snapshot. Provides a trait-based
//! interface with SQLite and in-memory implementations.
//!
//! ## Overview
//!
//! The store holds exactly one snapshot generation under the fixed key
//! [`LATEST_KEY`]. Writes overwrite, never append. The store has no opinion
//! on ordering: callers check sequence monotonicity before saving.
//!
//! ## Key Types
//!
//! - [`SnapshotStore`] - The async trait of fallible storage primitives
//! - [`SnapshotStoreExt`] - The load/save/clear/metadata contract callers use
//! - [`SqliteSnapshotStore`] - SQLite-based persistent storage
//! - [`MemorySnapshotStore`] - In-memory storage for tests
//!
//! ## Usage
//!
//! ```rust,no_run
//! use ipsync_store::{SnapshotStoreExt, SqliteSnapshotStore};
//!
//! async fn example() {
//!     let store = SqliteSnapshotStore::open("ipsync.db").unwrap();
//!
//!     // Never fails: falls back to an empty snapshot on any error.
//!     let cached = store.load().await;
//!     println!("cached sequence {}", cached.sequence);
//!
//!     // Best-effort persistence; errors are logged and returned.
//!     let _ = store.save(&cached.ips, cached.sequence, &cached.timestamp).await;
//! }
//! ```
//!
//! ## Failure Semantics
//!
//! - `load` and `metadata` swallow storage errors (logged) and return a safe
//!   default.
//! - `save` and `clear` log and propagate errors; callers treat persistence
//!   as best-effort.

pub mod error;
pub mod memory;
pub mod migration;
pub mod sqlite;
pub mod traits;

pub use error::{Result, StoreError};
pub use memory::MemorySnapshotStore;
pub use sqlite::SqliteSnapshotStore;
pub use traits::{SnapshotStore, SnapshotStoreExt, LATEST_KEY};
