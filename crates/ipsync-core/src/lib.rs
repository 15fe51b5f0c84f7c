//! # IPSync Core
//!
//! Pure data model for the IPSync engine: per-IP records, sparse deltas,
//! the in-memory IP table, snapshots and the session state exposed to
//! observers.
//!
//! This crate contains no I/O, no storage, no networking. Everything here is
//! deterministic computation over plain data.
//!
//! ## Key Types
//!
//! - [`IpRecord`] - One entry per observed client IP
//! - [`IpDelta`] - A sparse single-IP update carried by the stream
//! - [`IpTable`] - The ip → record mapping the orchestrator mutates
//! - [`Snapshot`] - A complete, sequence-tagged replacement of the table
//! - [`SyncState`] - The session state handed to observers on every change
//!
//! ## Merge Semantics
//!
//! A delta never erases data. Fields absent from the delta (or present but
//! empty) keep their existing values; see [`IpRecord::merge`].

pub mod error;
pub mod global;
pub mod record;
pub mod snapshot;
pub mod state;
pub mod table;
pub mod time;

pub use error::ValidationError;
pub use global::GlobalStat;
pub use record::{IpDelta, IpRecord, DEFAULT_STATUS};
pub use snapshot::{Snapshot, SnapshotMetadata, StoredSnapshot};
pub use state::{SyncPhase, SyncState};
pub use table::{DeltaOutcome, IpTable};
pub use time::now_iso8601;
