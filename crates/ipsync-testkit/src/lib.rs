//! # IPSync Testkit
//!
//! Testing utilities for IPSync.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Fixtures**: Wire-frame builders and a [`SessionFixture`] that starts a
//!   session against scripted doubles
//! - **Doubles**: A scripted gateway (stream + HTTP fallback), recording and
//!   failing stores, and a state-recording observer
//! - **Generators**: Proptest strategies for records, deltas and snapshots
//!
//! ## Scripted Sessions
//!
//! ```rust,no_run
//! use ipsync_testkit::fixtures::{snapshot_frame, test_config, SessionFixture};
//! use ipsync_core::IpRecord;
//!
//! # async fn example() {
//! let fx = SessionFixture::start(test_config());
//! fx.control.wait_for_connects(1).await;
//! fx.control.send_json(snapshot_frame(3, &[IpRecord::new("10.0.0.1")]));
//! fx.wait_for_state(|s| s.initial_sync_complete).await;
//! # }
//! ```

pub mod doubles;
pub mod fixtures;
pub mod generators;

pub use doubles::{
    scripted_gateway, FailingStore, GatewayControl, RecordingStore, ScriptedConnection,
    ScriptedConnector, ScriptedFetcher, StateRecorder,
};
pub use fixtures::{
    delta_frame, global_frame, settle, snapshot, snapshot_frame, test_config, SessionFixture,
    TEST_TIMESTAMP,
};
