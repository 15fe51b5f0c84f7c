//! Scripted stand-ins for the gateway, the store and the observer.
//!
//! All doubles are cheap to clone and share state through `Arc`, so a test
//! can hand one clone to the session and keep another for assertions.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot, watch};

use ipsync_client::{
    Result as SyncResult, SnapshotFetcher, StreamConnection, StreamConnector, SyncError,
    SyncObserver,
};
use ipsync_core::{Snapshot, SnapshotMetadata, StoredSnapshot, SyncState};
use ipsync_store::{MemorySnapshotStore, Result as StoreResult, SnapshotStore, StoreError};

/// Wait until a counter reaches `n`. Panics after 60 s of (possibly
/// paused) time.
async fn wait_for_count(counter: &watch::Sender<usize>, n: usize, what: &str) {
    let mut rx = counter.subscribe();
    let reached = tokio::time::timeout(Duration::from_secs(60), rx.wait_for(|count| *count >= n));
    if reached.await.is_err() {
        panic!("timed out waiting for {} {}; saw {}", n, what, *counter.borrow());
    }
}

// ---------------------------------------------------------------------------
// Stream
// ---------------------------------------------------------------------------

#[derive(Debug)]
enum Frame {
    Text(String),
    Invalid(String),
    Error(String),
    Close,
}

struct GatewayShared {
    current: Mutex<Option<mpsc::UnboundedSender<Frame>>>,
    fail_next: AtomicUsize,
    connects: watch::Sender<usize>,
    closes: AtomicUsize,
}

/// Create a connected pair: the connector goes to the session, the control
/// stays with the test.
pub fn scripted_gateway() -> (ScriptedConnector, GatewayControl) {
    let (connects, _) = watch::channel(0);
    let shared = Arc::new(GatewayShared {
        current: Mutex::new(None),
        fail_next: AtomicUsize::new(0),
        connects,
        closes: AtomicUsize::new(0),
    });
    (
        ScriptedConnector {
            shared: Arc::clone(&shared),
        },
        GatewayControl { shared },
    )
}

/// Stream connector whose connections are driven by a [`GatewayControl`].
#[derive(Clone)]
pub struct ScriptedConnector {
    shared: Arc<GatewayShared>,
}

#[async_trait]
impl StreamConnector for ScriptedConnector {
    async fn connect(&self) -> SyncResult<Box<dyn StreamConnection>> {
        let refused = self
            .shared
            .fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();

        let result: SyncResult<Box<dyn StreamConnection>> = if refused {
            Err(SyncError::Transport("connection refused".into()))
        } else {
            let (tx, rx) = mpsc::unbounded_channel();
            *self.shared.current.lock().unwrap() = Some(tx);
            Ok(Box::new(ScriptedConnection {
                frames: rx,
                shared: Arc::clone(&self.shared),
            }))
        };

        self.shared.connects.send_modify(|count| *count += 1);
        result
    }
}

/// One scripted connection.
pub struct ScriptedConnection {
    frames: mpsc::UnboundedReceiver<Frame>,
    shared: Arc<GatewayShared>,
}

#[async_trait]
impl StreamConnection for ScriptedConnection {
    async fn recv(&mut self) -> Option<SyncResult<String>> {
        match self.frames.recv().await? {
            Frame::Text(text) => Some(Ok(text)),
            Frame::Invalid(reason) => Some(Err(SyncError::InvalidMessage(reason))),
            Frame::Error(msg) => Some(Err(SyncError::Transport(msg))),
            Frame::Close => None,
        }
    }

    async fn close(&mut self) -> SyncResult<()> {
        self.shared.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Test-side handle of a scripted gateway.
#[derive(Clone)]
pub struct GatewayControl {
    shared: Arc<GatewayShared>,
}

impl GatewayControl {
    /// Push a raw text frame to the live connection. Returns false if no
    /// connection is live.
    pub fn send_text(&self, text: impl Into<String>) -> bool {
        self.push(Frame::Text(text.into()))
    }

    pub fn send_json(&self, value: serde_json::Value) -> bool {
        self.send_text(value.to_string())
    }

    /// Deliver a frame the connection itself rejects, such as a binary
    /// frame that is not UTF-8. The connection stays open.
    pub fn send_invalid(&self, reason: impl Into<String>) -> bool {
        self.push(Frame::Invalid(reason.into()))
    }

    /// Fail the live connection with a transport error.
    pub fn send_error(&self, msg: impl Into<String>) -> bool {
        let sent = self.push(Frame::Error(msg.into()));
        self.shared.current.lock().unwrap().take();
        sent
    }

    /// Close the live connection from the gateway side.
    pub fn disconnect(&self) -> bool {
        let sent = self.push(Frame::Close);
        self.shared.current.lock().unwrap().take();
        sent
    }

    /// Refuse the next `n` connection attempts.
    pub fn fail_next_connects(&self, n: usize) {
        self.shared.fail_next.store(n, Ordering::SeqCst);
    }

    /// Connection attempts seen so far, refused ones included.
    pub fn connect_count(&self) -> usize {
        *self.shared.connects.borrow()
    }

    /// Graceful client-side closes seen so far.
    pub fn close_count(&self) -> usize {
        self.shared.closes.load(Ordering::SeqCst)
    }

    /// Wait until at least `n` connection attempts have been made.
    pub async fn wait_for_connects(&self, n: usize) {
        wait_for_count(&self.shared.connects, n, "connection attempts").await;
    }

    fn push(&self, frame: Frame) -> bool {
        self.shared
            .current
            .lock()
            .unwrap()
            .as_ref()
            .is_some_and(|tx| tx.send(frame).is_ok())
    }
}

// ---------------------------------------------------------------------------
// HTTP fallback
// ---------------------------------------------------------------------------

enum Reply {
    Ready(Result<Snapshot, u16>),
    Pending(oneshot::Receiver<Result<Snapshot, u16>>),
}

struct FetcherShared {
    replies: Mutex<VecDeque<Reply>>,
    calls: watch::Sender<usize>,
}

/// Snapshot fetcher that answers from a queue.
///
/// With nothing queued, every fetch fails with status 503.
#[derive(Clone)]
pub struct ScriptedFetcher {
    shared: Arc<FetcherShared>,
}

impl ScriptedFetcher {
    pub fn new() -> Self {
        let (calls, _) = watch::channel(0);
        Self {
            shared: Arc::new(FetcherShared {
                replies: Mutex::new(VecDeque::new()),
                calls,
            }),
        }
    }

    pub fn push_ok(&self, snapshot: Snapshot) {
        self.push(Reply::Ready(Ok(snapshot)));
    }

    pub fn push_err(&self, status: u16) {
        self.push(Reply::Ready(Err(status)));
    }

    /// Queue a reply the test resolves later. Dropping the sender fails the
    /// fetch with a timeout.
    pub fn push_pending(&self) -> oneshot::Sender<Result<Snapshot, u16>> {
        let (tx, rx) = oneshot::channel();
        self.push(Reply::Pending(rx));
        tx
    }

    pub fn calls(&self) -> usize {
        *self.shared.calls.borrow()
    }

    pub async fn wait_for_calls(&self, n: usize) {
        wait_for_count(&self.shared.calls, n, "snapshot fetches").await;
    }

    fn push(&self, reply: Reply) {
        self.shared.replies.lock().unwrap().push_back(reply);
    }
}

impl Default for ScriptedFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SnapshotFetcher for ScriptedFetcher {
    async fn fetch_snapshot(&self) -> SyncResult<Snapshot> {
        let reply = self.shared.replies.lock().unwrap().pop_front();
        self.shared.calls.send_modify(|count| *count += 1);

        let outcome = match reply {
            None => Err(503),
            Some(Reply::Ready(outcome)) => outcome,
            Some(Reply::Pending(rx)) => match rx.await {
                Ok(outcome) => outcome,
                Err(_) => return Err(SyncError::Timeout("scripted fetch abandoned".into())),
            },
        };
        outcome.map_err(|status| SyncError::HttpStatus { status })
    }
}

// ---------------------------------------------------------------------------
// Stores
// ---------------------------------------------------------------------------

/// Memory store that records every write.
pub struct RecordingStore {
    inner: MemorySnapshotStore,
    saves: Mutex<Vec<StoredSnapshot>>,
    save_count: watch::Sender<usize>,
    slow_saves: Mutex<HashMap<u64, Duration>>,
}

impl RecordingStore {
    pub fn new() -> Self {
        Self::with_snapshot(None)
    }

    /// Start with `cached` already stored.
    pub fn with_snapshot(cached: Option<StoredSnapshot>) -> Self {
        let (save_count, _) = watch::channel(0);
        let inner = match cached {
            Some(snapshot) => MemorySnapshotStore::with_snapshot(snapshot),
            None => MemorySnapshotStore::new(),
        };
        Self {
            inner,
            saves: Mutex::new(Vec::new()),
            save_count,
            slow_saves: Mutex::new(HashMap::new()),
        }
    }

    /// Make the write of `sequence` take `delay` before it lands.
    pub fn delay_save_of(&self, sequence: u64, delay: Duration) {
        self.slow_saves.lock().unwrap().insert(sequence, delay);
    }

    /// Every snapshot written, oldest first.
    pub fn saves(&self) -> Vec<StoredSnapshot> {
        self.saves.lock().unwrap().clone()
    }

    pub fn save_count(&self) -> usize {
        *self.save_count.borrow()
    }

    pub async fn wait_for_saves(&self, n: usize) {
        wait_for_count(&self.save_count, n, "snapshot saves").await;
    }
}

impl Default for RecordingStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SnapshotStore for RecordingStore {
    async fn get_latest(&self) -> StoreResult<Option<StoredSnapshot>> {
        self.inner.get_latest().await
    }

    async fn put_latest(&self, snapshot: &StoredSnapshot) -> StoreResult<()> {
        let delay = self.slow_saves.lock().unwrap().get(&snapshot.sequence).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.inner.put_latest(snapshot).await?;
        self.saves.lock().unwrap().push(snapshot.clone());
        self.save_count.send_modify(|count| *count += 1);
        Ok(())
    }

    async fn delete_all(&self) -> StoreResult<()> {
        self.inner.delete_all().await
    }

    async fn get_metadata(&self) -> StoreResult<Option<SnapshotMetadata>> {
        self.inner.get_metadata().await
    }
}

/// Store whose every operation fails. Counts attempted writes.
#[derive(Default)]
pub struct FailingStore {
    attempts: AtomicUsize,
}

impl FailingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write_attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    fn unavailable() -> StoreError {
        StoreError::InvalidData("store unavailable".into())
    }
}

#[async_trait]
impl SnapshotStore for FailingStore {
    async fn get_latest(&self) -> StoreResult<Option<StoredSnapshot>> {
        Err(Self::unavailable())
    }

    async fn put_latest(&self, _snapshot: &StoredSnapshot) -> StoreResult<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(Self::unavailable())
    }

    async fn delete_all(&self) -> StoreResult<()> {
        Err(Self::unavailable())
    }

    async fn get_metadata(&self) -> StoreResult<Option<SnapshotMetadata>> {
        Err(Self::unavailable())
    }
}

// ---------------------------------------------------------------------------
// Observer
// ---------------------------------------------------------------------------

/// Observer that keeps every state it is handed.
#[derive(Clone, Default)]
pub struct StateRecorder {
    states: Arc<Mutex<Vec<SyncState>>>,
}

impl StateRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn states(&self) -> Vec<SyncState> {
        self.states.lock().unwrap().clone()
    }

    pub fn len(&self) -> usize {
        self.states.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn last(&self) -> Option<SyncState> {
        self.states.lock().unwrap().last().cloned()
    }
}

impl SyncObserver for StateRecorder {
    fn on_update(&mut self, state: &SyncState) {
        self.states.lock().unwrap().push(state.clone());
    }
}
