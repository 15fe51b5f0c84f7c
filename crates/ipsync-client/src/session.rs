//! The sync session: a single-writer actor around [`SyncEngine`].
//!
//! `start` spawns one actor task that owns the engine and the observer.
//! Everything else (the stream reader, timers, the HTTP fallback and
//! persistence) runs in its own task and reports back over an unbounded
//! channel, so the actor never awaits network or storage work inline.
//!
//! Each connection attempt gets a generation number. Events tagged with a
//! generation other than the live connection's are ignored.
//!
//! Adopted snapshots are written by a single writer task, one at a time and
//! in adoption order, so the store never falls back to an older sequence.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;

use ipsync_core::{Snapshot, StoredSnapshot, SyncState};
use ipsync_store::{SnapshotStore, SnapshotStoreExt};

use crate::config::SyncConfig;
use crate::engine::{DeltaDisposition, SnapshotOutcome, SyncEngine};
use crate::error::{Result, SyncError};
use crate::fallback::SnapshotFetcher;
use crate::messages::InboundMessage;
use crate::transport::StreamConnector;

/// `state.error` after a stream fault or failed connect.
pub const STREAM_ERROR: &str = "WebSocket connection error";

/// `state.error` after a failed HTTP fallback.
pub const FALLBACK_ERROR: &str = "Failed to sync with server";

/// `state.error` once the reconnect budget is spent.
pub const RECONNECT_EXHAUSTED_ERROR: &str = "max reconnection attempts reached";

/// Receives every state change of a session.
///
/// Called from the session task after each mutation, with the full state.
/// Implementations should return quickly.
pub trait SyncObserver: Send + 'static {
    fn on_update(&mut self, state: &SyncState);
}

impl<F> SyncObserver for F
where
    F: FnMut(&SyncState) + Send + 'static,
{
    fn on_update(&mut self, state: &SyncState) {
        self(state)
    }
}

/// A configured, not yet started session.
pub struct SyncSession<C, F, S> {
    config: SyncConfig,
    connector: Arc<C>,
    fetcher: Arc<F>,
    store: Arc<S>,
}

impl<C, F, S> SyncSession<C, F, S>
where
    C: StreamConnector + 'static,
    F: SnapshotFetcher + 'static,
    S: SnapshotStore + 'static,
{
    pub fn new(config: SyncConfig, connector: C, fetcher: F, store: Arc<S>) -> Self {
        Self {
            config,
            connector: Arc::new(connector),
            fetcher: Arc::new(fetcher),
            store,
        }
    }

    /// Start syncing. Must be called from within a Tokio runtime.
    ///
    /// The returned handle reports the initial state (empty table,
    /// sequence 0, disconnected) until the first event is processed.
    pub fn start<O: SyncObserver>(self, observer: O) -> SessionHandle {
        let engine = SyncEngine::new();
        let (state_tx, state_rx) = watch::channel(engine.state());
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let closed = Arc::new(AtomicBool::new(false));
        let (persist_tx, persist_rx) = mpsc::unbounded_channel();
        tokio::spawn(write_snapshots(Arc::clone(&self.store), persist_rx));

        let actor = SessionActor {
            config: self.config,
            connector: self.connector,
            fetcher: self.fetcher,
            store: self.store,
            engine,
            observer,
            state_tx,
            closed: Arc::clone(&closed),
            events_tx: events_tx.clone(),
            events_rx,
            persist_tx,
            generation: 0,
            connection: None,
            snapshot_timer: None,
            reconnect_timer: None,
            fetch_in_flight: false,
            reconnect_attempts: 0,
        };
        tokio::spawn(actor.run());

        SessionHandle {
            events: events_tx,
            state: state_rx,
            closed,
        }
    }
}

/// Control surface of a running session.
///
/// Dropping the handle closes the session.
#[derive(Debug)]
pub struct SessionHandle {
    events: mpsc::UnboundedSender<Event>,
    state: watch::Receiver<SyncState>,
    closed: Arc<AtomicBool>,
}

impl SessionHandle {
    /// The current state.
    pub fn get_state(&self) -> SyncState {
        self.state.borrow().clone()
    }

    /// A receiver that observes every published state.
    pub fn subscribe(&self) -> watch::Receiver<SyncState> {
        self.state.clone()
    }

    /// Connect now if no connection is open or opening.
    ///
    /// Cancels a pending reconnect timer and resets the attempt budget.
    /// Keeps the table and sequence.
    pub fn reconnect(&self) {
        if self.is_closed() {
            return;
        }
        let _ = self.events.send(Event::Reconnect);
    }

    /// Stop the session. Idempotent.
    ///
    /// No observer notification begins after this returns. Timers are
    /// cancelled and the stream is closed asynchronously.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        let _ = self.events.send(Event::Close);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl Drop for SessionHandle {
    fn drop(&mut self) {
        self.close();
    }
}

#[derive(Debug)]
enum Event {
    Reconnect,
    Close,
    CacheLoaded(StoredSnapshot),
    Opened { generation: u64 },
    Message { generation: u64, message: InboundMessage },
    TransportError { generation: u64, error: SyncError },
    Closed { generation: u64 },
    FetchCompleted(Result<Snapshot>),
    SnapshotTimeout { generation: u64 },
    ReconnectDue,
}

/// The live (open or opening) connection.
struct Connection {
    generation: u64,
    shutdown: oneshot::Sender<()>,
}

struct SessionActor<C, F, S, O> {
    config: SyncConfig,
    connector: Arc<C>,
    fetcher: Arc<F>,
    store: Arc<S>,
    engine: SyncEngine,
    observer: O,
    state_tx: watch::Sender<SyncState>,
    closed: Arc<AtomicBool>,
    events_tx: mpsc::UnboundedSender<Event>,
    events_rx: mpsc::UnboundedReceiver<Event>,
    persist_tx: mpsc::UnboundedSender<Snapshot>,
    generation: u64,
    connection: Option<Connection>,
    snapshot_timer: Option<JoinHandle<()>>,
    reconnect_timer: Option<JoinHandle<()>>,
    fetch_in_flight: bool,
    reconnect_attempts: u32,
}

impl<C, F, S, O> SessionActor<C, F, S, O>
where
    C: StreamConnector + 'static,
    F: SnapshotFetcher + 'static,
    S: SnapshotStore + 'static,
    O: SyncObserver,
{
    async fn run(mut self) {
        if self.config.load_cached_snapshot {
            self.load_cache();
        }
        self.connect();

        while let Some(event) = self.events_rx.recv().await {
            if let Event::Close = event {
                self.shutdown();
                break;
            }
            self.handle(event);
        }
        tracing::debug!("Sync session stopped");
    }

    fn handle(&mut self, event: Event) {
        match event {
            Event::Reconnect => self.on_reconnect_requested(),
            Event::Close => self.shutdown(),
            Event::CacheLoaded(cached) => {
                let count = cached.ips.len();
                if self.engine.seed(cached) {
                    tracing::info!(count, "Showing cached snapshot until the first live one");
                    self.publish();
                }
            }
            Event::Opened { generation } if self.is_current(generation) => self.on_opened(),
            Event::Message {
                generation,
                message,
            } if self.is_current(generation) => self.on_message(message),
            Event::TransportError { generation, error } if self.is_current(generation) => {
                tracing::error!("Stream error: {}", error);
                self.engine.record_error(STREAM_ERROR);
                self.publish();
            }
            Event::Closed { generation } if self.is_current(generation) => self.on_closed(),
            Event::FetchCompleted(result) => self.on_fetch_completed(result),
            Event::SnapshotTimeout { generation } if self.is_current(generation) => {
                self.snapshot_timer = None;
                if !self.engine.is_synced() {
                    tracing::warn!(
                        "No snapshot within {:?} of connecting; still waiting",
                        self.config.snapshot_timeout
                    );
                }
            }
            Event::SnapshotTimeout { generation } => {
                tracing::debug!(generation, "Ignoring snapshot timeout of superseded connection");
            }
            Event::ReconnectDue => {
                self.reconnect_timer = None;
                tracing::info!("Attempting reconnect");
                self.connect();
            }
            Event::Opened { generation }
            | Event::Message { generation, .. }
            | Event::TransportError { generation, .. }
            | Event::Closed { generation } => {
                tracing::debug!(generation, "Ignoring event from superseded connection");
            }
        }
    }

    fn is_current(&self, generation: u64) -> bool {
        self.connection
            .as_ref()
            .is_some_and(|conn| conn.generation == generation)
    }

    fn connect(&mut self) {
        if self.connection.is_some() {
            return;
        }

        self.generation += 1;
        let generation = self.generation;
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        self.connection = Some(Connection {
            generation,
            shutdown: shutdown_tx,
        });

        tracing::info!(generation, url = %self.config.stream_url, "Connecting to stream");
        tokio::spawn(read_stream(
            Arc::clone(&self.connector),
            generation,
            self.events_tx.clone(),
            shutdown_rx,
        ));
    }

    fn on_reconnect_requested(&mut self) {
        if self.connection.is_some() {
            tracing::debug!("Reconnect requested while a connection is open or opening");
            return;
        }
        cancel(&mut self.reconnect_timer);
        self.reconnect_attempts = 0;
        self.connect();
    }

    fn on_opened(&mut self) {
        tracing::info!("Stream connected");
        self.engine.mark_connected();
        self.reconnect_attempts = 0;
        self.publish();

        if !self.engine.is_synced() {
            self.request_fallback();
            self.arm_snapshot_timer();
        }
    }

    fn on_message(&mut self, message: InboundMessage) {
        match message {
            InboundMessage::Snapshot(snapshot) => self.offer_snapshot(snapshot, "stream"),
            InboundMessage::Delta(delta) => match self.engine.apply_delta(delta) {
                DeltaDisposition::Buffered { pending } => {
                    tracing::debug!(pending, "Buffering delta until the first snapshot");
                }
                DeltaDisposition::Applied(_) => self.publish(),
            },
            InboundMessage::Global(stat) => {
                self.engine.record_global(stat);
                self.publish();
            }
            InboundMessage::Unknown(kind) => {
                tracing::debug!(kind = %kind, "Ignoring unknown stream message");
            }
        }
    }

    fn on_closed(&mut self) {
        tracing::info!("Stream closed");
        self.connection = None;
        cancel(&mut self.snapshot_timer);
        self.engine.mark_disconnected();
        self.publish();

        if !self.engine.is_synced() {
            self.request_fallback();
        }
        self.schedule_reconnect();
    }

    fn on_fetch_completed(&mut self, result: Result<Snapshot>) {
        self.fetch_in_flight = false;
        match result {
            Ok(snapshot) => self.offer_snapshot(snapshot, "http"),
            Err(e) => {
                tracing::error!("HTTP snapshot fallback failed: {}", e);
                self.engine.record_error(FALLBACK_ERROR);
                self.publish();
            }
        }
    }

    fn offer_snapshot(&mut self, snapshot: Snapshot, source: &'static str) {
        match self.engine.adopt_snapshot(snapshot) {
            SnapshotOutcome::Adopted { replayed } => {
                tracing::info!(
                    source,
                    sequence = self.engine.sequence(),
                    replayed,
                    "Snapshot adopted"
                );
                cancel(&mut self.snapshot_timer);
                self.persist();
                self.publish();
            }
            SnapshotOutcome::Stale { incoming, current } => {
                tracing::warn!(source, incoming, current, "Discarding stale snapshot");
            }
        }
    }

    /// Issue the HTTP fallback unless one is already outstanding.
    fn request_fallback(&mut self) {
        if self.fetch_in_flight {
            tracing::debug!("Snapshot fetch already in flight");
            return;
        }
        self.fetch_in_flight = true;

        let fetcher = Arc::clone(&self.fetcher);
        let events = self.events_tx.clone();
        tokio::spawn(async move {
            let result = fetcher.fetch_snapshot().await;
            let _ = events.send(Event::FetchCompleted(result));
        });
    }

    fn arm_snapshot_timer(&mut self) {
        cancel(&mut self.snapshot_timer);
        let generation = self.generation;
        let timeout = self.config.snapshot_timeout;
        let events = self.events_tx.clone();
        self.snapshot_timer = Some(tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            let _ = events.send(Event::SnapshotTimeout { generation });
        }));
    }

    fn schedule_reconnect(&mut self) {
        if self.reconnect_timer.is_some() {
            return;
        }
        if let Some(max) = self.config.max_reconnect_attempts {
            if self.reconnect_attempts >= max {
                tracing::error!(attempts = self.reconnect_attempts, "Giving up on reconnecting");
                self.engine.record_error(RECONNECT_EXHAUSTED_ERROR);
                self.publish();
                return;
            }
        }
        self.reconnect_attempts += 1;

        let delay = self.config.reconnect_delay;
        let events = self.events_tx.clone();
        tracing::debug!(attempt = self.reconnect_attempts, ?delay, "Scheduling reconnect");
        self.reconnect_timer = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = events.send(Event::ReconnectDue);
        }));
    }

    fn load_cache(&self) {
        let store = Arc::clone(&self.store);
        let events = self.events_tx.clone();
        tokio::spawn(async move {
            let cached = store.load().await;
            let _ = events.send(Event::CacheLoaded(cached));
        });
    }

    /// Queue the adopted table for the snapshot writer.
    fn persist(&self) {
        if self.persist_tx.send(self.engine.current_snapshot()).is_err() {
            tracing::debug!("Snapshot writer stopped; not persisting");
        }
    }

    fn publish(&mut self) {
        if self.closed.load(Ordering::SeqCst) {
            return;
        }
        let state = self.engine.state();
        self.state_tx.send_replace(state.clone());
        self.observer.on_update(&state);
    }

    fn shutdown(&mut self) {
        cancel(&mut self.snapshot_timer);
        cancel(&mut self.reconnect_timer);
        if let Some(conn) = self.connection.take() {
            let _ = conn.shutdown.send(());
        }
    }
}

/// Save queued snapshots one at a time, in the order they were adopted.
/// `save` logs its own failures; they never reach `state.error`.
async fn write_snapshots<S: SnapshotStore>(
    store: Arc<S>,
    mut queue: mpsc::UnboundedReceiver<Snapshot>,
) {
    while let Some(snapshot) = queue.recv().await {
        if let Err(e) = store
            .save(&snapshot.ips, snapshot.sequence, &snapshot.timestamp)
            .await
        {
            tracing::debug!(sequence = snapshot.sequence, error = %e, "Snapshot not persisted");
        }
    }
}

fn cancel(timer: &mut Option<JoinHandle<()>>) {
    if let Some(handle) = timer.take() {
        handle.abort();
    }
}

/// Connect, then forward decoded frames until the stream ends or the
/// session asks us to stop. Always reports `Closed` unless stopped.
async fn read_stream<C: StreamConnector>(
    connector: Arc<C>,
    generation: u64,
    events: mpsc::UnboundedSender<Event>,
    mut shutdown: oneshot::Receiver<()>,
) {
    let connected = tokio::select! {
        biased;
        _ = &mut shutdown => return,
        result = connector.connect() => result,
    };

    let mut connection = match connected {
        Ok(connection) => connection,
        Err(error) => {
            let _ = events.send(Event::TransportError { generation, error });
            let _ = events.send(Event::Closed { generation });
            return;
        }
    };
    let _ = events.send(Event::Opened { generation });

    loop {
        tokio::select! {
            biased;
            _ = &mut shutdown => {
                if let Err(e) = connection.close().await {
                    tracing::debug!("Error closing stream: {}", e);
                }
                return;
            }
            frame = connection.recv() => match frame {
                Some(Ok(text)) => match InboundMessage::decode(&text) {
                    Ok(message) => {
                        let _ = events.send(Event::Message { generation, message });
                    }
                    Err(e) => tracing::warn!("Dropping malformed stream message: {}", e),
                },
                Some(Err(SyncError::InvalidMessage(reason))) => {
                    tracing::warn!("Dropping malformed stream frame: {}", reason);
                }
                Some(Err(error)) => {
                    let _ = events.send(Event::TransportError { generation, error });
                    let _ = events.send(Event::Closed { generation });
                    return;
                }
                None => {
                    let _ = events.send(Event::Closed { generation });
                    return;
                }
            }
        }
    }
}
