// ── Engine abstraction ──
//
// Full lifecycle management for a dashboard session: stream connection,
// ingestion into the SiteStore, pending-selection resolution, and the
// sharing guard. The embedding application holds one Engine and clones
// it freely.

use std::sync::Arc;

use tokio::sync::{Mutex, broadcast, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use sitepulse_api::frame::MetricsFrame;
use sitepulse_api::{ConnectionState, StreamHandle};

use crate::config::EngineConfig;
use crate::error::CoreError;
use crate::model::{ShareAction, ShareKind, SiteEvent, SiteId};
use crate::session::{
    DateRange, MutationOutcome, SelectOutcome, SessionState, SharingMode, ViewFilters, ViewState,
};
use crate::store::{SiteSnapshot, SiteStore};

// ── Engine ───────────────────────────────────────────────────────────

/// The main entry point for consumers.
///
/// Cheaply cloneable via `Arc<EngineInner>`. Owns the metrics stream,
/// the event store, and the session state; all mutation flows through
/// here so the sharing guard and selection resolver always see the same
/// ordering.
#[derive(Clone)]
pub struct Engine {
    inner: Arc<EngineInner>,
}

struct EngineInner {
    config: EngineConfig,
    store: Arc<SiteStore>,
    session: SessionState,
    connection_state: watch::Sender<ConnectionState>,
    /// Engine lifetime token; children are derived per connection.
    cancel: CancellationToken,
    stream_cancel: Mutex<CancellationToken>,
    stream: Mutex<Option<StreamHandle>>,
    task_handles: Mutex<Vec<JoinHandle<()>>>,
}

impl Engine {
    /// Create a new Engine from configuration. Does NOT connect -- call
    /// [`connect()`](Self::connect) to start streaming.
    pub fn new(config: EngineConfig) -> Self {
        let store = Arc::new(SiteStore::new(config.event_cap));
        let (connection_state, _) = watch::channel(ConnectionState::Idle);

        Self {
            inner: Arc::new(EngineInner {
                config,
                store,
                session: SessionState::new(),
                connection_state,
                cancel: CancellationToken::new(),
                stream_cancel: Mutex::new(CancellationToken::new()),
                stream: Mutex::new(None),
                task_handles: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    /// Access the underlying SiteStore.
    pub fn store(&self) -> &Arc<SiteStore> {
        &self.inner.store
    }

    // ── Connection lifecycle ─────────────────────────────────────────

    /// Connect to the metrics stream and spawn background tasks.
    ///
    /// Idempotent: an existing connection is torn down first, so calling
    /// this after the reconnect ceiling was reached acts as the manual
    /// reconnect. Returns once the socket loop is running; connection
    /// progress is observable via [`connection_state`](Self::connection_state).
    ///
    /// Fails without side effects if the configured stream URL is not a
    /// WebSocket URL.
    pub async fn connect(&self) -> Result<(), CoreError> {
        let scheme = self.inner.config.stream_url.scheme();
        if !matches!(scheme, "ws" | "wss") {
            return Err(CoreError::Config {
                message: format!("stream URL must be ws:// or wss://, got {scheme}://"),
            });
        }

        self.teardown_stream().await;

        let stream_cancel = self.inner.cancel.child_token();
        *self.inner.stream_cancel.lock().await = stream_cancel.clone();

        let handle = StreamHandle::connect(
            self.inner.config.stream_url.clone(),
            self.inner.config.reconnect.clone(),
            stream_cancel.clone(),
        );

        let mut handles = self.inner.task_handles.lock().await;

        handles.push(tokio::spawn(bridge_task(
            self.clone(),
            handle.subscribe(),
            stream_cancel.clone(),
        )));

        handles.push(tokio::spawn(status_task(
            self.inner.connection_state.clone(),
            handle.status(),
            stream_cancel.clone(),
        )));

        handles.push(tokio::spawn(prune_task(
            Arc::clone(&self.inner.store),
            self.inner.config.prune_max_age,
            self.inner.config.prune_interval,
            stream_cancel,
        )));

        *self.inner.stream.lock().await = Some(handle);
        info!(url = %self.inner.config.stream_url, "engine connected");
        Ok(())
    }

    /// Disconnect from the stream and stop background work.
    ///
    /// The socket loop sends a normal close frame, and every background
    /// task is joined before this returns -- no ingestion or state
    /// change happens afterwards.
    pub async fn disconnect(&self) {
        self.teardown_stream().await;
        let _ = self
            .inner
            .connection_state
            .send(ConnectionState::Disconnected);
        debug!("engine disconnected");
    }

    async fn teardown_stream(&self) {
        self.inner.stream_cancel.lock().await.cancel();

        if let Some(handle) = self.inner.stream.lock().await.take() {
            handle.shutdown();
        }

        let mut handles = self.inner.task_handles.lock().await;
        for handle in handles.drain(..) {
            let _ = handle.await;
        }
    }

    // ── Ingestion ────────────────────────────────────────────────────

    /// Apply one event: store it, then resolve any pending selection in
    /// the same synchronous step. Returns `true` if the event created a
    /// new site.
    ///
    /// This is the single ingestion path -- the stream bridge calls it
    /// for every decoded frame, and tests drive it directly.
    pub fn apply_event(&self, event: SiteEvent) -> bool {
        let site_id = event.site_id.clone();
        let created = self.inner.store.ingest(event);
        // Unconditional: a selection may go pending between the store
        // check and the ingest that creates the site.
        self.inner.session.resolve_pending(&site_id);
        created
    }

    // ── Selection and view state ─────────────────────────────────────

    /// Select a site, immediately if known, pending otherwise.
    pub fn select_site(&self, id: SiteId) -> SelectOutcome {
        self.inner.session.select(&self.inner.store, id, false)
    }

    pub fn clear_selection(&self) -> MutationOutcome {
        self.inner.session.clear_selection()
    }

    pub fn set_filters(&self, filters: ViewFilters) -> MutationOutcome {
        self.inner.session.set_filters(filters)
    }

    pub fn set_date_range(&self, range: DateRange) -> MutationOutcome {
        self.inner.session.set_date_range(range)
    }

    // ── Sharing guard ────────────────────────────────────────────────

    pub fn enter_shared(&self, kind: ShareKind) {
        self.inner.session.enter_shared(kind);
    }

    pub fn exit_shared(&self) {
        self.inner.session.exit_shared();
    }

    pub fn check_permission(&self, action: ShareAction) -> bool {
        self.inner.session.check_permission(action)
    }

    // ── State observation ────────────────────────────────────────────

    pub fn view_state(&self) -> ViewState {
        self.inner.session.view()
    }

    pub fn subscribe_view(&self) -> watch::Receiver<ViewState> {
        self.inner.session.subscribe_view()
    }

    pub fn sharing_mode(&self) -> SharingMode {
        self.inner.session.mode()
    }

    pub fn subscribe_mode(&self) -> watch::Receiver<SharingMode> {
        self.inner.session.subscribe_mode()
    }

    /// Subscribe to connection state changes. The receiver survives
    /// disconnect/reconnect cycles.
    pub fn connection_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.connection_state.subscribe()
    }

    // ── Snapshot accessors (delegate to SiteStore) ───────────────────

    pub fn site_snapshot(&self, id: &SiteId) -> Option<SiteSnapshot> {
        self.inner.store.site_snapshot(id)
    }

    pub fn sites_snapshot(&self) -> Vec<SiteSnapshot> {
        self.inner.store.sites_snapshot()
    }
}

// ── Background tasks ─────────────────────────────────────────────────

/// Feed decoded frames into the engine's ingestion path.
async fn bridge_task(
    engine: Engine,
    mut frames: broadcast::Receiver<Arc<MetricsFrame>>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            frame = frames.recv() => {
                match frame {
                    Ok(frame) => {
                        engine.apply_event(SiteEvent::from((*frame).clone()));
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "frame bridge lagged, dropping oldest frames");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }
    }
}

/// Mirror the stream's status watch into the engine-level watch, which
/// outlives individual connections.
async fn status_task(
    state_tx: watch::Sender<ConnectionState>,
    mut status: watch::Receiver<ConnectionState>,
    cancel: CancellationToken,
) {
    let _ = state_tx.send(status.borrow_and_update().clone());

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            changed = status.changed() => {
                if changed.is_err() {
                    break;
                }
                let _ = state_tx.send(status.borrow_and_update().clone());
            }
        }
    }
}

/// Periodically prune expired events, on a cadence independent of
/// ingestion rate.
async fn prune_task(
    store: Arc<SiteStore>,
    max_age: chrono::Duration,
    every: std::time::Duration,
    cancel: CancellationToken,
) {
    let mut interval = tokio::time::interval(every);
    interval.tick().await; // consume the immediate first tick

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = interval.tick() => {
                store.prune(max_age);
            }
        }
    }
}
