// ── Dashboard controller ──
//
// Lifecycle owner for one dashboard session: wires the push stream into
// the reconciler, loads the initial snapshot, polls for missed alerts, and
// tears everything down on unmount or when the service rejects the
// session's credentials.

use std::num::NonZeroU32;
use std::sync::{Arc, Weak};
use std::time::Duration;

use alertdeck_api::websocket::{ConnectionState, Connector, TungsteniteConnector};
use alertdeck_api::{Alert, AlertQuery};
use secrecy::SecretString;
use tokio::sync::{Mutex, broadcast, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::auth::Session;
use crate::config::{DEFAULT_PAGE_SIZE, DashboardConfig};
use crate::error::CoreError;
use crate::snapshot::{HttpSnapshotFetcher, SnapshotFetcher};
use crate::store::{AlertReconciler, AlertView, IngestSummary};
use crate::stream::{AlertFilter, AlertStreamClient, AlertViewStream, StreamEvent, Subscription};

// ── SessionState ─────────────────────────────────────────────────

/// Dashboard session state observable by the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Unmounted,
    /// Mounting: stream starting, initial snapshot in flight.
    Loading,
    Live,
    /// The service rejected the session's credentials. Everything has
    /// been stopped; mount again with a fresh token.
    Expired { message: String },
}

// ── ControllerOptions ────────────────────────────────────────────

/// Delivery tuning for a [`DashboardController`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerOptions {
    /// Snapshot poll cadence. Zero disables polling.
    pub poll_interval: Duration,
    pub page_size: NonZeroU32,
    pub stream_enabled: bool,
}

impl Default for ControllerOptions {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            page_size: DEFAULT_PAGE_SIZE,
            stream_enabled: true,
        }
    }
}

// ── DashboardController ──────────────────────────────────────────

/// Owns the stream, the poller and the reconciled view for one session.
///
/// Cheaply cloneable via `Arc`.
pub struct DashboardController<
    C: Connector = TungsteniteConnector,
    F: SnapshotFetcher = HttpSnapshotFetcher,
> {
    inner: Arc<ControllerInner<C, F>>,
}

impl<C: Connector, F: SnapshotFetcher> Clone for DashboardController<C, F> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct ControllerInner<C: Connector, F: SnapshotFetcher> {
    options: ControllerOptions,
    stream: AlertStreamClient<C>,
    fetcher: F,
    reconciler: Arc<AlertReconciler>,
    session: watch::Sender<SessionState>,
    mounted: Mutex<Option<Mounted>>,
}

/// Everything `unmount()` has to undo.
struct Mounted {
    cancel: CancellationToken,
    subscription: Subscription,
    tasks: Vec<JoinHandle<()>>,
}

impl DashboardController {
    /// Production wiring: WebSocket push stream plus HTTP snapshots using
    /// the session's authenticated client.
    pub fn from_session(config: &DashboardConfig, session: &Session) -> Result<Self, CoreError> {
        let stream = AlertStreamClient::new(config.stream_endpoint()?, config.reconnect.clone());
        let fetcher = HttpSnapshotFetcher::new(Arc::clone(&session.client));
        Ok(Self::new(config.controller_options(), stream, fetcher))
    }
}

impl<C: Connector, F: SnapshotFetcher> DashboardController<C, F> {
    /// Assemble a controller. Does NOT connect -- call
    /// [`mount()`](Self::mount).
    pub fn new(options: ControllerOptions, stream: AlertStreamClient<C>, fetcher: F) -> Self {
        let (session, _) = watch::channel(SessionState::Unmounted);
        Self {
            inner: Arc::new(ControllerInner {
                options,
                stream,
                fetcher,
                reconciler: Arc::new(AlertReconciler::new()),
                session,
                mounted: Mutex::new(None),
            }),
        }
    }

    pub fn options(&self) -> &ControllerOptions {
        &self.inner.options
    }

    // ── Lifecycle ────────────────────────────────────────────────

    /// Start the dashboard.
    ///
    /// Subscribes the reconciler to the push stream, connects it, loads
    /// the first snapshot and starts the poller. A no-op when already
    /// mounted.
    pub async fn mount(&self, token: &SecretString) -> Result<(), CoreError> {
        let mut slot = self.inner.mounted.lock().await;
        if slot.is_some() {
            debug!("dashboard already mounted");
            return Ok(());
        }
        self.set_session(SessionState::Loading);

        let reconciler = Arc::clone(&self.inner.reconciler);
        let subscription = self.inner.stream.subscribe(move |alert| {
            reconciler.ingest_push(alert);
        });
        let mut mounted = Mounted {
            cancel: CancellationToken::new(),
            subscription,
            tasks: Vec::new(),
        };

        if self.inner.options.stream_enabled {
            if let Err(e) = self.inner.stream.connect(token).await {
                self.inner.teardown(mounted, true).await;
                self.set_session(SessionState::Unmounted);
                return Err(e);
            }
        }

        let polling = !self.inner.options.poll_interval.is_zero();
        match self.inner.load_snapshot().await {
            Ok(summary) => debug!(inserted = summary.inserted, "initial snapshot loaded"),
            Err(e) if e.is_auth() => {
                self.inner.teardown(mounted, true).await;
                self.set_session(SessionState::Expired {
                    message: e.to_string(),
                });
                return Err(e);
            }
            Err(e) if polling => warn!(error = %e, "initial snapshot failed, retrying on next poll"),
            Err(e) => {
                self.inner.teardown(mounted, true).await;
                self.set_session(SessionState::Unmounted);
                return Err(e);
            }
        }

        if polling {
            let inner = Arc::downgrade(&self.inner);
            let interval = self.inner.options.poll_interval;
            let cancel = mounted.cancel.clone();
            mounted
                .tasks
                .push(tokio::spawn(poll_task(inner, interval, cancel)));
        }

        *slot = Some(mounted);
        self.set_session(SessionState::Live);
        info!(
            stream = self.inner.options.stream_enabled,
            poll_secs = self.inner.options.poll_interval.as_secs(),
            "dashboard mounted"
        );
        Ok(())
    }

    /// Stop the stream and the poller and detach from the reconciler.
    ///
    /// Safe to call repeatedly. On return no background work remains.
    pub async fn unmount(&self) {
        // Release the slot before joining: the poller may be waiting on it.
        let mounted = self.inner.mounted.lock().await.take();
        if let Some(mounted) = mounted {
            self.inner.teardown(mounted, true).await;
            info!("dashboard unmounted");
        }
        self.set_session(SessionState::Unmounted);
    }

    /// Pull one snapshot now and merge it.
    pub async fn refresh(&self) -> Result<IngestSummary, CoreError> {
        if self.inner.mounted.lock().await.is_none() {
            return Err(CoreError::NotConnected);
        }
        match self.inner.load_snapshot().await {
            Err(e) if e.is_auth() => {
                self.expire(&e).await;
                Err(e)
            }
            other => other,
        }
    }

    /// End the session after a credential rejection. Does not join the
    /// background tasks, since the caller may be one of them.
    async fn expire(&self, err: &CoreError) {
        let mounted = self.inner.mounted.lock().await.take();
        let Some(mounted) = mounted else { return };

        warn!(error = %err, "session rejected by service, stopping dashboard");
        self.inner.teardown(mounted, false).await;
        self.set_session(SessionState::Expired {
            message: err.to_string(),
        });
    }

    fn set_session(&self, state: SessionState) {
        self.inner.session.send_replace(state);
    }

    // ── Observation ──────────────────────────────────────────────

    pub fn reconciler(&self) -> &Arc<AlertReconciler> {
        &self.inner.reconciler
    }

    pub fn view(&self) -> AlertView {
        self.inner.reconciler.view()
    }

    pub fn filtered(&self, filter: AlertFilter) -> Vec<Arc<Alert>> {
        self.inner.reconciler.filtered(filter)
    }

    pub fn subscribe_view(&self) -> AlertViewStream {
        self.inner.reconciler.subscribe()
    }

    pub fn session_state(&self) -> SessionState {
        self.inner.session.borrow().clone()
    }

    pub fn watch_session(&self) -> watch::Receiver<SessionState> {
        self.inner.session.subscribe()
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.inner.stream.state()
    }

    pub fn watch_connection(&self) -> watch::Receiver<ConnectionState> {
        self.inner.stream.watch_state()
    }

    pub fn stream_events(&self) -> broadcast::Receiver<StreamEvent> {
        self.inner.stream.lifecycle()
    }
}

impl<C: Connector, F: SnapshotFetcher> ControllerInner<C, F> {
    async fn load_snapshot(&self) -> Result<IngestSummary, CoreError> {
        let query = AlertQuery {
            limit: Some(self.options.page_size),
            ..AlertQuery::default()
        };
        let alerts = self.fetcher.fetch(&query).await?;
        Ok(self.reconciler.ingest_snapshot(alerts))
    }

    async fn teardown(&self, mounted: Mounted, join: bool) {
        mounted.cancel.cancel();
        mounted.subscription.unsubscribe();
        self.stream.disconnect().await;

        if join {
            for handle in mounted.tasks {
                if let Err(e) = handle.await {
                    if e.is_panic() {
                        error!(error = %e, "dashboard poller panicked");
                    }
                }
            }
        }
    }
}

impl<C: Connector, F: SnapshotFetcher> Drop for ControllerInner<C, F> {
    /// Dropped while still mounted: stop the poller. The stream client's
    /// own drop releases the push transport.
    fn drop(&mut self) {
        if let Some(mounted) = self.mounted.get_mut().take() {
            mounted.cancel.cancel();
            mounted.subscription.unsubscribe();
            debug!("dashboard dropped without unmount");
        }
    }
}

// ── Background tasks ─────────────────────────────────────────────

/// Periodically pull a snapshot so alerts missed while the stream was
/// down show up within one interval.
///
/// Holds the controller weakly; exits once the last handle is gone.
async fn poll_task<C: Connector, F: SnapshotFetcher>(
    weak: Weak<ControllerInner<C, F>>,
    interval: Duration,
    cancel: CancellationToken,
) {
    let mut interval = tokio::time::interval(interval);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    interval.tick().await; // consume the immediate first tick

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = interval.tick() => {}
        }

        let Some(inner) = weak.upgrade() else { break };
        let controller = DashboardController { inner };
        let result = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            result = controller.inner.load_snapshot() => result,
        };

        match result {
            Ok(summary) if summary.changed_view() => {
                debug!(inserted = summary.inserted, replaced = summary.replaced, "poll merged alerts");
            }
            Ok(_) => {}
            Err(e) if e.is_auth() => {
                controller.expire(&e).await;
                break;
            }
            Err(e) => warn!(error = %e, "snapshot poll failed"),
        }
    }
}
