//! Push connection supervisor with bounded auto-reconnect.
//!
//! [`ConnectionSupervisor`] owns one logical connection to the service's
//! `/ws/alerts` endpoint. A single background task drives the state
//! machine: connect, read frames until the transport drops, wait out a
//! linear backoff, try again. Lifecycle and raw messages are emitted in
//! order on one [`mpsc`] channel, so consumers never observe two callbacks
//! for the same connection concurrently.
//!
//! The transport is pluggable through [`Connector`]. Production code uses
//! [`TungsteniteConnector`]; tests script connections in memory.
//!
//! # Example
//!
//! ```rust,ignore
//! use alertdeck_api::websocket::{ConnectionSupervisor, ReconnectConfig, SupervisorEvent};
//!
//! let endpoint = Url::parse("ws://localhost:7001/ws/alerts")?;
//! let (supervisor, mut events) = ConnectionSupervisor::new(endpoint, ReconnectConfig::default());
//! supervisor.connect(&token).await?;
//!
//! while let Some(event) = events.recv().await {
//!     if let SupervisorEvent::Message(raw) = event {
//!         println!("{raw}");
//!     }
//! }
//! ```

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{Stream, StreamExt};
use secrecy::{ExposeSecret, SecretString};
use tokio::sync::{Mutex, mpsc, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};
use url::Url;

use crate::error::Error;

/// Close reason recorded when the caller stops the supervisor.
pub const MANUAL_CLOSE_REASON: &str = "manual";

/// Close code reported when the transport drops without a close frame.
pub const ABNORMAL_CLOSE_CODE: u16 = 1006;

/// Close code reported for a close frame with no payload.
const NO_STATUS_CODE: u16 = 1005;

const STREAM_PATH: &str = "ws/alerts";

// ── ReconnectConfig ──────────────────────────────────────────────────

/// Linear backoff configuration for push reconnection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectConfig {
    /// Unit delay. Connection attempt `n` of a failure streak waits
    /// `base_delay * n`. Default: 1s.
    pub base_delay: Duration,

    /// Consecutive failures tolerated before giving up. Default: 5.
    pub max_attempts: u32,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(1),
            max_attempts: 5,
        }
    }
}

// ── Backoff ──────────────────────────────────────────────────────────

/// Consecutive-failure bookkeeping for one supervisor run.
///
/// The initial connection is attempt 1. After `n` consecutive failures the
/// next attempt is number `n + 1` and is delayed by `base_delay * (n + 1)`.
/// A successful open resets the streak.
#[derive(Debug, Clone)]
pub struct Backoff {
    config: ReconnectConfig,
    failures: u32,
}

impl Backoff {
    pub fn new(config: ReconnectConfig) -> Self {
        Self {
            config,
            failures: 0,
        }
    }

    /// Consecutive failures since the last successful open.
    pub fn failures(&self) -> u32 {
        self.failures
    }

    /// Ordinal of the next connection attempt within the current streak.
    pub fn next_attempt(&self) -> u32 {
        self.failures.saturating_add(1)
    }

    /// The transport opened; start a fresh streak.
    pub fn reset(&mut self) {
        self.failures = 0;
    }

    /// Record an unexpected close.
    ///
    /// Returns the delay before the next attempt, or `None` once
    /// `max_attempts` consecutive failures have been recorded.
    pub fn record_failure(&mut self) -> Option<Duration> {
        self.failures = self.failures.saturating_add(1);
        if self.failures >= self.config.max_attempts {
            return None;
        }
        Some(self.config.base_delay.saturating_mul(self.next_attempt()))
    }
}

// ── ConnectionState ──────────────────────────────────────────────────

/// Observable state of the push connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    /// Constructed, never connected.
    Idle,
    /// A transport is being opened. `attempt` counts within the current
    /// failure streak, starting at 1.
    Connecting { attempt: u32 },
    Open,
    /// The caller asked for teardown and the transport is being released.
    Closing,
    /// The transport is gone. Unless `reason` is [`MANUAL_CLOSE_REASON`], a
    /// reconnect is pending.
    Closed { reason: String },
    /// Reconnect budget exhausted. Terminal until the next `connect()`.
    Failed,
}

impl ConnectionState {
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Open)
    }

    pub fn is_manual_close(&self) -> bool {
        matches!(self, Self::Closed { reason } if reason == MANUAL_CLOSE_REASON)
    }
}

// ── Events ───────────────────────────────────────────────────────────

/// Everything the supervisor reports, in transport order.
#[derive(Debug)]
pub enum SupervisorEvent {
    /// A transport opened.
    Open,
    /// A raw text frame, undecoded.
    Message(String),
    /// The transport closed without the caller asking for it.
    Closed { code: u16, reason: String },
    /// A connection attempt or read failed. Followed by `Closed`.
    Error(Error),
    /// A reconnect timer was armed.
    ReconnectScheduled { attempt: u32, delay: Duration },
    /// The budget is spent; no further attempts will be made.
    Exhausted { attempts: u32 },
}

// ── Connector ────────────────────────────────────────────────────────

/// A frame read from the push transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    Text(String),
    Close { code: u16, reason: String },
}

/// Inbound half of an open push transport.
pub type InboundStream = Pin<Box<dyn Stream<Item = Result<Inbound, Error>> + Send>>;

/// Opens push transports. Dropping the returned stream releases the
/// transport.
pub trait Connector: Send + Sync + 'static {
    fn open(&self, url: &Url) -> impl Future<Output = Result<InboundStream, Error>> + Send;
}

/// WebSocket transport backed by `tokio-tungstenite`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TungsteniteConnector;

impl Connector for TungsteniteConnector {
    async fn open(&self, url: &Url) -> Result<InboundStream, Error> {
        let (ws_stream, _response) = tokio_tungstenite::connect_async(url.as_str())
            .await
            .map_err(|e| Error::WebSocketConnect(e.to_string()))?;

        // The service never expects client frames; tungstenite answers
        // pings from the read side.
        let (_write, read) = ws_stream.split();

        let frames = read.filter_map(|frame| async move {
            match frame {
                Ok(tungstenite::Message::Text(text)) => {
                    Some(Ok(Inbound::Text(text.as_str().to_owned())))
                }
                Ok(tungstenite::Message::Close(frame)) => Some(Ok(match frame {
                    Some(cf) => Inbound::Close {
                        code: cf.code.into(),
                        reason: cf.reason.as_str().to_owned(),
                    },
                    None => Inbound::Close {
                        code: NO_STATUS_CODE,
                        reason: String::new(),
                    },
                })),
                Ok(tungstenite::Message::Ping(_)) => {
                    trace!("WebSocket ping");
                    None
                }
                // Binary, Pong, Frame -- ignore
                Ok(_) => None,
                Err(e) => Some(Err(Error::WebSocketConnect(e.to_string()))),
            }
        });

        Ok(Box::pin(frames))
    }
}

// ── URL helpers ──────────────────────────────────────────────────────

/// Derive the push endpoint from the REST base URL:
/// `http(s)://host/prefix` becomes `ws(s)://host/prefix/ws/alerts`.
pub fn stream_endpoint(api_base: &Url) -> Result<Url, Error> {
    let scheme = match api_base.scheme() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        other => {
            return Err(Error::WebSocketConnect(format!(
                "unsupported scheme for push endpoint: {other}"
            )));
        }
    };

    let mut url = api_base.clone();
    url.set_scheme(scheme)
        .map_err(|()| Error::WebSocketConnect(format!("cannot use {scheme} for {api_base}")))?;
    let path = format!("{}/{STREAM_PATH}", api_base.path().trim_end_matches('/'));
    url.set_path(&path);
    url.set_query(None);
    url.set_fragment(None);
    Ok(url)
}

/// Attach the token as the `token` query parameter, replacing any
/// existing one.
fn authorized_url(endpoint: &Url, token: &str) -> Url {
    let mut url = endpoint.clone();
    let kept: Vec<(String, String)> = endpoint
        .query_pairs()
        .filter(|(k, _)| k != "token")
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    url.query_pairs_mut()
        .clear()
        .extend_pairs(kept)
        .append_pair("token", token);
    url
}

// ── ConnectionSupervisor ─────────────────────────────────────────────

/// Owns the single push transport and its reconnect timer.
///
/// Explicitly constructed and owned: two supervisors in one process are
/// fully independent.
pub struct ConnectionSupervisor<C: Connector = TungsteniteConnector> {
    endpoint: Url,
    connector: Arc<C>,
    reconnect: ReconnectConfig,
    link: Link,
    active: Mutex<Option<ActiveRun>>,
    shutdown: CancellationToken,
}

/// The one background task currently driving a connection.
struct ActiveRun {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl ActiveRun {
    /// Cancel and wait until the task (and with it the transport and any
    /// pending timer) is gone.
    async fn stop(self) {
        self.cancel.cancel();
        if let Err(e) = self.task.await {
            if e.is_panic() {
                error!(error = %e, "push supervisor task panicked");
            }
        }
    }
}

impl ConnectionSupervisor<TungsteniteConnector> {
    /// Create a supervisor for `endpoint` using the WebSocket transport.
    ///
    /// Returns the supervisor and the receiving end of its event channel.
    pub fn new(
        endpoint: Url,
        reconnect: ReconnectConfig,
    ) -> (Self, mpsc::UnboundedReceiver<SupervisorEvent>) {
        Self::with_connector(endpoint, TungsteniteConnector, reconnect)
    }
}

impl<C: Connector> ConnectionSupervisor<C> {
    /// Create a supervisor with a custom transport.
    pub fn with_connector(
        endpoint: Url,
        connector: C,
        reconnect: ReconnectConfig,
    ) -> (Self, mpsc::UnboundedReceiver<SupervisorEvent>) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (state, _) = watch::channel(ConnectionState::Idle);

        let supervisor = Self {
            endpoint,
            connector: Arc::new(connector),
            reconnect,
            link: Link {
                state: Arc::new(state),
                events: events_tx,
            },
            active: Mutex::new(None),
            shutdown: CancellationToken::new(),
        };
        (supervisor, events_rx)
    }

    /// The push endpoint, without credentials.
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        self.link.state.borrow().clone()
    }

    /// Subscribe to connection state changes.
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.link.state.subscribe()
    }

    /// Begin connecting with `token`.
    ///
    /// Any existing transport and pending reconnect timer are torn down
    /// before the new attempt starts. Returns as soon as the background
    /// task is spawned; progress is reported through events and state.
    pub async fn connect(&self, token: &SecretString) -> Result<(), Error> {
        let token = token.expose_secret().trim();
        if token.is_empty() {
            return Err(Error::InvalidCredential);
        }

        let mut active = self.active.lock().await;
        if let Some(previous) = active.take() {
            debug!("replacing existing push connection");
            self.link.set_state(ConnectionState::Closing);
            previous.stop().await;
        }

        let url = authorized_url(&self.endpoint, token);
        let cancel = self.shutdown.child_token();
        self.link.set_state(ConnectionState::Connecting { attempt: 1 });

        let task = tokio::spawn(supervise(
            Arc::clone(&self.connector),
            url,
            self.endpoint.clone(),
            self.reconnect.clone(),
            self.link.clone(),
            cancel.clone(),
        ));

        *active = Some(ActiveRun { cancel, task });
        Ok(())
    }

    /// Stop the connection and suppress reconnects.
    ///
    /// Safe from any state. On return the transport and timer are released
    /// and no further events will be produced until the next `connect()`.
    pub async fn disconnect(&self) {
        let mut active = self.active.lock().await;
        if let Some(previous) = active.take() {
            self.link.set_state(ConnectionState::Closing);
            previous.stop().await;
            info!("push connection closed by caller");
        }
        self.link.set_state(ConnectionState::Closed {
            reason: MANUAL_CLOSE_REASON.into(),
        });
    }
}

impl<C: Connector> Drop for ConnectionSupervisor<C> {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

// ── Background supervision loop ──────────────────────────────────────

/// Shared sinks for state and events.
#[derive(Clone)]
struct Link {
    state: Arc<watch::Sender<ConnectionState>>,
    events: mpsc::UnboundedSender<SupervisorEvent>,
}

impl Link {
    fn set_state(&self, state: ConnectionState) {
        self.state.send_replace(state);
    }

    fn emit(&self, event: SupervisorEvent) {
        // Ignore send errors -- the consumer went away.
        let _ = self.events.send(event);
    }
}

/// Main loop: connect → read → on close, backoff → reconnect.
async fn supervise<C: Connector>(
    connector: Arc<C>,
    url: Url,
    endpoint: Url,
    reconnect: ReconnectConfig,
    link: Link,
    cancel: CancellationToken,
) {
    let mut backoff = Backoff::new(reconnect);

    loop {
        link.set_state(ConnectionState::Connecting {
            attempt: backoff.next_attempt(),
        });
        debug!(endpoint = %endpoint, attempt = backoff.next_attempt(), "connecting push stream");

        let (code, reason) = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            closed = run_connection(connector.as_ref(), &url, &link, &mut backoff) => closed,
        };

        link.set_state(ConnectionState::Closed {
            reason: reason.clone(),
        });
        link.emit(SupervisorEvent::Closed { code, reason });

        let Some(delay) = backoff.record_failure() else {
            let attempts = backoff.failures();
            error!(attempts, "push reconnection limit reached, giving up");
            link.set_state(ConnectionState::Failed);
            link.emit(SupervisorEvent::Exhausted { attempts });
            break;
        };

        let attempt = backoff.next_attempt();
        info!(
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            attempt,
            "waiting before reconnect"
        );
        link.emit(SupervisorEvent::ReconnectScheduled { attempt, delay });

        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            () = tokio::time::sleep(delay) => {}
        }
    }

    debug!("push supervisor exiting");
}

/// Open one transport and pump frames until it closes.
///
/// Returns the close code and reason.
async fn run_connection<C: Connector>(
    connector: &C,
    url: &Url,
    link: &Link,
    backoff: &mut Backoff,
) -> (u16, String) {
    let mut frames = match connector.open(url).await {
        Ok(frames) => frames,
        Err(e) => {
            warn!(error = %e, attempt = backoff.next_attempt(), "push connection failed");
            let reason = e.to_string();
            link.emit(SupervisorEvent::Error(e));
            return (ABNORMAL_CLOSE_CODE, reason);
        }
    };

    backoff.reset();
    link.set_state(ConnectionState::Open);
    link.emit(SupervisorEvent::Open);
    info!("push stream connected");

    while let Some(frame) = frames.next().await {
        match frame {
            Ok(Inbound::Text(raw)) => {
                trace!(len = raw.len(), "push message");
                link.emit(SupervisorEvent::Message(raw));
            }
            Ok(Inbound::Close { code, reason }) => {
                info!(code, reason = %reason, "push close frame received");
                return (code, reason);
            }
            Err(e) => {
                warn!(error = %e, "push stream error");
                let reason = e.to_string();
                link.emit(SupervisorEvent::Error(e));
                return (ABNORMAL_CLOSE_CODE, reason);
            }
        }
    }

    info!("push stream ended");
    (ABNORMAL_CLOSE_CODE, "stream ended".into())
}

// ── Tests ────────────────────────────────────────────────────────────
