// ── Push alert client ──
//
// Wraps the connection supervisor: decodes raw push messages into
// `Alert`s and fans them out to subscribers in registration order.
// Subscribers attach and detach without touching connection state.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use alertdeck_api::Alert;
use alertdeck_api::websocket::{
    ConnectionState, ConnectionSupervisor, Connector, ReconnectConfig, SupervisorEvent,
    TungsteniteConnector,
};
use secrecy::SecretString;
use tokio::sync::{Mutex, broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, trace, warn};
use url::Url;

use crate::error::CoreError;

const LIFECYCLE_CHANNEL_SIZE: usize = 64;

/// Connection lifecycle as seen by the host, for status display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    Opened,
    Closed { code: u16, reason: String },
    TransportError { message: String },
    /// A push message could not be decoded and was dropped.
    DecodeFailed { message: String },
    ReconnectScheduled { attempt: u32, delay: Duration },
    /// Reconnect budget spent. Terminal until the next `connect()`.
    Exhausted { attempts: u32 },
}

impl StreamEvent {
    /// The delivery error this event reports, if any.
    pub fn error(&self) -> Option<CoreError> {
        match self {
            Self::TransportError { message } => Some(CoreError::Transport {
                message: message.clone(),
            }),
            Self::DecodeFailed { message } => Some(CoreError::Decode {
                message: message.clone(),
            }),
            Self::Exhausted { attempts } => Some(CoreError::ReconnectExhausted {
                attempts: *attempts,
            }),
            Self::Opened | Self::Closed { .. } | Self::ReconnectScheduled { .. } => None,
        }
    }
}

// ── Subscribers ──────────────────────────────────────────────────────

type Handler = Arc<dyn Fn(Arc<Alert>) + Send + Sync>;

#[derive(Default)]
struct Registry {
    next_id: AtomicU64,
    handlers: std::sync::Mutex<Vec<(u64, Handler)>>,
}

impl Registry {
    fn add(&self, handler: Handler) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.handlers
            .lock()
            .expect("subscriber lock poisoned")
            .push((id, handler));
        id
    }

    fn remove(&self, id: u64) -> bool {
        let mut handlers = self.handlers.lock().expect("subscriber lock poisoned");
        let before = handlers.len();
        handlers.retain(|(hid, _)| *hid != id);
        handlers.len() != before
    }

    /// Handlers in registration order, detached from the lock so a
    /// handler may (un)subscribe while being called.
    fn snapshot(&self) -> Vec<Handler> {
        self.handlers
            .lock()
            .expect("subscriber lock poisoned")
            .iter()
            .map(|(_, h)| Arc::clone(h))
            .collect()
    }

    fn len(&self) -> usize {
        self.handlers.lock().expect("subscriber lock poisoned").len()
    }
}

/// Handle returned by [`AlertStreamClient::subscribe`].
///
/// Dropping the handle does not unsubscribe; call
/// [`unsubscribe`](Self::unsubscribe).
pub struct Subscription {
    id: u64,
    registry: Weak<Registry>,
}

impl Subscription {
    /// Stop delivery to this handler. Calling it again is a no-op.
    pub fn unsubscribe(&self) {
        let Some(registry) = self.registry.upgrade() else {
            return;
        };
        if registry.remove(self.id) {
            debug!(subscription = self.id, "alert subscriber removed");
        }
    }
}

// ── Dispatcher slot ──────────────────────────────────────────────────

type EventRx = mpsc::UnboundedReceiver<SupervisorEvent>;

enum Dispatch {
    /// Not dispatching; the receiver waits for the next `connect()`.
    Parked(EventRx),
    /// The dispatcher task owns the receiver and hands it back on exit.
    Running {
        cancel: CancellationToken,
        task: JoinHandle<EventRx>,
    },
}

// ── AlertStreamClient ────────────────────────────────────────────────

/// Typed alert delivery over the push connection.
pub struct AlertStreamClient<C: Connector = TungsteniteConnector> {
    supervisor: ConnectionSupervisor<C>,
    registry: Arc<Registry>,
    lifecycle: broadcast::Sender<StreamEvent>,
    dispatch: Mutex<Option<Dispatch>>,
    shutdown: CancellationToken,
}

impl AlertStreamClient<TungsteniteConnector> {
    /// Create a client for `endpoint` over WebSocket. Does not connect.
    pub fn new(endpoint: Url, reconnect: ReconnectConfig) -> Self {
        Self::with_connector(endpoint, TungsteniteConnector, reconnect)
    }
}

impl<C: Connector> AlertStreamClient<C> {
    pub fn with_connector(endpoint: Url, connector: C, reconnect: ReconnectConfig) -> Self {
        let (supervisor, events) = ConnectionSupervisor::with_connector(endpoint, connector, reconnect);
        let (lifecycle, _) = broadcast::channel(LIFECYCLE_CHANNEL_SIZE);

        Self {
            supervisor,
            registry: Arc::new(Registry::default()),
            lifecycle,
            dispatch: Mutex::new(Some(Dispatch::Parked(events))),
            shutdown: CancellationToken::new(),
        }
    }

    // ── Connection ───────────────────────────────────────────────────

    /// Start (or restart) the push connection and alert dispatch.
    pub async fn connect(&self, token: &SecretString) -> Result<(), CoreError> {
        let mut dispatch = self.dispatch.lock().await;
        if dispatch.is_none() {
            return Err(CoreError::Internal("alert dispatcher is gone".into()));
        }

        self.supervisor.connect(token).await?;

        if let Some(Dispatch::Parked(events)) = dispatch.take() {
            let cancel = self.shutdown.child_token();
            let task = tokio::spawn(dispatch_task(
                events,
                Arc::clone(&self.registry),
                self.lifecycle.clone(),
                cancel.clone(),
            ));
            *dispatch = Some(Dispatch::Running { cancel, task });
        }
        Ok(())
    }

    /// Stop the connection. On return no handler will be called again
    /// until the next `connect()`.
    pub async fn disconnect(&self) {
        let mut dispatch = self.dispatch.lock().await;
        self.supervisor.disconnect().await;

        *dispatch = match dispatch.take() {
            Some(Dispatch::Running { cancel, task }) => {
                cancel.cancel();
                match task.await {
                    Ok(mut events) => {
                        let mut discarded = 0_usize;
                        while events.try_recv().is_ok() {
                            discarded += 1;
                        }
                        if discarded > 0 {
                            debug!(discarded, "discarded undelivered stream events");
                        }
                        Some(Dispatch::Parked(events))
                    }
                    Err(e) => {
                        error!(error = %e, "alert dispatcher failed");
                        None
                    }
                }
            }
            other => other,
        };
    }

    pub fn state(&self) -> ConnectionState {
        self.supervisor.state()
    }

    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.supervisor.watch_state()
    }

    /// Subscribe to lifecycle events.
    pub fn lifecycle(&self) -> broadcast::Receiver<StreamEvent> {
        self.lifecycle.subscribe()
    }

    // ── Subscribers ──────────────────────────────────────────────────

    /// Register `handler` for every decoded alert.
    pub fn subscribe<F>(&self, handler: F) -> Subscription
    where
        F: Fn(Arc<Alert>) + Send + Sync + 'static,
    {
        let id = self.registry.add(Arc::new(handler));
        debug!(subscription = id, "alert subscriber added");
        Subscription {
            id,
            registry: Arc::downgrade(&self.registry),
        }
    }

    /// Same as [`Subscription::unsubscribe`].
    pub fn unsubscribe(&self, subscription: &Subscription) {
        subscription.unsubscribe();
    }

    pub fn subscriber_count(&self) -> usize {
        self.registry.len()
    }
}

impl<C: Connector> Drop for AlertStreamClient<C> {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

// ── Dispatch ─────────────────────────────────────────────────────────

async fn dispatch_task(
    mut events: EventRx,
    registry: Arc<Registry>,
    lifecycle: broadcast::Sender<StreamEvent>,
    cancel: CancellationToken,
) -> EventRx {
    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            event = events.recv() => {
                let Some(event) = event else { break };
                handle_event(event, &registry, &lifecycle);
            }
        }
    }
    events
}

fn handle_event(
    event: SupervisorEvent,
    registry: &Registry,
    lifecycle: &broadcast::Sender<StreamEvent>,
) {
    let observed = match event {
        SupervisorEvent::Message(raw) => {
            deliver(&raw, registry, lifecycle);
            return;
        }
        SupervisorEvent::Open => StreamEvent::Opened,
        SupervisorEvent::Closed { code, reason } => StreamEvent::Closed { code, reason },
        SupervisorEvent::Error(e) => StreamEvent::TransportError {
            message: e.to_string(),
        },
        SupervisorEvent::ReconnectScheduled { attempt, delay } => {
            StreamEvent::ReconnectScheduled { attempt, delay }
        }
        SupervisorEvent::Exhausted { attempts } => StreamEvent::Exhausted { attempts },
    };
    // No receivers is fine.
    let _ = lifecycle.send(observed);
}

/// Decode one push payload and hand it to every subscriber.
fn deliver(raw: &str, registry: &Registry, lifecycle: &broadcast::Sender<StreamEvent>) {
    let alert = match serde_json::from_str::<Alert>(raw) {
        Ok(alert) => Arc::new(alert),
        Err(e) => {
            warn!(error = %e, len = raw.len(), "dropping undecodable push message");
            let _ = lifecycle.send(StreamEvent::DecodeFailed {
                message: e.to_string(),
            });
            return;
        }
    };

    let handlers = registry.snapshot();
    trace!(alert_id = alert.id, subscribers = handlers.len(), "dispatching alert");
    for handler in handlers {
        // A panicking subscriber must not take the dispatcher down with it.
        if catch_unwind(AssertUnwindSafe(|| handler(Arc::clone(&alert)))).is_err() {
            error!(alert_id = alert.id, "alert subscriber panicked");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    fn registry_with(log: &Arc<Mutex<Vec<String>>>, names: &[&'static str]) -> Arc<Registry> {
        let registry = Arc::new(Registry::default());
        for &name in names {
            let log = Arc::clone(log);
            registry.add(Arc::new(move |alert: Arc<Alert>| {
                log.lock().expect("log").push(format!("{name}:{}", alert.id));
            }));
        }
        registry
    }

    const RAW: &str = r#"{"id":5,"event_id":1,"severity":"critical","description":"Person detected","created_at":"2024-01-01T00:00:00Z","user_id":1}"#;

    #[test]
    fn delivery_follows_registration_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let registry = registry_with(&log, &["a", "b", "c"]);
        let (lifecycle, _) = broadcast::channel(4);

        deliver(RAW, &registry, &lifecycle);

        assert_eq!(*log.lock().expect("log"), vec!["a:5", "b:5", "c:5"]);
    }

    #[test]
    fn panicking_subscriber_does_not_stop_delivery() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let registry = registry_with(&log, &["a"]);
        registry.add(Arc::new(|_: Arc<Alert>| panic!("subscriber bug")));
        let tail = Arc::clone(&log);
        registry.add(Arc::new(move |alert: Arc<Alert>| {
            tail.lock().expect("log").push(format!("c:{}", alert.id));
        }));
        let (lifecycle, _) = broadcast::channel(4);

        deliver(RAW, &registry, &lifecycle);
        deliver(RAW, &registry, &lifecycle);

        assert_eq!(*log.lock().expect("log"), vec!["a:5", "c:5", "a:5", "c:5"]);
    }

    #[test]
    fn undecodable_message_is_reported_not_delivered() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let registry = registry_with(&log, &["a"]);
        let (lifecycle, mut rx) = broadcast::channel(4);

        deliver("{not json", &registry, &lifecycle);
        deliver(r#"{"id":"five"}"#, &registry, &lifecycle);

        assert!(log.lock().expect("log").is_empty());
        assert!(matches!(rx.try_recv(), Ok(StreamEvent::DecodeFailed { .. })));
        assert!(matches!(rx.try_recv(), Ok(StreamEvent::DecodeFailed { .. })));
    }

    #[test]
    fn failure_events_carry_their_error() {
        assert!(matches!(
            StreamEvent::Exhausted { attempts: 5 }.error(),
            Some(CoreError::ReconnectExhausted { attempts: 5 })
        ));
        let transport = StreamEvent::TransportError {
            message: "connection reset".into(),
        }
        .error()
        .expect("transport error");
        assert!(transport.is_transient());
        assert_eq!(StreamEvent::Opened.error().map(|e| e.to_string()), None);
    }

    #[test]
    fn unsubscribe_is_idempotent() {
        let registry = Arc::new(Registry::default());
        let id = registry.add(Arc::new(|_: Arc<Alert>| {}));
        let sub = Subscription {
            id,
            registry: Arc::downgrade(&registry),
        };

        sub.unsubscribe();
        assert_eq!(registry.len(), 0);
        sub.unsubscribe();
        assert_eq!(registry.len(), 0);
    }

    #[test]
    fn unsubscribe_after_registry_dropped() {
        let registry = Arc::new(Registry::default());
        let id = registry.add(Arc::new(|_: Arc<Alert>| {}));
        let sub = Subscription {
            id,
            registry: Arc::downgrade(&registry),
        };
        drop(registry);
        sub.unsubscribe();
    }
}
