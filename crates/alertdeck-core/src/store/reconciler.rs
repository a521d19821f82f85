// ── Alert reconciler ──
//
// Merges push-delivered alerts and pull-fetched snapshots into one
// ordered, de-duplicated view. Mutation and publication happen under one
// lock so subscribers always see views in mutation order.

use std::cmp::Reverse;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use alertdeck_api::{Alert, AlertId};
use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tracing::{debug, trace};

use crate::stream::{AlertFilter, AlertViewStream};

/// Newest-first, at most one entry per id.
pub type AlertView = Arc<Vec<Arc<Alert>>>;

/// `created_at` descending, then `id` descending.
type OrderKey = (Reverse<DateTime<Utc>>, Reverse<AlertId>);

fn order_key(alert: &Alert) -> OrderKey {
    (Reverse(alert.created_at), Reverse(alert.id))
}

/// Outcome of merging one alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ingest {
    /// New id.
    Inserted,
    /// Known id, incoming record is not older and differs.
    Replaced,
    /// Known id, identical record.
    Unchanged,
    /// Known id, incoming record is older. Dropped.
    Stale,
}

impl Ingest {
    pub fn changed_view(self) -> bool {
        matches!(self, Self::Inserted | Self::Replaced)
    }
}

/// Per-outcome counts for a snapshot merge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestSummary {
    pub inserted: usize,
    pub replaced: usize,
    pub unchanged: usize,
    pub stale: usize,
}

impl IngestSummary {
    fn record(&mut self, outcome: Ingest) {
        match outcome {
            Ingest::Inserted => self.inserted += 1,
            Ingest::Replaced => self.replaced += 1,
            Ingest::Unchanged => self.unchanged += 1,
            Ingest::Stale => self.stale += 1,
        }
    }

    pub fn changed_view(&self) -> bool {
        self.inserted + self.replaced > 0
    }
}

#[derive(Default)]
struct Entries {
    by_id: HashMap<AlertId, Arc<Alert>>,
    ordered: BTreeMap<OrderKey, Arc<Alert>>,
}

impl Entries {
    /// Insert or replace unless the incoming record is older.
    fn merge(&mut self, incoming: Arc<Alert>) -> Ingest {
        let outcome = match self.by_id.get(&incoming.id) {
            None => Ingest::Inserted,
            Some(existing) if incoming.created_at < existing.created_at => return Ingest::Stale,
            Some(existing) if **existing == *incoming => return Ingest::Unchanged,
            Some(existing) => {
                self.ordered.remove(&order_key(existing));
                Ingest::Replaced
            }
        };

        self.ordered.insert(order_key(&incoming), Arc::clone(&incoming));
        self.by_id.insert(incoming.id, incoming);
        outcome
    }

    fn to_view(&self) -> AlertView {
        Arc::new(self.ordered.values().cloned().collect())
    }
}

/// The single writer of the dashboard's alert view.
///
/// Append/replace only: alerts absent from a later snapshot stay in the
/// view for the life of the reconciler.
pub struct AlertReconciler {
    entries: Mutex<Entries>,
    view: watch::Sender<AlertView>,
}

impl AlertReconciler {
    pub fn new() -> Self {
        let (view, _) = watch::channel(Arc::new(Vec::new()));
        Self {
            entries: Mutex::new(Entries::default()),
            view,
        }
    }

    /// Merge one push-delivered alert.
    pub fn ingest_push(&self, alert: Arc<Alert>) -> Ingest {
        let mut entries = self.entries.lock().expect("reconciler lock poisoned");
        let id = alert.id;
        let outcome = entries.merge(alert);

        match outcome {
            Ingest::Inserted | Ingest::Replaced => {
                self.view.send_replace(entries.to_view());
                debug!(alert_id = id, ?outcome, "push alert merged");
            }
            Ingest::Stale => debug!(alert_id = id, "stale push alert ignored"),
            Ingest::Unchanged => trace!(alert_id = id, "duplicate push alert"),
        }
        outcome
    }

    /// Merge a snapshot page item by item. Publishes at most once.
    pub fn ingest_snapshot<I>(&self, alerts: I) -> IngestSummary
    where
        I: IntoIterator<Item = Alert>,
    {
        let mut entries = self.entries.lock().expect("reconciler lock poisoned");
        let mut summary = IngestSummary::default();
        for alert in alerts {
            summary.record(entries.merge(Arc::new(alert)));
        }

        if summary.changed_view() {
            self.view.send_replace(entries.to_view());
        }
        debug!(
            inserted = summary.inserted,
            replaced = summary.replaced,
            stale = summary.stale,
            total = entries.by_id.len(),
            "snapshot merged"
        );
        summary
    }

    /// Current view. Pure read.
    pub fn view(&self) -> AlertView {
        self.view.borrow().clone()
    }

    /// The current view projected through `filter`.
    pub fn filtered(&self, filter: AlertFilter) -> Vec<Arc<Alert>> {
        filter.apply(&self.view())
    }

    /// Subscribe to view changes.
    pub fn subscribe(&self) -> AlertViewStream {
        AlertViewStream::new(self.view.subscribe())
    }

    pub fn get(&self, id: AlertId) -> Option<Arc<Alert>> {
        self.entries
            .lock()
            .expect("reconciler lock poisoned")
            .by_id
            .get(&id)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.view.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for AlertReconciler {
    fn default() -> Self {
        Self::new()
    }
}
