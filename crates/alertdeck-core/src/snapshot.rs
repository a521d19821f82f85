// ── Snapshot pulls ──
//
// A `SnapshotFetcher` performs exactly one `GET /alerts/` per call. It
// never retries; cadence belongs to the caller (the dashboard's poller).

use std::future::Future;
use std::sync::Arc;

use alertdeck_api::{Alert, AlertClient, AlertQuery};
use tracing::debug;

use crate::error::CoreError;

/// One-shot pull of the current alert set.
///
/// Credential rejections surface as [`CoreError::Auth`]; every other
/// failure is [`CoreError::Network`] or [`CoreError::Decode`].
pub trait SnapshotFetcher: Send + Sync + 'static {
    fn fetch(&self, query: &AlertQuery)
    -> impl Future<Output = Result<Vec<Alert>, CoreError>> + Send;
}

/// Pulls snapshots over HTTP with an authenticated [`AlertClient`].
#[derive(Clone)]
pub struct HttpSnapshotFetcher {
    client: Arc<AlertClient>,
}

impl HttpSnapshotFetcher {
    pub fn new(client: Arc<AlertClient>) -> Self {
        Self { client }
    }
}

impl SnapshotFetcher for HttpSnapshotFetcher {
    async fn fetch(&self, query: &AlertQuery) -> Result<Vec<Alert>, CoreError> {
        let alerts = self.client.list_alerts(query).await?;
        debug!(count = alerts.len(), "snapshot fetched");
        Ok(alerts)
    }
}
