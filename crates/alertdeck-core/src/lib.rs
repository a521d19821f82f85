// alertdeck-core: Alert delivery layer between alertdeck-api and consumers (CLI).

pub mod auth;
pub mod config;
pub mod controller;
pub mod error;
pub mod events;
pub mod snapshot;
pub mod store;
pub mod stream;

// ── Primary re-exports ──────────────────────────────────────────────
pub use auth::{AuthProvider, PasswordAuth, Session, StaticToken, sign_in};
pub use config::{AuthCredentials, DashboardConfig, TlsVerification};
pub use controller::{ControllerOptions, DashboardController, SessionState};
pub use error::CoreError;
pub use events::submit_event;
pub use snapshot::{HttpSnapshotFetcher, SnapshotFetcher};
pub use store::{AlertReconciler, AlertView, Ingest, IngestSummary};
pub use stream::{
    AlertFilter, AlertStreamClient, AlertViewStream, AlertWatchStream, StreamEvent, Subscription,
};

// Wire types consumers need without depending on alertdeck-api directly.
pub use alertdeck_api::websocket::{ConnectionState, ReconnectConfig};
pub use alertdeck_api::{Alert, AlertId, AlertQuery, Event, NewEvent, Severity};
