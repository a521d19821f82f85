// alertdeck-api: Async Rust client for the alertdeck alert service (REST + push stream)

pub mod client;
pub mod error;
pub mod models;
pub mod transport;
pub mod websocket;

pub use client::{AccessToken, AlertClient};
pub use error::Error;
pub use models::{Alert, AlertId, AlertQuery, Event, NewEvent, Severity};
pub use transport::{TlsMode, TransportConfig};
