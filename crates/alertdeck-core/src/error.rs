// ── Core error types ──
//
// Delivery-level errors from alertdeck-core. Consumers never see HTTP
// response bodies or tungstenite errors directly. The
// `From<alertdeck_api::Error>` impl sorts transport-layer failures into
// the categories the dashboard reacts to: credential problems end the
// session, everything else is retried on the next tick or reconnect.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Credentials ──────────────────────────────────────────────────
    #[error("Invalid credential: token must not be empty")]
    InvalidCredential,

    /// The service rejected our credentials. Ends the session.
    #[error("Authentication failed: {message}")]
    Auth { message: String },

    // ── Push stream ──────────────────────────────────────────────────
    #[error("Stream transport error: {message}")]
    Transport { message: String },

    #[error("Alert stream gave up after {attempts} consecutive failures -- reconnect manually")]
    ReconnectExhausted { attempts: u32 },

    // ── Pull / data ──────────────────────────────────────────────────
    /// A pull request failed for a reason other than credentials.
    #[error("Network error: {message}")]
    Network {
        message: String,
        /// HTTP status code, when the service answered at all.
        status: Option<u16>,
    },

    /// A pull request ran past the configured timeout.
    #[error("Request timed out: {message}")]
    Timeout { message: String },

    #[error("Could not decode alert payload: {message}")]
    Decode { message: String },

    // ── Caller errors ────────────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Validation failed: {message}")]
    Validation { message: String },

    #[error("Dashboard is not mounted")]
    NotConnected,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Credential failure that should end the session.
    pub fn is_auth(&self) -> bool {
        matches!(self, Self::Auth { .. } | Self::InvalidCredential)
    }

    /// Worth trying again on the next poll tick or reconnect.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Network { .. } | Self::Transport { .. } | Self::Timeout { .. }
        )
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<alertdeck_api::Error> for CoreError {
    fn from(err: alertdeck_api::Error) -> Self {
        use alertdeck_api::Error as Api;

        match err {
            Api::InvalidCredential => CoreError::InvalidCredential,
            Api::Authentication { status, message } => CoreError::Auth {
                message: format!("{message} (HTTP {status})"),
            },
            Api::Transport(e) if e.is_timeout() => CoreError::Timeout {
                message: e.to_string(),
            },
            Api::Transport(e) => CoreError::Network {
                status: e.status().map(|s| s.as_u16()),
                message: e.to_string(),
            },
            Api::Api { status, message } => CoreError::Network {
                message,
                status: Some(status),
            },
            Api::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            Api::Tls(message) => CoreError::Config { message },
            Api::WebSocketConnect(message) => CoreError::Transport { message },
            Api::Decode { message, body: _ } => CoreError::Decode { message },
        }
    }
}
