// ── Runtime connection configuration ──
//
// These types describe *how* to reach the alert service. They carry
// credential data and delivery tuning, but never touch disk. The CLI
// builds a `DashboardConfig` from a profile and hands it in.

use std::num::NonZeroU32;
use std::time::Duration;

use alertdeck_api::TransportConfig;
use alertdeck_api::transport::TlsMode;
use alertdeck_api::websocket::{ReconnectConfig, stream_endpoint};
use secrecy::SecretString;
use url::Url;

use crate::controller::ControllerOptions;
use crate::error::CoreError;

/// Service default for `GET /alerts/?limit=`.
pub const DEFAULT_PAGE_SIZE: NonZeroU32 = NonZeroU32::new(100).expect("non-zero literal");

/// How to obtain a bearer token.
#[derive(Debug, Clone)]
pub enum AuthCredentials {
    /// Exchange email + password at `POST /token`.
    Credentials { email: String, password: SecretString },
    /// A token obtained out of band.
    Token(SecretString),
}

/// TLS verification strategy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TlsVerification {
    /// System CA store (strict).
    #[default]
    SystemDefaults,
    /// Custom CA certificate file.
    CustomCa(std::path::PathBuf),
    /// Skip verification (self-signed development servers).
    DangerAcceptInvalid,
}

/// Configuration for one dashboard session against one service.
#[derive(Debug, Clone)]
pub struct DashboardConfig {
    /// REST base URL (e.g. `http://localhost:7001`).
    pub api_url: Url,
    /// Push endpoint. Derived from `api_url` when unset.
    pub stream_url: Option<Url>,
    pub auth: AuthCredentials,
    pub tls: TlsVerification,
    /// Per-request timeout for pull calls.
    pub timeout: Duration,
    /// Snapshot poll cadence. Zero disables polling.
    pub poll_interval: Duration,
    /// `limit` sent with every snapshot pull.
    pub page_size: NonZeroU32,
    pub reconnect: ReconnectConfig,
    /// Open the push stream. When false the dashboard relies on polling.
    pub stream_enabled: bool,
}

impl DashboardConfig {
    pub fn new(api_url: Url, auth: AuthCredentials) -> Self {
        Self {
            api_url,
            stream_url: None,
            auth,
            tls: TlsVerification::default(),
            timeout: Duration::from_secs(30),
            poll_interval: Duration::from_secs(5),
            page_size: DEFAULT_PAGE_SIZE,
            reconnect: ReconnectConfig::default(),
            stream_enabled: true,
        }
    }

    /// The push endpoint, without credentials.
    pub fn stream_endpoint(&self) -> Result<Url, CoreError> {
        match &self.stream_url {
            Some(url) => Ok(url.clone()),
            None => stream_endpoint(&self.api_url).map_err(|e| CoreError::Config {
                message: e.to_string(),
            }),
        }
    }

    pub fn transport(&self) -> TransportConfig {
        let tls = match &self.tls {
            TlsVerification::SystemDefaults => TlsMode::System,
            TlsVerification::CustomCa(path) => TlsMode::CustomCa(path.clone()),
            TlsVerification::DangerAcceptInvalid => TlsMode::DangerAcceptInvalid,
        };
        TransportConfig {
            tls,
            timeout: self.timeout,
        }
    }

    pub fn controller_options(&self) -> ControllerOptions {
        ControllerOptions {
            poll_interval: self.poll_interval,
            page_size: self.page_size,
            stream_enabled: self.stream_enabled,
        }
    }
}
