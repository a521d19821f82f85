//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` into user-facing errors with
//! actionable help text and stable exit codes.

use miette::Diagnostic;
use thiserror::Error;

use alertdeck_config::ConfigError;
use alertdeck_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("Could not reach the alert service")]
    #[diagnostic(
        code(alertdeck::connection_failed),
        help(
            "Check that the service is running and reachable.\n\
             Cause: {reason}"
        )
    )]
    ConnectionFailed { reason: String },

    #[error("Alert stream gave up after {attempts} reconnect attempts")]
    #[diagnostic(
        code(alertdeck::stream_exhausted),
        help("The push stream stays down until restarted. Run the command again, or use --no-stream to rely on polling.")
    )]
    StreamExhausted { attempts: u32 },

    // ── Authentication ───────────────────────────────────────────────
    #[error("Authentication failed: {message}")]
    #[diagnostic(
        code(alertdeck::auth_failed),
        help(
            "Verify your email and password, or issue a fresh token.\n\
             Run: alertdeck config set-password {profile}"
        )
    )]
    AuthFailed { profile: String, message: String },

    #[error("Session expired: {message}")]
    #[diagnostic(
        code(alertdeck::session_expired),
        help("The service stopped accepting this session's token. Sign in again.")
    )]
    SessionExpired { message: String },

    #[error("No credentials configured for profile '{profile}'")]
    #[diagnostic(
        code(alertdeck::no_credentials),
        help(
            "Configure credentials with: alertdeck config init\n\
             Or set ALERTDECK_TOKEN, or ALERTDECK_EMAIL and ALERTDECK_PASSWORD."
        )
    )]
    NoCredentials { profile: String },

    // ── API ──────────────────────────────────────────────────────────
    #[error("Service error{}: {message}", http_suffix(.status.as_ref()))]
    #[diagnostic(code(alertdeck::api_error))]
    ApiError { status: Option<u16>, message: String },

    #[error("Unexpected response from service: {message}")]
    #[diagnostic(
        code(alertdeck::decode),
        help("Check that --api-url points at an alert service.")
    )]
    Decode { message: String },

    #[error("Request timed out")]
    #[diagnostic(
        code(alertdeck::timeout),
        help("Increase the timeout with --timeout or check service responsiveness.\n{message}")
    )]
    Timeout { message: String },

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(alertdeck::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(alertdeck::profile_not_found),
        help(
            "Available profiles: {available}\n\
             Create one with: alertdeck config init"
        )
    )]
    ProfileNotFound { name: String, available: String },

    #[error("No service configured")]
    #[diagnostic(
        code(alertdeck::no_config),
        help(
            "Create a profile with: alertdeck config init\n\
             Or pass --api-url. Expected config at: {path}"
        )
    )]
    NoConfig { path: String },

    #[error("Configuration error: {message}")]
    #[diagnostic(code(alertdeck::config))]
    Config { message: String },

    #[error("Keyring error: {message}")]
    #[diagnostic(
        code(alertdeck::keyring),
        help("Store the secret in the profile's password_env / token_env variable instead.")
    )]
    Keyring { message: String },

    #[error("Prompt failed: {message}")]
    #[diagnostic(
        code(alertdeck::interactive),
        help("This command needs an interactive terminal.")
    )]
    Interactive { message: String },

    // ── IO / Serialization ───────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Invalid JSON payload: {0}")]
    #[diagnostic(code(alertdeck::json), help("--data takes a JSON object, e.g. '{{\"zone\": 3}}'."))]
    Json(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    #[diagnostic(code(alertdeck::internal))]
    Internal(String),
}

fn http_suffix(status: Option<&u16>) -> String {
    status.map(|s| format!(" (HTTP {s})")).unwrap_or_default()
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } | Self::StreamExhausted { .. } => exit_code::CONNECTION,
            Self::AuthFailed { .. } | Self::SessionExpired { .. } | Self::NoCredentials { .. } => {
                exit_code::AUTH
            }
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::Validation { .. } | Self::Json(_) => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }

    /// Attach the profile name to an authentication failure.
    pub fn for_profile(self, name: &str) -> Self {
        match self {
            Self::AuthFailed { message, .. } => Self::AuthFailed {
                profile: name.into(),
                message,
            },
            other => other,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::InvalidCredential => CliError::NoCredentials {
                profile: "current".into(),
            },
            CoreError::Auth { message } => CliError::AuthFailed {
                profile: "current".into(),
                message,
            },
            CoreError::Transport { message } => CliError::ConnectionFailed { reason: message },
            CoreError::ReconnectExhausted { attempts } => CliError::StreamExhausted { attempts },
            CoreError::Network {
                message,
                status: None,
            } => CliError::ConnectionFailed { reason: message },
            CoreError::Network { message, status } => CliError::ApiError { status, message },
            CoreError::Timeout { message } => CliError::Timeout { message },
            CoreError::Decode { message } => CliError::Decode { message },
            CoreError::Config { message } => CliError::Config { message },
            CoreError::Validation { message } => CliError::Validation {
                field: "input".into(),
                reason: message,
            },
            CoreError::NotConnected => CliError::Internal("dashboard is not mounted".into()),
            CoreError::Internal(message) => CliError::Internal(message),
        }
    }
}

// ── ConfigError → CliError mapping ───────────────────────────────────

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => CliError::Validation { field, reason },
            ConfigError::NoCredentials { profile } => CliError::NoCredentials { profile },
            ConfigError::ProfileNotFound { name } => CliError::ProfileNotFound {
                name,
                available: "(none)".into(),
            },
            ConfigError::Keyring(e) => CliError::Keyring {
                message: e.to_string(),
            },
            ConfigError::Io(e) => CliError::Io(e),
            other => CliError::Config {
                message: other.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_errors_exit_with_auth_code() {
        let err: CliError = CoreError::Auth {
            message: "Could not validate credentials".into(),
        }
        .into();
        assert_eq!(err.exit_code(), exit_code::AUTH);

        let err = err.for_profile("staging");
        assert!(matches!(err, CliError::AuthFailed { ref profile, .. } if profile == "staging"));
    }

    #[test]
    fn network_errors_split_on_status() {
        let unreachable: CliError = CoreError::Network {
            message: "connection refused".into(),
            status: None,
        }
        .into();
        assert_eq!(unreachable.exit_code(), exit_code::CONNECTION);

        let server: CliError = CoreError::Network {
            message: "Bad Gateway".into(),
            status: Some(502),
        }
        .into();
        assert_eq!(server.exit_code(), exit_code::GENERAL);
        assert_eq!(server.to_string(), "Service error (HTTP 502): Bad Gateway");
    }

    #[test]
    fn timeouts_and_exhaustion_have_dedicated_codes() {
        let timeout: CliError = CoreError::Timeout {
            message: "operation timed out".into(),
        }
        .into();
        assert_eq!(timeout.exit_code(), exit_code::TIMEOUT);

        let exhausted: CliError = CoreError::ReconnectExhausted { attempts: 5 }.into();
        assert_eq!(exhausted.exit_code(), exit_code::CONNECTION);
    }

    #[test]
    fn config_validation_is_a_usage_error() {
        let err: CliError = ConfigError::Validation {
            field: "page_size".into(),
            reason: "must be greater than zero".into(),
        }
        .into();
        assert_eq!(err.exit_code(), exit_code::USAGE);
    }
}
