//! Configuration for the alertdeck CLI.
//!
//! TOML profiles, credential resolution (env + keyring + plaintext),
//! and translation to `alertdeck_core::DashboardConfig`.

use std::collections::HashMap;
use std::num::NonZeroU32;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use alertdeck_core::{AuthCredentials, DashboardConfig, ReconnectConfig, TlsVerification};

/// Keyring service name; entries are keyed `"{profile}/password"` and
/// `"{profile}/token"`.
pub const KEYRING_SERVICE: &str = "alertdeck";

/// Overrides the config file location.
pub const CONFIG_PATH_ENV: &str = "ALERTDECK_CONFIG";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no credentials configured for profile '{profile}'")]
    NoCredentials { profile: String },

    #[error("profile '{name}' not found")]
    ProfileNotFound { name: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("keyring error: {0}")]
    Keyring(#[from] keyring::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    /// Default profile name.
    pub default_profile: Option<String>,

    /// Global defaults.
    #[serde(default)]
    pub defaults: Defaults,

    /// Named service profiles.
    #[serde(default)]
    pub profiles: HashMap<String, Profile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_profile: Some("default".into()),
            defaults: Defaults::default(),
            profiles: HashMap::new(),
        }
    }
}

impl Config {
    /// Look up `name`, or the default profile when `name` is `None`.
    pub fn profile(&self, name: Option<&str>) -> Result<(&str, &Profile), ConfigError> {
        let name = name
            .or(self.default_profile.as_deref())
            .unwrap_or("default");
        self.profiles
            .get_key_value(name)
            .map(|(k, v)| (k.as_str(), v))
            .ok_or_else(|| ConfigError::ProfileNotFound { name: name.into() })
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_output")]
    pub output: String,

    #[serde(default = "default_color")]
    pub color: String,

    #[serde(default)]
    pub insecure: bool,

    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Snapshot poll interval in seconds. 0 disables polling.
    #[serde(default = "default_poll_interval")]
    pub poll_interval: u64,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            color: default_color(),
            insecure: false,
            timeout: default_timeout(),
            poll_interval: default_poll_interval(),
        }
    }
}

fn default_output() -> String {
    "table".into()
}
fn default_color() -> String {
    "auto".into()
}
fn default_timeout() -> u64 {
    30
}
fn default_poll_interval() -> u64 {
    5
}

/// A named service profile.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Profile {
    /// REST base URL (e.g., "http://localhost:7001").
    pub api_url: String,

    /// Push endpoint override. Derived from `api_url` when unset.
    pub stream_url: Option<String>,

    /// Auth mode: "password" or "token".
    #[serde(default = "default_auth_mode")]
    pub auth_mode: String,

    /// Login email for password auth.
    pub email: Option<String>,

    /// Password (plaintext -- prefer keyring or env var).
    pub password: Option<String>,

    /// Environment variable name containing the password.
    pub password_env: Option<String>,

    /// Pre-issued bearer token (plaintext -- prefer keyring or env var).
    pub token: Option<String>,

    /// Environment variable name containing the bearer token.
    pub token_env: Option<String>,

    /// Path to custom CA certificate.
    pub ca_cert: Option<PathBuf>,

    /// Override insecure TLS setting.
    pub insecure: Option<bool>,

    /// Override timeout (seconds).
    pub timeout: Option<u64>,

    /// Override poll interval (seconds).
    pub poll_interval: Option<u64>,

    /// `limit` for snapshot pulls.
    pub page_size: Option<u32>,

    /// Open the push stream (default true).
    pub stream: Option<bool>,

    /// Reconnect unit delay in milliseconds.
    pub reconnect_base_ms: Option<u64>,

    /// Consecutive reconnect failures before giving up.
    pub reconnect_max_attempts: Option<u32>,
}

fn default_auth_mode() -> String {
    "password".into()
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path: `ALERTDECK_CONFIG`, then platform
/// conventions.
pub fn config_path() -> PathBuf {
    if let Some(path) = std::env::var_os(CONFIG_PATH_ENV) {
        return PathBuf::from(path);
    }
    ProjectDirs::from("com", "alertdeck", "alertdeck").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("alertdeck");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load config from an explicit path, layered defaults → file → env.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("ALERTDECK_").split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

/// Load config, returning a default if the file doesn't exist.
pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_default()
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<PathBuf, ConfigError> {
    let path = config_path();
    save_config_to(&path, cfg)?;
    Ok(path)
}

pub fn save_config_to(path: &Path, cfg: &Config) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Keyring ─────────────────────────────────────────────────────────

fn keyring_entry(profile_name: &str, kind: &str) -> Result<keyring::Entry, keyring::Error> {
    keyring::Entry::new(KEYRING_SERVICE, &format!("{profile_name}/{kind}"))
}

fn process_env(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

fn keyring_secret(profile_name: &str, kind: &str) -> Option<String> {
    keyring_entry(profile_name, kind)
        .and_then(|entry| entry.get_password())
        .ok()
}

/// Store the profile's password in the OS keyring.
pub fn store_password(profile_name: &str, password: &str) -> Result<(), ConfigError> {
    keyring_entry(profile_name, "password")?.set_password(password)?;
    Ok(())
}

/// Store the profile's bearer token in the OS keyring.
pub fn store_token(profile_name: &str, token: &str) -> Result<(), ConfigError> {
    keyring_entry(profile_name, "token")?.set_password(token)?;
    Ok(())
}

// ── Credential resolution (without CLI flags) ───────────────────────

/// Where secrets may come from. Split out so resolution order can be
/// exercised without touching the process environment or the OS keyring.
pub struct SecretSources<'a> {
    pub env: &'a dyn Fn(&str) -> Option<String>,
    pub keyring: &'a dyn Fn(&str, &str) -> Option<String>,
}

impl SecretSources<'static> {
    /// Process environment and OS keyring.
    pub fn system() -> Self {
        Self {
            env: &process_env,
            keyring: &keyring_secret,
        }
    }
}

/// Env var named in the profile → keyring → plaintext.
fn resolve_secret(
    env_name: Option<&str>,
    fallback_env: &str,
    profile_name: &str,
    kind: &str,
    plaintext: Option<&str>,
    sources: &SecretSources<'_>,
) -> Option<SecretString> {
    // 1. Env var
    if let Some(val) = env_name
        .and_then(|name| (sources.env)(name))
        .or_else(|| (sources.env)(fallback_env))
    {
        return Some(SecretString::from(val));
    }

    // 2. Keyring
    if let Some(val) = (sources.keyring)(profile_name, kind) {
        return Some(SecretString::from(val));
    }

    // 3. Plaintext in config
    plaintext.map(|val| SecretString::from(val.to_owned()))
}

/// Resolve `AuthCredentials` from a profile's `auth_mode` field.
pub fn resolve_auth(
    profile: &Profile,
    profile_name: &str,
    sources: &SecretSources<'_>,
) -> Result<AuthCredentials, ConfigError> {
    let missing = || ConfigError::NoCredentials {
        profile: profile_name.into(),
    };

    match profile.auth_mode.as_str() {
        "password" => {
            let email = profile
                .email
                .clone()
                .or_else(|| (sources.env)("ALERTDECK_EMAIL"))
                .ok_or_else(missing)?;
            let password = resolve_secret(
                profile.password_env.as_deref(),
                "ALERTDECK_PASSWORD",
                profile_name,
                "password",
                profile.password.as_deref(),
                sources,
            )
            .ok_or_else(missing)?;
            Ok(AuthCredentials::Credentials { email, password })
        }
        "token" => {
            let token = resolve_secret(
                profile.token_env.as_deref(),
                "ALERTDECK_TOKEN",
                profile_name,
                "token",
                profile.token.as_deref(),
                sources,
            )
            .ok_or_else(missing)?;
            Ok(AuthCredentials::Token(token))
        }
        other => Err(ConfigError::Validation {
            field: "auth_mode".into(),
            reason: format!("expected 'password' or 'token', got '{other}'"),
        }),
    }
}

fn parse_url(field: &str, raw: &str) -> Result<url::Url, ConfigError> {
    raw.parse().map_err(|_| ConfigError::Validation {
        field: field.into(),
        reason: format!("invalid URL: {raw}"),
    })
}

/// Build a `DashboardConfig` from a profile -- no CLI flag overrides.
pub fn profile_to_dashboard_config(
    profile: &Profile,
    profile_name: &str,
    defaults: &Defaults,
    sources: &SecretSources<'_>,
) -> Result<DashboardConfig, ConfigError> {
    let api_url = parse_url("api_url", &profile.api_url)?;
    let auth = resolve_auth(profile, profile_name, sources)?;
    let mut config = DashboardConfig::new(api_url, auth);

    config.stream_url = profile
        .stream_url
        .as_deref()
        .map(|raw| parse_url("stream_url", raw))
        .transpose()?;

    config.tls = if profile.insecure.unwrap_or(defaults.insecure) {
        TlsVerification::DangerAcceptInvalid
    } else if let Some(ref ca_path) = profile.ca_cert {
        TlsVerification::CustomCa(ca_path.clone())
    } else {
        TlsVerification::SystemDefaults
    };

    config.timeout = Duration::from_secs(profile.timeout.unwrap_or(defaults.timeout));
    config.poll_interval =
        Duration::from_secs(profile.poll_interval.unwrap_or(defaults.poll_interval));

    if let Some(size) = profile.page_size {
        config.page_size = NonZeroU32::new(size).ok_or_else(|| ConfigError::Validation {
            field: "page_size".into(),
            reason: "must be greater than zero".into(),
        })?;
    }

    let mut reconnect = ReconnectConfig::default();
    if let Some(ms) = profile.reconnect_base_ms {
        reconnect.base_delay = Duration::from_millis(ms);
    }
    if let Some(max) = profile.reconnect_max_attempts {
        if max == 0 {
            return Err(ConfigError::Validation {
                field: "reconnect_max_attempts".into(),
                reason: "must be at least 1".into(),
            });
        }
        reconnect.max_attempts = max;
    }
    config.reconnect = reconnect;
    config.stream_enabled = profile.stream.unwrap_or(true);

    Ok(config)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use secrecy::ExposeSecret;

    use super::*;

    fn no_keyring(_: &str, _: &str) -> Option<String> {
        None
    }

    fn no_env(_: &str) -> Option<String> {
        None
    }

    fn password_profile() -> Profile {
        Profile {
            api_url: "http://localhost:7001".into(),
            auth_mode: "password".into(),
            email: Some("ops@example.com".into()),
            password: Some("plaintext".into()),
            password_env: Some("OPS_PASSWORD".into()),
            ..Profile::default()
        }
    }

    fn password_of(auth: &AuthCredentials) -> String {
        match auth {
            AuthCredentials::Credentials { password, .. } => password.expose_secret().to_owned(),
            AuthCredentials::Token(_) => panic!("expected password credentials"),
        }
    }

    #[test]
    fn env_var_beats_keyring_and_plaintext() {
        let env = |name: &str| (name == "OPS_PASSWORD").then(|| "from-env".to_string());
        let keyring = |_: &str, _: &str| Some("from-keyring".to_string());
        let sources = SecretSources {
            env: &env,
            keyring: &keyring,
        };
        let auth = resolve_auth(&password_profile(), "default", &sources).unwrap();
        assert_eq!(password_of(&auth), "from-env");
    }

    #[test]
    fn keyring_beats_plaintext() {
        let keyring = |profile: &str, kind: &str| {
            (profile == "work" && kind == "password").then(|| "from-keyring".to_string())
        };
        let sources = SecretSources {
            env: &no_env,
            keyring: &keyring,
        };
        let auth = resolve_auth(&password_profile(), "work", &sources).unwrap();
        assert_eq!(password_of(&auth), "from-keyring");
    }

    #[test]
    fn plaintext_is_last_resort() {
        let sources = SecretSources {
            env: &no_env,
            keyring: &no_keyring,
        };
        let auth = resolve_auth(&password_profile(), "default", &sources).unwrap();
        assert_eq!(password_of(&auth), "plaintext");
    }

    #[test]
    fn missing_password_is_reported() {
        let mut profile = password_profile();
        profile.password = None;
        let sources = SecretSources {
            env: &no_env,
            keyring: &no_keyring,
        };
        let err = resolve_auth(&profile, "default", &sources).unwrap_err();
        assert!(matches!(err, ConfigError::NoCredentials { ref profile } if profile == "default"));
    }

    #[test]
    fn token_mode_reads_fallback_env() {
        let profile = Profile {
            api_url: "http://localhost:7001".into(),
            auth_mode: "token".into(),
            ..Profile::default()
        };
        let env = |name: &str| (name == "ALERTDECK_TOKEN").then(|| "jwt".to_string());
        let sources = SecretSources {
            env: &env,
            keyring: &no_keyring,
        };
        let auth = resolve_auth(&profile, "default", &sources).unwrap();
        assert!(matches!(auth, AuthCredentials::Token(ref t) if t.expose_secret() == "jwt"));
    }

    #[test]
    fn unknown_auth_mode_is_rejected() {
        let mut profile = password_profile();
        profile.auth_mode = "oauth".into();
        let sources = SecretSources {
            env: &no_env,
            keyring: &no_keyring,
        };
        assert!(matches!(
            resolve_auth(&profile, "default", &sources),
            Err(ConfigError::Validation { .. })
        ));
    }

    #[test]
    fn profile_translates_to_dashboard_config() {
        let mut profile = password_profile();
        profile.poll_interval = Some(0);
        profile.page_size = Some(25);
        profile.reconnect_base_ms = Some(250);
        profile.reconnect_max_attempts = Some(3);
        profile.stream = Some(false);
        profile.ca_cert = Some(PathBuf::from("/etc/alertdeck/ca.pem"));

        let sources = SecretSources {
            env: &no_env,
            keyring: &no_keyring,
        };
        let config =
            profile_to_dashboard_config(&profile, "default", &Defaults::default(), &sources)
                .unwrap();

        assert_eq!(config.api_url.as_str(), "http://localhost:7001/");
        assert_eq!(config.poll_interval, Duration::ZERO);
        assert_eq!(config.page_size.get(), 25);
        assert_eq!(config.reconnect.base_delay, Duration::from_millis(250));
        assert_eq!(config.reconnect.max_attempts, 3);
        assert!(!config.stream_enabled);
        assert_eq!(
            config.tls,
            TlsVerification::CustomCa(PathBuf::from("/etc/alertdeck/ca.pem"))
        );
        assert_eq!(config.timeout, Duration::from_secs(30));
    }

    #[test]
    fn zero_page_size_is_invalid() {
        let mut profile = password_profile();
        profile.page_size = Some(0);
        let sources = SecretSources {
            env: &no_env,
            keyring: &no_keyring,
        };
        let err = profile_to_dashboard_config(&profile, "default", &Defaults::default(), &sources)
            .unwrap_err();
        assert!(matches!(err, ConfigError::Validation { ref field, .. } if field == "page_size"));
    }

    #[test]
    fn bad_url_is_invalid() {
        let mut profile = password_profile();
        profile.api_url = "not a url".into();
        let sources = SecretSources {
            env: &no_env,
            keyring: &no_keyring,
        };
        assert!(
            profile_to_dashboard_config(&profile, "default", &Defaults::default(), &sources)
                .is_err()
        );
    }

    #[test]
    fn save_then_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.defaults.poll_interval = 15;
        config.profiles.insert("default".into(), password_profile());
        save_config_to(&path, &config).unwrap();

        let loaded = load_config_from(&path).unwrap();
        assert_eq!(loaded.defaults.poll_interval, 15);
        let (name, profile) = loaded.profile(None).unwrap();
        assert_eq!(name, "default");
        assert_eq!(profile.email.as_deref(), Some("ops@example.com"));
        assert_eq!(profile.auth_mode, "password");
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = load_config_from(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(loaded.default_profile.as_deref(), Some("default"));
        assert!(loaded.profiles.is_empty());
        assert!(matches!(
            loaded.profile(Some("work")),
            Err(ConfigError::ProfileNotFound { .. })
        ));
    }
}
