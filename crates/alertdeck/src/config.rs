//! Resolve the active profile plus CLI flag overrides into a
//! `DashboardConfig`.
//!
//! Profiles live in `alertdeck-config`; this module only layers the
//! command line on top.

use secrecy::SecretString;

use alertdeck_config::{self as cfg, Config, ConfigError, Profile, SecretSources};
use alertdeck_core::{AuthCredentials, DashboardConfig};

use crate::cli::GlobalOpts;
use crate::error::CliError;

/// Profile name reported when everything came from flags.
const FLAGS_PROFILE: &str = "(command line)";

/// A ready-to-use runtime config and the profile it came from.
#[derive(Debug)]
pub struct Resolved {
    pub profile: String,
    pub config: DashboardConfig,
}

/// Load the config file and resolve the active profile.
pub fn resolve(global: &GlobalOpts) -> Result<Resolved, CliError> {
    let file = cfg::load_config()?;
    resolve_with(global, &file, &SecretSources::system())
}

pub(crate) fn resolve_with(
    global: &GlobalOpts,
    file: &Config,
    sources: &SecretSources<'_>,
) -> Result<Resolved, CliError> {
    let (name, base) = match file.profile(global.profile.as_deref()) {
        Ok((name, profile)) => (name.to_owned(), profile.clone()),
        // An explicitly requested profile must exist.
        Err(ConfigError::ProfileNotFound { name }) if global.profile.is_some() => {
            return Err(CliError::ProfileNotFound {
                name,
                available: available_profiles(file),
            });
        }
        Err(_) => {
            if global.api_url.is_none() {
                return Err(CliError::NoConfig {
                    path: cfg::config_path().display().to_string(),
                });
            }
            (FLAGS_PROFILE.to_owned(), Profile::default())
        }
    };

    let profile = apply_overrides(base, global);
    let mut config = cfg::profile_to_dashboard_config(&profile, &name, &file.defaults, sources)
        .map_err(|e| match e {
            ConfigError::NoCredentials { .. } => CliError::NoCredentials {
                profile: name.clone(),
            },
            other => other.into(),
        })?;

    // An explicit token beats anything the profile resolves to.
    if let Some(token) = &global.token {
        config.auth = AuthCredentials::Token(SecretString::from(token.clone()));
    }

    Ok(Resolved {
        profile: name,
        config,
    })
}

fn apply_overrides(mut profile: Profile, global: &GlobalOpts) -> Profile {
    if let Some(url) = &global.api_url {
        profile.api_url.clone_from(url);
    }
    if let Some(url) = &global.stream_url {
        profile.stream_url = Some(url.clone());
    }
    if profile.auth_mode.is_empty() {
        profile.auth_mode = "password".into();
    }
    if let Some(email) = &global.email {
        profile.email = Some(email.clone());
        profile.auth_mode = "password".into();
    }
    if let Some(token) = &global.token {
        profile.token = Some(token.clone());
        profile.auth_mode = "token".into();
    }
    if global.insecure {
        profile.insecure = Some(true);
    }
    if let Some(secs) = global.timeout {
        profile.timeout = Some(secs);
    }
    profile
}

fn available_profiles(file: &Config) -> String {
    let mut names: Vec<&str> = file.profiles.keys().map(String::as_str).collect();
    if names.is_empty() {
        return "(none)".into();
    }
    names.sort_unstable();
    names.join(", ")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::HashMap;
    use std::time::Duration;

    use clap::Parser;
    use secrecy::ExposeSecret;

    use super::*;
    use crate::cli::Cli;

    fn no_keyring(_: &str, _: &str) -> Option<String> {
        None
    }

    fn no_env(_: &str) -> Option<String> {
        None
    }

    fn sources() -> SecretSources<'static> {
        SecretSources {
            env: &no_env,
            keyring: &no_keyring,
        }
    }

    fn global(args: &[&str]) -> GlobalOpts {
        let mut argv = vec!["alertdeck"];
        argv.extend_from_slice(args);
        argv.push("login");
        Cli::try_parse_from(argv).unwrap().global
    }

    fn file_with(name: &str, profile: Profile) -> Config {
        Config {
            default_profile: Some(name.into()),
            profiles: HashMap::from([(name.to_owned(), profile)]),
            ..Config::default()
        }
    }

    fn staging() -> Profile {
        Profile {
            api_url: "http://staging:7001".into(),
            auth_mode: "password".into(),
            email: Some("ops@example.com".into()),
            password: Some("pw".into()),
            ..Profile::default()
        }
    }

    #[test]
    fn default_profile_is_used() {
        let resolved =
            resolve_with(&global(&[]), &file_with("staging", staging()), &sources()).unwrap();
        assert_eq!(resolved.profile, "staging");
        assert_eq!(resolved.config.api_url.as_str(), "http://staging:7001/");
    }

    #[test]
    fn flags_override_profile() {
        let resolved = resolve_with(
            &global(&["--api-url", "http://other:9000", "--timeout", "3", "-k"]),
            &file_with("staging", staging()),
            &sources(),
        )
        .unwrap();
        assert_eq!(resolved.config.api_url.as_str(), "http://other:9000/");
        assert_eq!(resolved.config.timeout, Duration::from_secs(3));
        assert_eq!(
            resolved.config.tls,
            alertdeck_core::TlsVerification::DangerAcceptInvalid
        );
    }

    #[test]
    fn token_flag_replaces_password_login() {
        let resolved = resolve_with(
            &global(&["--token", "jwt-xyz"]),
            &file_with("staging", staging()),
            &sources(),
        )
        .unwrap();
        let AuthCredentials::Token(token) = &resolved.config.auth else {
            panic!("expected token auth");
        };
        assert_eq!(token.expose_secret(), "jwt-xyz");
    }

    #[test]
    fn flags_alone_are_enough() {
        let resolved = resolve_with(
            &global(&["--api-url", "http://localhost:7001", "--token", "t"]),
            &Config::default(),
            &sources(),
        )
        .unwrap();
        assert_eq!(resolved.profile, FLAGS_PROFILE);
    }

    #[test]
    fn nothing_configured_is_reported() {
        let err = resolve_with(&global(&[]), &Config::default(), &sources()).unwrap_err();
        assert!(matches!(err, CliError::NoConfig { .. }));
    }

    #[test]
    fn unknown_profile_lists_available() {
        let err = resolve_with(
            &global(&["--profile", "prod"]),
            &file_with("staging", staging()),
            &sources(),
        )
        .unwrap_err();
        let CliError::ProfileNotFound { name, available } = err else {
            panic!("expected ProfileNotFound");
        };
        assert_eq!(name, "prod");
        assert_eq!(available, "staging");
    }

    #[test]
    fn email_without_password_has_no_credentials() {
        let err = resolve_with(
            &global(&["--api-url", "http://localhost:7001", "--email", "a@b.c"]),
            &Config::default(),
            &sources(),
        )
        .unwrap_err();
        assert!(matches!(err, CliError::NoCredentials { ref profile } if profile == FLAGS_PROFILE));
    }
}
