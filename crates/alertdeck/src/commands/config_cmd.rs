//! Config subcommand handlers.

use dialoguer::{Confirm, Input, Select};
use tabled::Tabled;

use alertdeck_config::{self as cfg, Config, Profile};

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::error::CliError;
use crate::output;

use super::util::prompt_err;

const REDACTED: &str = "********";

#[derive(Tabled)]
struct ProfileRow {
    #[tabled(rename = "")]
    active: &'static str,
    #[tabled(rename = "Profile")]
    name: String,
    #[tabled(rename = "API URL")]
    api_url: String,
    #[tabled(rename = "Auth")]
    auth: String,
    #[tabled(rename = "Stream")]
    stream: &'static str,
}

/// Hide plaintext secrets before a config is displayed.
fn redact(config: &mut Config) {
    for profile in config.profiles.values_mut() {
        if profile.password.is_some() {
            profile.password = Some(REDACTED.into());
        }
        if profile.token.is_some() {
            profile.token = Some(REDACTED.into());
        }
    }
}

/// Where the user wants a freshly entered secret kept.
enum SecretStore {
    Keyring,
    Plaintext,
}

fn ask_secret_store(kind: &str) -> Result<SecretStore, CliError> {
    let choices = &[
        "Store in system keyring (recommended)",
        "Save to config file (plaintext)",
    ];
    let selection = Select::new()
        .with_prompt(format!("Where to store the {kind}?"))
        .items(choices)
        .default(0)
        .interact()
        .map_err(prompt_err)?;
    Ok(if selection == 0 {
        SecretStore::Keyring
    } else {
        SecretStore::Plaintext
    })
}

fn read_secret(prompt: &str, field: &str) -> Result<String, CliError> {
    let secret = rpassword::prompt_password(prompt).map_err(prompt_err)?;
    if secret.trim().is_empty() {
        return Err(CliError::Validation {
            field: field.into(),
            reason: format!("{field} cannot be empty"),
        });
    }
    Ok(secret)
}

// ── Handler ─────────────────────────────────────────────────────────

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Init => init(),

        ConfigCommand::Show => {
            let mut config = cfg::load_config()?;
            redact(&mut config);
            let out = output::render_single(
                global.output,
                &config,
                |c| format!("{c:#?}"),
                |c| c.default_profile.clone().unwrap_or_default(),
            );
            output::print_output(&out, global.quiet);
            Ok(())
        }

        ConfigCommand::Profiles => {
            let config = cfg::load_config()?;
            let mut names: Vec<&String> = config.profiles.keys().collect();
            names.sort();
            let default = config.default_profile.as_deref();

            let out = output::render_list(
                global.output,
                &names,
                |name| {
                    let profile = &config.profiles[name.as_str()];
                    ProfileRow {
                        active: if Some(name.as_str()) == default { "*" } else { "" },
                        name: (*name).clone(),
                        api_url: profile.api_url.clone(),
                        auth: profile.auth_mode.clone(),
                        stream: if profile.stream.unwrap_or(true) { "on" } else { "off" },
                    }
                },
                |name| (*name).clone(),
            );
            output::print_output(&out, global.quiet);
            Ok(())
        }

        ConfigCommand::SetPassword { profile } => {
            let config = cfg::load_config()?;
            let (name, profile) = config
                .profile(profile.as_deref().or(global.profile.as_deref()))
                .map_err(CliError::from)?;

            if profile.auth_mode == "token" {
                let token = read_secret("Token: ", "token")?;
                cfg::store_token(name, &token)?;
            } else {
                let prompt = match &profile.email {
                    Some(email) => format!("Password for {email}: "),
                    None => "Password: ".into(),
                };
                let password = read_secret(&prompt, "password")?;
                cfg::store_password(name, &password)?;
            }
            eprintln!("✓ Secret for profile '{name}' stored in system keyring");
            Ok(())
        }
    }
}

// ── Init: interactive wizard ────────────────────────────────────────

fn init() -> Result<(), CliError> {
    let config_path = cfg::config_path();
    eprintln!("alertdeck configuration wizard");
    eprintln!("   Config path: {}\n", config_path.display());

    let profile_name: String = Input::new()
        .with_prompt("Profile name")
        .default("default".into())
        .interact_text()
        .map_err(prompt_err)?;

    let api_url: String = Input::new()
        .with_prompt("Service URL")
        .default("http://localhost:7001".into())
        .validate_with(|raw: &String| -> Result<(), String> {
            url::Url::parse(raw).map(|_| ()).map_err(|e| e.to_string())
        })
        .interact_text()
        .map_err(prompt_err)?;

    let auth_choices = &["Email + password", "Pre-issued token"];
    let auth_selection = Select::new()
        .with_prompt("Authentication method")
        .items(auth_choices)
        .default(0)
        .interact()
        .map_err(prompt_err)?;

    let mut profile = Profile {
        api_url,
        ..Profile::default()
    };

    if auth_selection == 0 {
        let email: String = Input::new()
            .with_prompt("Email")
            .interact_text()
            .map_err(prompt_err)?;
        let password = read_secret("Password: ", "password")?;

        profile.auth_mode = "password".into();
        profile.email = Some(email);
        match ask_secret_store("password")? {
            SecretStore::Keyring => {
                cfg::store_password(&profile_name, &password)?;
                eprintln!("   ✓ Password stored in system keyring");
            }
            SecretStore::Plaintext => profile.password = Some(password),
        }
    } else {
        let token = read_secret("Token: ", "token")?;

        profile.auth_mode = "token".into();
        match ask_secret_store("token")? {
            SecretStore::Keyring => {
                cfg::store_token(&profile_name, &token)?;
                eprintln!("   ✓ Token stored in system keyring");
            }
            SecretStore::Plaintext => profile.token = Some(token),
        }
    }

    let stream = Confirm::new()
        .with_prompt("Open the live push stream?")
        .default(true)
        .interact()
        .map_err(prompt_err)?;
    if !stream {
        profile.stream = Some(false);
    }

    let mut config = cfg::load_config_or_default();
    config.profiles.insert(profile_name.clone(), profile);
    config.default_profile = Some(profile_name.clone());
    let path = cfg::save_config(&config)?;

    eprintln!("\n✓ Configuration written to {}", path.display());
    eprintln!("  Active profile: {profile_name}");
    eprintln!("\n  Test it: alertdeck login");
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn redact_hides_plaintext_secrets_only() {
        let mut config = Config {
            profiles: HashMap::from([
                (
                    "a".to_owned(),
                    Profile {
                        password: Some("hunter2".into()),
                        password_env: Some("MY_PW".into()),
                        ..Profile::default()
                    },
                ),
                (
                    "b".to_owned(),
                    Profile {
                        token: Some("jwt".into()),
                        ..Profile::default()
                    },
                ),
            ]),
            ..Config::default()
        };

        redact(&mut config);

        let a = &config.profiles["a"];
        assert_eq!(a.password.as_deref(), Some(REDACTED));
        assert_eq!(a.password_env.as_deref(), Some("MY_PW"));
        assert_eq!(a.token, None);
        assert_eq!(config.profiles["b"].token.as_deref(), Some(REDACTED));
    }
}
