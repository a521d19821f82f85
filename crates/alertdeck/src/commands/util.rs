//! Shared helpers for command handlers.

use std::io::{self, IsTerminal};
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

use alertdeck_core::{Session, sign_in};

use crate::cli::GlobalOpts;
use crate::config::Resolved;
use crate::error::CliError;

/// Sign in with the resolved credentials, showing a spinner on an
/// interactive stderr.
pub async fn authenticate(resolved: &Resolved, global: &GlobalOpts) -> Result<Session, CliError> {
    let spinner = spinner(&format!("Signing in to {}", resolved.config.api_url), global.quiet);
    let result = sign_in(&resolved.config).await;
    spinner.finish_and_clear();

    result.map_err(|e| CliError::from(e).for_profile(&resolved.profile))
}

fn spinner(message: &str, quiet: bool) -> ProgressBar {
    if quiet || !io::stderr().is_terminal() {
        return ProgressBar::hidden();
    }
    let bar = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner} {msg}") {
        bar.set_style(style);
    }
    bar.set_message(message.to_owned());
    bar.enable_steady_tick(Duration::from_millis(80));
    bar
}

/// Map a dialoguer / interactive I/O failure into CliError.
pub fn prompt_err(e: impl std::fmt::Display) -> CliError {
    CliError::Interactive {
        message: e.to_string(),
    }
}

/// Parse `--data` into a JSON object. Absent means `{}`.
pub fn parse_json_object(raw: Option<&str>) -> Result<serde_json::Value, CliError> {
    let Some(raw) = raw else {
        return Ok(serde_json::Value::Object(serde_json::Map::new()));
    };
    let value: serde_json::Value = serde_json::from_str(raw)?;
    if !value.is_object() {
        return Err(CliError::Validation {
            field: "data".into(),
            reason: "expected a JSON object".into(),
        });
    }
    Ok(value)
}
