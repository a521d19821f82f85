//! `alertdeck login`: check that the configured credentials are accepted.

use secrecy::ExposeSecret;
use serde::Serialize;

use alertdeck_core::AuthCredentials;

use crate::cli::GlobalOpts;
use crate::config::Resolved;
use crate::error::CliError;
use crate::output;

use super::util;

#[derive(Serialize)]
struct LoginReport<'a> {
    profile: &'a str,
    api_url: &'a str,
    method: &'static str,
    token_length: usize,
}

pub async fn handle(resolved: &Resolved, global: &GlobalOpts) -> Result<(), CliError> {
    let session = util::authenticate(resolved, global).await?;

    let report = LoginReport {
        profile: &resolved.profile,
        api_url: resolved.config.api_url.as_str(),
        method: match resolved.config.auth {
            AuthCredentials::Credentials { .. } => "password",
            AuthCredentials::Token(_) => "token",
        },
        token_length: session.token.expose_secret().len(),
    };

    let out = output::render_single(
        global.output,
        &report,
        |r| format!("✓ Authenticated to {} (profile {}, {} login)", r.api_url, r.profile, r.method),
        |r| r.profile.to_owned(),
    );
    output::print_output(&out, global.quiet);
    Ok(())
}
