// ── Authentication ──
//
// An `AuthProvider` turns whatever the user configured into a bearer
// token. The token is all the rest of the core needs: it authorizes pull
// requests and is passed to the push stream's `connect`.

use std::future::Future;
use std::sync::Arc;

use alertdeck_api::AlertClient;
use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, info};

use crate::config::{AuthCredentials, DashboardConfig};
use crate::error::CoreError;

/// Supplies a bearer token.
pub trait AuthProvider: Send + Sync {
    fn authenticate(&self) -> impl Future<Output = Result<SecretString, CoreError>> + Send;
}

/// Email + password login against `POST /token`.
pub struct PasswordAuth {
    client: Arc<AlertClient>,
    email: String,
    password: SecretString,
}

impl PasswordAuth {
    pub fn new(client: Arc<AlertClient>, email: impl Into<String>, password: SecretString) -> Self {
        Self {
            client,
            email: email.into(),
            password,
        }
    }
}

impl AuthProvider for PasswordAuth {
    async fn authenticate(&self) -> Result<SecretString, CoreError> {
        if self.email.trim().is_empty() {
            return Err(CoreError::Validation {
                message: "email must not be empty".into(),
            });
        }
        let issued = self.client.login(&self.email, &self.password).await?;
        debug!(token_type = %issued.token_type, "password login accepted");
        Ok(issued.token)
    }
}

/// A token obtained out of band (e.g. `ALERTDECK_TOKEN`).
pub struct StaticToken(SecretString);

impl StaticToken {
    pub fn new(token: SecretString) -> Self {
        Self(token)
    }
}

impl AuthProvider for StaticToken {
    async fn authenticate(&self) -> Result<SecretString, CoreError> {
        if self.0.expose_secret().trim().is_empty() {
            return Err(CoreError::InvalidCredential);
        }
        Ok(self.0.clone())
    }
}

/// An authenticated REST client plus the token it carries.
pub struct Session {
    pub client: Arc<AlertClient>,
    pub token: SecretString,
}

/// Build a client for `config`, authenticate, and attach the token.
pub async fn sign_in(config: &DashboardConfig) -> Result<Session, CoreError> {
    let client = Arc::new(AlertClient::new(config.api_url.clone(), &config.transport())?);

    let token = match &config.auth {
        AuthCredentials::Credentials { email, password } => {
            PasswordAuth::new(Arc::clone(&client), email.clone(), password.clone())
                .authenticate()
                .await?
        }
        AuthCredentials::Token(token) => StaticToken::new(token.clone()).authenticate().await?,
    };

    client.set_token(token.clone());
    info!(url = %config.api_url, "signed in");
    Ok(Session { client, token })
}
