// REST client for the alert service
//
// Wraps `reqwest::Client` with base-URL handling, bearer authorization and
// status mapping. Credential failures (401/403) are kept distinct from
// every other non-success status so callers can end the session instead
// of retrying.

use std::sync::RwLock;

use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use tracing::{debug, trace};
use url::Url;

use crate::error::Error;
use crate::models::{Alert, AlertQuery, Event, NewEvent, TokenResponse};
use crate::transport::TransportConfig;

/// A bearer token issued by `POST /token`.
#[derive(Debug, Clone)]
pub struct AccessToken {
    pub token: SecretString,
    pub token_type: String,
}

/// HTTP client for the alert service's REST endpoints.
///
/// The bearer token is held behind a lock so one client can be shared
/// between the login flow and the snapshot poller.
pub struct AlertClient {
    http: reqwest::Client,
    base_url: Url,
    token: RwLock<Option<SecretString>>,
}

impl AlertClient {
    /// Create a new client from a `TransportConfig`.
    ///
    /// `base_url` is the service root (e.g. `http://localhost:7001`).
    pub fn new(base_url: Url, transport: &TransportConfig) -> Result<Self, Error> {
        let http = transport.build_client()?;
        Ok(Self::with_client(http, base_url))
    }

    /// Create a client from a URL string and a pre-built `reqwest::Client`.
    pub fn from_reqwest(base_url: &str, http: reqwest::Client) -> Result<Self, Error> {
        let base_url = Url::parse(base_url)?;
        Ok(Self::with_client(http, base_url))
    }

    /// Create a client with a pre-built `reqwest::Client`.
    pub fn with_client(http: reqwest::Client, mut base_url: Url) -> Self {
        // `Url::join` drops the last path segment unless it ends in '/'.
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Self {
            http,
            base_url,
            token: RwLock::new(None),
        }
    }

    /// The service base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    // ── Token handling ───────────────────────────────────────────────

    /// Attach a bearer token to all subsequent requests.
    pub fn set_token(&self, token: SecretString) {
        debug!("storing bearer token");
        *self.token.write().expect("token lock poisoned") = Some(token);
    }

    /// Drop the stored bearer token.
    pub fn clear_token(&self) {
        *self.token.write().expect("token lock poisoned") = None;
    }

    pub fn has_token(&self) -> bool {
        self.token.read().expect("token lock poisoned").is_some()
    }

    fn authorize(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let guard = self.token.read().expect("token lock poisoned");
        match guard.as_ref() {
            Some(token) => builder.bearer_auth(token.expose_secret()),
            None => builder,
        }
    }

    fn url(&self, path: &str) -> Result<Url, Error> {
        Ok(self.base_url.join(path)?)
    }

    // ── Endpoints ────────────────────────────────────────────────────

    /// Exchange email + password for a bearer token.
    ///
    /// `POST /token` as an OAuth2 password form. Does not store the token;
    /// call [`set_token`](Self::set_token) with the result.
    pub async fn login(&self, email: &str, password: &SecretString) -> Result<AccessToken, Error> {
        let url = self.url("token")?;
        debug!(email, "logging in at {}", url);

        let resp = self
            .http
            .post(url)
            .form(&[("username", email), ("password", password.expose_secret())])
            .send()
            .await?;

        let token: TokenResponse = parse_json(resp).await?;
        if token.access_token.is_empty() {
            return Err(Error::InvalidCredential);
        }

        debug!("login successful");
        Ok(AccessToken {
            token: SecretString::from(token.access_token),
            token_type: token.token_type,
        })
    }

    /// List alerts owned by the authenticated user, newest first.
    ///
    /// `GET /alerts/?skip=&limit=&severity=`
    pub async fn list_alerts(&self, query: &AlertQuery) -> Result<Vec<Alert>, Error> {
        let url = self.url("alerts/")?;
        debug!(?query, "listing alerts");

        let resp = self.authorize(self.http.get(url).query(query)).send().await?;
        let alerts: Vec<Alert> = parse_json(resp).await?;

        trace!(count = alerts.len(), "received alerts");
        Ok(alerts)
    }

    /// Submit a detection event for processing.
    ///
    /// `POST /events/`
    pub async fn create_event(&self, event: &NewEvent) -> Result<Event, Error> {
        let url = self.url("events/")?;
        debug!(device_id = %event.device_id, event_type = %event.event_type, "creating event");

        let resp = self.authorize(self.http.post(url).json(event)).send().await?;
        parse_json(resp).await
    }
}

// ── Response handling ────────────────────────────────────────────────

/// Map the response status and decode the body.
async fn parse_json<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, Error> {
    let status = resp.status();
    let body = resp.text().await?;

    if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
        return Err(Error::Authentication {
            status: status.as_u16(),
            message: error_detail(&body).unwrap_or_else(|| "credentials rejected".into()),
        });
    }

    if !status.is_success() {
        return Err(Error::Api {
            status: status.as_u16(),
            message: error_detail(&body).unwrap_or_else(|| {
                status.canonical_reason().unwrap_or("unexpected status").to_owned()
            }),
        });
    }

    serde_json::from_str(&body).map_err(|e| Error::Decode {
        message: e.to_string(),
        body,
    })
}

/// Pull the `detail` message out of an error body, if there is one.
fn error_detail(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    match value.get("detail")? {
        serde_json::Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_gains_trailing_slash() {
        let client = AlertClient::from_reqwest("http://localhost:7001/api", reqwest::Client::new())
            .expect("valid url");
        assert_eq!(client.base_url().as_str(), "http://localhost:7001/api/");
        assert_eq!(
            client.url("alerts/").expect("join").as_str(),
            "http://localhost:7001/api/alerts/"
        );
    }

    #[test]
    fn error_detail_reads_string_and_structured() {
        assert_eq!(
            error_detail(r#"{"detail":"Incorrect username or password"}"#).as_deref(),
            Some("Incorrect username or password")
        );
        assert_eq!(
            error_detail(r#"{"detail":[{"loc":["query","limit"]}]}"#).as_deref(),
            Some(r#"[{"loc":["query","limit"]}]"#)
        );
        assert!(error_detail("Internal Server Error").is_none());
    }

    #[test]
    fn token_round_trip_on_client() {
        let client = AlertClient::from_reqwest("http://localhost:7001", reqwest::Client::new())
            .expect("valid url");
        assert!(!client.has_token());
        client.set_token(SecretString::from("abc".to_string()));
        assert!(client.has_token());
        client.clear_token();
        assert!(!client.has_token());
    }
}
