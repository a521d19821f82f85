// HTTP-backed pieces of the core (sign-in, snapshots, event submission)
// against a wiremock service.

use std::sync::Arc;

use secrecy::{ExposeSecret, SecretString};
use serde_json::json;
use url::Url;
use wiremock::matchers::{body_string_contains, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use alertdeck_core::{
    AlertQuery, AuthCredentials, CoreError, DashboardConfig, HttpSnapshotFetcher, NewEvent,
    Severity, SnapshotFetcher, sign_in, submit_event,
};

fn config(server: &MockServer, auth: AuthCredentials) -> DashboardConfig {
    DashboardConfig::new(Url::parse(&server.uri()).unwrap(), auth)
}

fn password_auth() -> AuthCredentials {
    AuthCredentials::Credentials {
        email: "ops@example.com".into(),
        password: SecretString::from("hunter2".to_string()),
    }
}

async fn mount_login(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("username=ops%40example.com"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "jwt-abc",
            "token_type": "bearer"
        })))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_sign_in_with_password_attaches_token() {
    let server = MockServer::start().await;
    mount_login(&server).await;

    Mock::given(method("GET"))
        .and(path("/alerts/"))
        .and(header("authorization", "Bearer jwt-abc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    let session = sign_in(&config(&server, password_auth())).await.unwrap();
    assert_eq!(session.token.expose_secret(), "jwt-abc");
    assert!(session.client.has_token());

    let fetcher = HttpSnapshotFetcher::new(Arc::clone(&session.client));
    assert!(fetcher.fetch(&AlertQuery::default()).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_sign_in_rejected_is_auth_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(
            ResponseTemplate::new(401)
                .set_body_json(json!({ "detail": "Incorrect username or password" })),
        )
        .mount(&server)
        .await;

    let result = sign_in(&config(&server, password_auth())).await;
    let Err(err) = result else {
        panic!("sign-in should fail");
    };
    assert!(err.is_auth());
}

#[tokio::test]
async fn test_sign_in_with_static_token_skips_login() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;

    let auth = AuthCredentials::Token(SecretString::from("pre-issued".to_string()));
    let session = sign_in(&config(&server, auth)).await.unwrap();
    assert_eq!(session.token.expose_secret(), "pre-issued");
}

#[tokio::test]
async fn test_snapshot_passes_filters_through() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/alerts/"))
        .and(query_param("severity", "critical"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
            "id": 5,
            "event_id": 42,
            "severity": "critical",
            "description": "Person detected at zone_3",
            "created_at": "2024-01-01T00:00:00",
            "user_id": 1
        }])))
        .mount(&server)
        .await;

    let client = alertdeck_api::AlertClient::from_reqwest(&server.uri(), reqwest::Client::new())
        .unwrap();
    let fetcher = HttpSnapshotFetcher::new(Arc::new(client));
    let alerts = fetcher
        .fetch(&AlertQuery::default().with_severity(Severity::Critical))
        .await
        .unwrap();

    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].id, 5);
}

#[tokio::test]
async fn test_snapshot_errors_are_categorized() {
    let server = MockServer::start().await;
    let client = Arc::new(
        alertdeck_api::AlertClient::from_reqwest(&server.uri(), reqwest::Client::new()).unwrap(),
    );
    let fetcher = HttpSnapshotFetcher::new(Arc::clone(&client));

    Mock::given(method("GET"))
        .and(path("/alerts/"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    let err = fetcher.fetch(&AlertQuery::default()).await.unwrap_err();
    assert!(matches!(err, CoreError::Network { status: Some(503), .. }));
    assert!(err.is_transient());

    Mock::given(method("GET"))
        .and(path("/alerts/"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;
    let err = fetcher.fetch(&AlertQuery::default()).await.unwrap_err();
    assert!(matches!(err, CoreError::Auth { .. }));
}

#[tokio::test]
async fn test_submit_event() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/events/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 3,
            "device_id": "cam-01",
            "event_type": "person",
            "confidence": 0.9,
            "raw_data": {},
            "timestamp": "2024-01-01T00:00:00",
            "user_id": 1
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client =
        alertdeck_api::AlertClient::from_reqwest(&server.uri(), reqwest::Client::new()).unwrap();
    let event = NewEvent {
        device_id: "cam-01".into(),
        event_type: "person".into(),
        confidence: 0.9,
        raw_data: json!({}),
    };
    let stored = submit_event(&client, &event).await.unwrap();
    assert_eq!(stored.id, 3);

    let invalid = NewEvent {
        confidence: 4.0,
        ..event
    };
    assert!(matches!(
        submit_event(&client, &invalid).await,
        Err(CoreError::Validation { .. })
    ));
}
