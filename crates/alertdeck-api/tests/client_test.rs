// Integration tests for `AlertClient` using wiremock.

use std::num::NonZeroU32;

use pretty_assertions::assert_eq;
use secrecy::{ExposeSecret, SecretString};
use serde_json::json;
use wiremock::matchers::{body_string_contains, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use alertdeck_api::{AlertClient, AlertQuery, Error, NewEvent, Severity};

// ── Helpers ─────────────────────────────────────────────────────────

async fn setup() -> (MockServer, AlertClient) {
    let server = MockServer::start().await;
    let client = AlertClient::from_reqwest(&server.uri(), reqwest::Client::new()).unwrap();
    (server, client)
}

fn alert_json(id: i64, severity: &str, created_at: &str) -> serde_json::Value {
    json!({
        "id": id,
        "event_id": id * 10,
        "severity": severity,
        "description": format!("alert {id}"),
        "created_at": created_at,
        "user_id": 1
    })
}

// ── Alerts ──────────────────────────────────────────────────────────

#[tokio::test]
async fn test_list_alerts_sends_bearer_and_query() {
    let (server, client) = setup().await;
    client.set_token(SecretString::from("tok-123".to_string()));

    Mock::given(method("GET"))
        .and(path("/alerts/"))
        .and(header("authorization", "Bearer tok-123"))
        .and(query_param("skip", "20"))
        .and(query_param("limit", "50"))
        .and(query_param("severity", "critical"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            alert_json(7, "critical", "2024-01-01T00:00:07"),
            alert_json(3, "critical", "2024-01-01T00:00:03"),
        ])))
        .mount(&server)
        .await;

    let query = AlertQuery::page(20, NonZeroU32::new(50).unwrap()).with_severity(Severity::Critical);
    let alerts = client.list_alerts(&query).await.unwrap();

    assert_eq!(alerts.len(), 2);
    assert_eq!(alerts[0].id, 7);
    assert_eq!(alerts[1].id, 3);
    assert!(alerts.iter().all(|a| a.is_critical()));
}

#[tokio::test]
async fn test_list_alerts_default_query_has_no_params() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/alerts/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    let alerts = client.list_alerts(&AlertQuery::default()).await.unwrap();
    assert!(alerts.is_empty());

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests[0].url.query(), None);
}

// ── Error mapping ───────────────────────────────────────────────────

#[tokio::test]
async fn test_unauthorized_maps_to_authentication() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/alerts/"))
        .respond_with(
            ResponseTemplate::new(401)
                .set_body_json(json!({ "detail": "Could not validate credentials" })),
        )
        .mount(&server)
        .await;

    let err = client.list_alerts(&AlertQuery::default()).await.unwrap_err();
    match err {
        Error::Authentication { status, ref message } => {
            assert_eq!(status, 401);
            assert_eq!(message, "Could not validate credentials");
        }
        other => panic!("expected Authentication, got {other:?}"),
    }
    assert!(err.is_auth_error());
}

#[tokio::test]
async fn test_forbidden_maps_to_authentication() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/alerts/"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;

    let err = client.list_alerts(&AlertQuery::default()).await.unwrap_err();
    assert!(matches!(err, Error::Authentication { status: 403, .. }));
}

#[tokio::test]
async fn test_server_error_maps_to_api() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/alerts/"))
        .respond_with(ResponseTemplate::new(500).set_body_string("Internal Server Error"))
        .mount(&server)
        .await;

    let err = client.list_alerts(&AlertQuery::default()).await.unwrap_err();
    match err {
        Error::Api { status, ref message } => {
            assert_eq!(status, 500);
            assert_eq!(message, "Internal Server Error");
        }
        other => panic!("expected Api, got {other:?}"),
    }
    assert!(err.is_transient());
}

#[tokio::test]
async fn test_malformed_body_maps_to_decode() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/alerts/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "alerts": [] })))
        .mount(&server)
        .await;

    let err = client.list_alerts(&AlertQuery::default()).await.unwrap_err();
    match err {
        Error::Decode { body, .. } => assert!(body.contains("alerts")),
        other => panic!("expected Decode, got {other:?}"),
    }
}

// ── Login ───────────────────────────────────────────────────────────

#[tokio::test]
async fn test_login_posts_password_form() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/token"))
        .and(header("content-type", "application/x-www-form-urlencoded"))
        .and(body_string_contains("username=ops%40example.com"))
        .and(body_string_contains("password=hunter2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "jwt-abc",
            "token_type": "bearer"
        })))
        .mount(&server)
        .await;

    let token = client
        .login("ops@example.com", &SecretString::from("hunter2".to_string()))
        .await
        .unwrap();

    assert_eq!(token.token.expose_secret(), "jwt-abc");
    assert_eq!(token.token_type, "bearer");
    // login() does not store the token by itself
    assert!(!client.has_token());
}

#[tokio::test]
async fn test_login_rejected() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(
            ResponseTemplate::new(401)
                .set_body_json(json!({ "detail": "Incorrect username or password" })),
        )
        .mount(&server)
        .await;

    let err = client
        .login("ops@example.com", &SecretString::from("wrong".to_string()))
        .await
        .unwrap_err();
    assert!(err.is_auth_error());
    assert!(err.to_string().contains("Incorrect username or password"));
}

// ── Events ──────────────────────────────────────────────────────────

#[tokio::test]
async fn test_create_event() {
    let (server, client) = setup().await;
    client.set_token(SecretString::from("tok-123".to_string()));

    Mock::given(method("POST"))
        .and(path("/events/"))
        .and(header("authorization", "Bearer tok-123"))
        .and(body_string_contains("\"device_id\":\"cam-01\""))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 12,
            "device_id": "cam-01",
            "event_type": "person",
            "confidence": 0.92,
            "raw_data": { "zone": "zone_3" },
            "timestamp": "2024-05-01T08:30:00",
            "user_id": 1
        })))
        .mount(&server)
        .await;

    let event = client
        .create_event(&NewEvent {
            device_id: "cam-01".into(),
            event_type: "person".into(),
            confidence: 0.92,
            raw_data: json!({ "zone": "zone_3" }),
        })
        .await
        .unwrap();

    assert_eq!(event.id, 12);
    assert_eq!(event.user_id, 1);
    assert_eq!(event.raw_data["zone"], "zone_3");
}
