// Wire models for the alert service.
//
// Field names follow the service's snake_case JSON. Timestamps come from
// the server clock and may arrive with or without a UTC offset.

use std::num::NonZeroU32;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Server-assigned alert identifier.
pub type AlertId = i64;

// ── Severity ─────────────────────────────────────────────────────────

/// Alert severity as reported by the service.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::IntoStaticStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Severity {
    Critical,
    Normal,
}

// ── Alert ────────────────────────────────────────────────────────────

/// A single alert record. Identity is [`id`](Self::id): two values with the
/// same id describe the same logical alert regardless of which channel
/// delivered them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alert {
    pub id: AlertId,

    /// Originating event on the server.
    pub event_id: i64,

    pub severity: Severity,

    pub description: String,

    #[serde(with = "server_time")]
    pub created_at: DateTime<Utc>,

    /// Owning user. The wire name is `user_id`.
    #[serde(rename = "user_id")]
    pub owner_id: i64,
}

impl Alert {
    pub fn is_critical(&self) -> bool {
        self.severity == Severity::Critical
    }
}

// ── AlertQuery ───────────────────────────────────────────────────────

/// Query parameters for `GET /alerts/`. Unset fields are omitted and the
/// service defaults apply (`skip=0`, `limit=100`, all severities).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AlertQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skip: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<NonZeroU32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub severity: Option<Severity>,
}

impl AlertQuery {
    pub fn page(skip: u32, limit: NonZeroU32) -> Self {
        Self {
            skip: Some(skip),
            limit: Some(limit),
            severity: None,
        }
    }

    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = Some(severity);
        self
    }
}

// ── Events ───────────────────────────────────────────────────────────

/// Payload for `POST /events/`. The service derives alerts from events
/// asynchronously and pushes them over the alert stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewEvent {
    pub device_id: String,
    pub event_type: String,
    pub confidence: f64,
    #[serde(default)]
    pub raw_data: serde_json::Value,
}

/// An event as stored by the service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: i64,
    pub device_id: String,
    pub event_type: String,
    pub confidence: f64,
    #[serde(default)]
    pub raw_data: serde_json::Value,
    #[serde(with = "server_time")]
    pub timestamp: DateTime<Utc>,
    pub user_id: i64,
}

// ── Token ────────────────────────────────────────────────────────────

/// Body of a successful `POST /token`.
#[derive(Debug, Deserialize)]
pub(crate) struct TokenResponse {
    pub access_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
}

fn default_token_type() -> String {
    "bearer".into()
}

// ── Timestamp codec ──────────────────────────────────────────────────

/// Accepts RFC 3339 timestamps and naive ISO-8601 timestamps (read as
/// UTC). Always writes RFC 3339.
pub(crate) mod server_time {
    use chrono::{DateTime, NaiveDateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer, de};

    pub fn serialize<S: Serializer>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_rfc3339())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).ok_or_else(|| de::Error::custom(format!("invalid timestamp: {raw}")))
    }

    pub fn parse(raw: &str) -> Option<DateTime<Utc>> {
        if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
            return Some(dt.with_timezone(&Utc));
        }
        NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
            .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f"))
            .ok()
            .map(|naive| naive.and_utc())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::TimeZone;
    use serde_json::json;

    use super::*;

    #[test]
    fn deserialize_alert_with_offset() {
        let alert: Alert = serde_json::from_value(json!({
            "id": 5,
            "event_id": 42,
            "severity": "critical",
            "description": "Person detected at zone_3",
            "created_at": "2024-01-01T00:00:00Z",
            "user_id": 7
        }))
        .unwrap();

        assert_eq!(alert.id, 5);
        assert_eq!(alert.event_id, 42);
        assert_eq!(alert.severity, Severity::Critical);
        assert_eq!(alert.owner_id, 7);
        assert_eq!(alert.created_at, Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
    }

    #[test]
    fn deserialize_naive_timestamp_as_utc() {
        let alert: Alert = serde_json::from_value(json!({
            "id": 1,
            "event_id": 1,
            "severity": "normal",
            "description": "Motion detected",
            "created_at": "2024-03-05T10:15:30.250000",
            "user_id": 1
        }))
        .unwrap();

        assert_eq!(alert.severity, Severity::Normal);
        assert_eq!(
            alert.created_at,
            Utc.with_ymd_and_hms(2024, 3, 5, 10, 15, 30).unwrap()
                + chrono::Duration::milliseconds(250)
        );
    }

    #[test]
    fn unknown_severity_is_rejected() {
        let result = serde_json::from_value::<Alert>(json!({
            "id": 1,
            "event_id": 1,
            "severity": "catastrophic",
            "description": "?",
            "created_at": "2024-01-01T00:00:00Z",
            "user_id": 1
        }));
        assert!(result.is_err());
    }

    #[test]
    fn serialize_uses_wire_names() {
        let alert = Alert {
            id: 9,
            event_id: 3,
            severity: Severity::Normal,
            description: "Object detected".into(),
            created_at: Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap(),
            owner_id: 2,
        };
        let value = serde_json::to_value(&alert).unwrap();
        assert_eq!(value["user_id"], 2);
        assert_eq!(value["severity"], "normal");
        assert_eq!(value["created_at"], "2024-06-01T12:00:00+00:00");
    }

    #[test]
    fn severity_parses_case_insensitively() {
        assert_eq!("CRITICAL".parse::<Severity>().unwrap(), Severity::Critical);
        assert_eq!(Severity::Normal.to_string(), "normal");
    }

    #[test]
    fn query_omits_unset_fields() {
        let query = AlertQuery::default().with_severity(Severity::Critical);
        let value = serde_json::to_value(&query).unwrap();
        assert_eq!(value, json!({ "severity": "critical" }));
    }
}
