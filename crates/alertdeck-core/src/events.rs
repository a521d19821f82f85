// ── Event submission ──
//
// Detection events feed the service's alert pipeline; resulting alerts
// come back over the push stream.

use alertdeck_api::{AlertClient, Event, NewEvent};
use tracing::info;

use crate::error::CoreError;

/// Validate and submit a detection event.
pub async fn submit_event(client: &AlertClient, event: &NewEvent) -> Result<Event, CoreError> {
    validate(event)?;
    let stored = client.create_event(event).await?;
    info!(event_id = stored.id, device_id = %stored.device_id, "event submitted");
    Ok(stored)
}

fn validate(event: &NewEvent) -> Result<(), CoreError> {
    if event.device_id.trim().is_empty() {
        return Err(CoreError::Validation {
            message: "device id must not be empty".into(),
        });
    }
    if event.event_type.trim().is_empty() {
        return Err(CoreError::Validation {
            message: "event type must not be empty".into(),
        });
    }
    if !(0.0..=1.0).contains(&event.confidence) {
        return Err(CoreError::Validation {
            message: format!("confidence must be within 0..=1, got {}", event.confidence),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(confidence: f64) -> NewEvent {
        NewEvent {
            device_id: "cam-01".into(),
            event_type: "person".into(),
            confidence,
            raw_data: serde_json::Value::Null,
        }
    }

    #[test]
    fn confidence_must_be_a_probability() {
        assert!(validate(&event(0.0)).is_ok());
        assert!(validate(&event(1.0)).is_ok());
        assert!(validate(&event(1.5)).is_err());
        assert!(validate(&event(f64::NAN)).is_err());
    }

    #[test]
    fn blank_device_is_rejected() {
        let mut e = event(0.5);
        e.device_id = " ".into();
        assert!(matches!(validate(&e), Err(CoreError::Validation { .. })));
    }
}
