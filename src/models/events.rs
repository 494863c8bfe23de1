use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::EventType;

/// Envelope for events handed to downstream consumers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CareEvent {
    pub event_id: Uuid,
    pub event_type: EventType,
    pub patient_id: String,
    pub occurred_at: DateTime<Utc>,
    pub payload: serde_json::Value,
}

impl CareEvent {
    pub fn new(
        event_type: EventType,
        patient_id: &str,
        occurred_at: DateTime<Utc>,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            event_type,
            patient_id: patient_id.to_string(),
            occurred_at,
            payload,
        }
    }
}
