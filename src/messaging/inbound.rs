use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};

use crate::error::CareError;

/// Last inbound message time per patient. Feeds the freeform window.
#[derive(Default)]
pub struct InboundTimestamps {
    last_seen: RwLock<HashMap<String, DateTime<Utc>>>,
}

impl InboundTimestamps {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an inbound message. An older timestamp than the one held
    /// (a late delivery) leaves the window where it is.
    pub fn set(&self, patient_id: &str, at: impl Into<DateTime<Utc>>) -> Result<(), CareError> {
        self.replace(patient_id, at).map(|_| ())
    }

    pub fn get(&self, patient_id: &str) -> Result<Option<DateTime<Utc>>, CareError> {
        let last_seen = self.last_seen.read().map_err(|_| CareError::LockFailed)?;
        Ok(last_seen.get(patient_id).copied())
    }

    /// Keep the later of the held value and `at`; return the held value.
    pub fn replace(
        &self,
        patient_id: &str,
        at: impl Into<DateTime<Utc>>,
    ) -> Result<Option<DateTime<Utc>>, CareError> {
        let at = at.into();
        let mut last_seen = self.last_seen.write().map_err(|_| CareError::LockFailed)?;
        let previous = last_seen.get(patient_id).copied();
        if previous.map_or(true, |held| at > held) {
            last_seen.insert(patient_id.to_string(), at);
        }
        Ok(previous)
    }
}
