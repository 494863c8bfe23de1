use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What a caregiver may report on a patient's behalf.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaregiverPermissions {
    pub caregiver_id: String,
    pub can_snooze: bool,
    pub can_skip: bool,
}

/// Daily caregiver summary. Aggregate counts only, no health details.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaregiverDigest {
    pub patient_id: String,
    pub caregiver_id: String,
    pub missed_doses_24h: u32,
    pub high_risk_alerts_open: u32,
    pub generated_at: DateTime<Utc>,
}
