use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::enums::{FollowupStatus, JourneyKind};

/// Lab or appointment closure journey keyed by (kind, patient, item).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FollowupJourney {
    pub kind: JourneyKind,
    pub patient_id: String,
    /// Lab test name or clinician/appointment identifier.
    pub item: String,
    pub status: FollowupStatus,
    pub booked_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub reviewed_at: Option<DateTime<Utc>>,
}

impl FollowupJourney {
    pub fn new(kind: JourneyKind, patient_id: &str, item: &str) -> Self {
        Self {
            kind,
            patient_id: patient_id.to_string(),
            item: item.to_string(),
            status: FollowupStatus::Due,
            booked_at: None,
            completed_at: None,
            reviewed_at: None,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.status == FollowupStatus::Reviewed
    }
}
