//! Lab and appointment closure journeys: due → booked → completed → reviewed.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::adherence::AdherenceEngine;
use crate::error::CareError;
use crate::models::enums::{FollowupStatus, JourneyKind, TransitionPolicy};
use crate::models::FollowupJourney;
use crate::store::CareStore;

pub struct FollowupTracker {
    store: Arc<dyn CareStore>,
    notifier: Arc<AdherenceEngine>,
    policy: TransitionPolicy,
}

impl FollowupTracker {
    pub fn new(
        store: Arc<dyn CareStore>,
        notifier: Arc<AdherenceEngine>,
        policy: TransitionPolicy,
    ) -> Self {
        Self {
            store,
            notifier,
            policy,
        }
    }

    /// Move a journey to `status`, creating it as `due` on first touch.
    ///
    /// Stamps the matching timestamp, stores the journey and sends one
    /// closure update to the patient.
    pub fn advance(
        &self,
        kind: JourneyKind,
        patient_id: &str,
        item: &str,
        status: FollowupStatus,
        when: impl Into<DateTime<Utc>>,
    ) -> Result<FollowupJourney, CareError> {
        if status == FollowupStatus::Due {
            return Err(CareError::invalid("status", status));
        }
        let when = when.into();

        let mut journey = self
            .store
            .journey(kind, patient_id, item)?
            .unwrap_or_else(|| FollowupJourney::new(kind, patient_id, item));

        if self.policy == TransitionPolicy::ForwardOnly && status.rank() < journey.status.rank() {
            return Err(CareError::invalid(
                "status",
                format!("{} -> {}", journey.status, status),
            ));
        }

        match status {
            FollowupStatus::Booked => journey.booked_at = Some(when),
            FollowupStatus::Completed => journey.completed_at = Some(when),
            FollowupStatus::Reviewed => journey.reviewed_at = Some(when),
            FollowupStatus::Due => {}
        }
        journey.status = status;
        self.store.upsert_journey(journey.clone())?;

        tracing::info!(
            patient_id = %patient_id,
            kind = kind.as_str(),
            status = status.as_str(),
            "Followup journey advanced"
        );

        match kind {
            JourneyKind::Lab => self.notifier.send_lab_closure_update(&journey),
            JourneyKind::Appointment => self.notifier.send_appointment_closure_update(&journey),
        }

        Ok(journey)
    }

    pub fn journey(
        &self,
        kind: JourneyKind,
        patient_id: &str,
        item: &str,
    ) -> Result<Option<FollowupJourney>, CareError> {
        self.store.journey(kind, patient_id, item)
    }

    pub fn journeys(&self) -> Result<Vec<FollowupJourney>, CareError> {
        self.store.journeys()
    }
}
