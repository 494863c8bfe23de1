use std::collections::HashSet;

use crate::error::CareError;
use crate::models::enums::{AdherenceAction, FollowupStatus, RecoveryAction};
use crate::models::ProgramDashboard;
use crate::store::CareStore;

/// Program-level rates derived from the store. Empty denominators give 0.0.
///
/// - adherence: taken / all non-snooze events
/// - refill risk: tracked (patient, medication) pairs with a refill-support
///   recovery / all tracked pairs
/// - followup closure: reviewed journeys / all journeys
pub fn build_dashboard(store: &dyn CareStore) -> Result<ProgramDashboard, CareError> {
    let events = store.adherence_events()?;
    let recoveries = store.miss_recoveries()?;
    let journeys = store.journeys()?;

    let counted = events
        .iter()
        .filter(|e| e.action != AdherenceAction::Snooze)
        .count();
    let taken = events
        .iter()
        .filter(|e| e.action == AdherenceAction::Taken)
        .count();

    let tracked: HashSet<(&str, &str)> = events
        .iter()
        .map(|e| (e.patient_id.as_str(), e.medication.as_str()))
        .chain(
            recoveries
                .iter()
                .map(|r| (r.patient_id.as_str(), r.medication.as_str())),
        )
        .collect();
    let at_risk: HashSet<(&str, &str)> = recoveries
        .iter()
        .filter(|r| r.action == RecoveryAction::RefillSupport)
        .map(|r| (r.patient_id.as_str(), r.medication.as_str()))
        .collect();

    let reviewed = journeys
        .iter()
        .filter(|j| j.status == FollowupStatus::Reviewed)
        .count();

    let dashboard = ProgramDashboard {
        adherence_rate: ratio(taken, counted),
        refill_risk_rate: ratio(at_risk.len(), tracked.len()),
        followup_closure_rate: ratio(reviewed, journeys.len()),
    };

    tracing::debug!(
        events = events.len(),
        tracked_pairs = tracked.len(),
        journeys = journeys.len(),
        "Program dashboard built"
    );
    Ok(dashboard)
}

fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::enums::{JourneyKind, MissReason};
    use crate::models::{AdherenceEvent, FollowupJourney, MissRecoveryEvent};
    use crate::store::InMemoryStore;
    use chrono::{DateTime, Duration, TimeZone, Utc};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 5, 10, 0, 0).unwrap()
    }

    fn event(patient: &str, medication: &str, action: AdherenceAction, hours: i64) -> AdherenceEvent {
        AdherenceEvent {
            patient_id: patient.into(),
            medication: medication.into(),
            action,
            occurred_at: now() + Duration::hours(hours),
        }
    }

    #[test]
    fn empty_store_is_all_zero() {
        let store = InMemoryStore::new();
        assert_eq!(build_dashboard(&store).unwrap(), ProgramDashboard::default());
    }

    #[test]
    fn snooze_is_excluded_from_adherence() {
        let store = InMemoryStore::new();
        store.append_adherence(event("p1", "m", AdherenceAction::Taken, 0)).unwrap();
        store.append_adherence(event("p1", "m", AdherenceAction::Snooze, 1)).unwrap();
        store.append_adherence(event("p1", "m", AdherenceAction::Skip, 2)).unwrap();

        let d = build_dashboard(&store).unwrap();
        assert!((d.adherence_rate - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn refill_risk_counts_pairs_not_events() {
        let store = InMemoryStore::new();
        store.append_adherence(event("p1", "metformin", AdherenceAction::Taken, 0)).unwrap();
        store.append_adherence(event("p2", "inhaler", AdherenceAction::Skip, 0)).unwrap();
        for _ in 0..3 {
            store
                .append_miss_recovery(MissRecoveryEvent {
                    patient_id: "p2".into(),
                    medication: "inhaler".into(),
                    reason: MissReason::OutOfStock,
                    action: RecoveryAction::RefillSupport,
                    occurred_at: now(),
                })
                .unwrap();
        }

        let d = build_dashboard(&store).unwrap();
        assert!((d.refill_risk_rate - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn closure_rate_counts_reviewed_only() {
        let store = InMemoryStore::new();
        let mut reviewed = FollowupJourney::new(JourneyKind::Lab, "p1", "hba1c");
        reviewed.status = FollowupStatus::Reviewed;
        let mut booked = FollowupJourney::new(JourneyKind::Appointment, "p1", "dr_osei");
        booked.status = FollowupStatus::Booked;
        store.upsert_journey(reviewed).unwrap();
        store.upsert_journey(booked).unwrap();

        let d = build_dashboard(&store).unwrap();
        assert!((d.followup_closure_rate - 0.5).abs() < f64::EPSILON);
    }
}
