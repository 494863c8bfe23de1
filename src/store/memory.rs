use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};

use super::CareStore;
use crate::error::CareError;
use crate::messaging::AuditRecord;
use crate::models::enums::JourneyKind;
use crate::models::{
    AdherenceEvent, Alert, AlertReason, CaregiverPermissions, FollowupJourney, HumanQueueItem,
    MissRecoveryEvent, NewOpsTicket, OpsTicket,
};

type JourneyKey = (JourneyKind, String, String);

struct TicketTable {
    next_id: u64,
    rows: Vec<OpsTicket>,
}

/// In-memory store backed by one RwLock per collection.
pub struct InMemoryStore {
    ledger: RwLock<Vec<AdherenceEvent>>,
    alerts: RwLock<Vec<Alert>>,
    queue: RwLock<Vec<HumanQueueItem>>,
    recoveries: RwLock<Vec<MissRecoveryEvent>>,
    journeys: RwLock<HashMap<JourneyKey, FollowupJourney>>,
    tickets: RwLock<TicketTable>,
    caregivers: RwLock<HashMap<String, CaregiverPermissions>>,
    audit: RwLock<Vec<AuditRecord>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            ledger: RwLock::new(Vec::new()),
            alerts: RwLock::new(Vec::new()),
            queue: RwLock::new(Vec::new()),
            recoveries: RwLock::new(Vec::new()),
            journeys: RwLock::new(HashMap::new()),
            tickets: RwLock::new(TicketTable {
                next_id: 1,
                rows: Vec::new(),
            }),
            caregivers: RwLock::new(HashMap::new()),
            audit: RwLock::new(Vec::new()),
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CareStore for InMemoryStore {
    fn append_adherence(&self, event: AdherenceEvent) -> Result<(), CareError> {
        let mut ledger = self.ledger.write().map_err(|_| CareError::LockFailed)?;
        // Ledger stays sorted; equal timestamps keep arrival order.
        let idx = ledger.partition_point(|e| e.occurred_at <= event.occurred_at);
        ledger.insert(idx, event);
        Ok(())
    }

    fn adherence_for(
        &self,
        patient_id: &str,
        medication: &str,
    ) -> Result<Vec<AdherenceEvent>, CareError> {
        let ledger = self.ledger.read().map_err(|_| CareError::LockFailed)?;
        Ok(ledger
            .iter()
            .filter(|e| e.patient_id == patient_id && e.medication == medication)
            .cloned()
            .collect())
    }

    fn adherence_events(&self) -> Result<Vec<AdherenceEvent>, CareError> {
        let ledger = self.ledger.read().map_err(|_| CareError::LockFailed)?;
        Ok(ledger.clone())
    }

    fn open_alert_if_absent(&self, alert: Alert) -> Result<bool, CareError> {
        let mut alerts = self.alerts.write().map_err(|_| CareError::LockFailed)?;

        let already_open = alerts
            .iter()
            .any(|existing| existing.is_open() && existing.same_key(&alert));
        if already_open {
            tracing::debug!(
                patient_id = %alert.patient_id,
                reason = %alert.reason,
                "Alert already open, skipping"
            );
            return Ok(false);
        }

        alerts.push(alert);
        Ok(true)
    }

    fn close_alert(
        &self,
        patient_id: &str,
        medication: &str,
        reason: AlertReason,
        closed_at: DateTime<Utc>,
    ) -> Result<bool, CareError> {
        let mut alerts = self.alerts.write().map_err(|_| CareError::LockFailed)?;

        let open = alerts.iter_mut().find(|a| {
            a.is_open() && a.patient_id == patient_id && a.medication == medication && a.reason == reason
        });
        match open {
            Some(alert) => {
                alert.closed_at = Some(closed_at);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn alerts(&self) -> Result<Vec<Alert>, CareError> {
        let alerts = self.alerts.read().map_err(|_| CareError::LockFailed)?;
        Ok(alerts.clone())
    }

    fn enqueue_if_absent(&self, item: HumanQueueItem) -> Result<bool, CareError> {
        let mut queue = self.queue.write().map_err(|_| CareError::LockFailed)?;

        if queue.iter().any(|existing| existing.same_key(&item)) {
            tracing::debug!(
                patient_id = %item.patient_id,
                reason = %item.reason,
                "Queue item already present, skipping"
            );
            return Ok(false);
        }

        queue.push(item);
        Ok(true)
    }

    fn human_queue(&self) -> Result<Vec<HumanQueueItem>, CareError> {
        let queue = self.queue.read().map_err(|_| CareError::LockFailed)?;
        Ok(queue.clone())
    }

    fn append_miss_recovery(&self, event: MissRecoveryEvent) -> Result<(), CareError> {
        let mut recoveries = self.recoveries.write().map_err(|_| CareError::LockFailed)?;
        recoveries.push(event);
        Ok(())
    }

    fn miss_recoveries(&self) -> Result<Vec<MissRecoveryEvent>, CareError> {
        let recoveries = self.recoveries.read().map_err(|_| CareError::LockFailed)?;
        Ok(recoveries.clone())
    }

    fn journey(
        &self,
        kind: JourneyKind,
        patient_id: &str,
        item: &str,
    ) -> Result<Option<FollowupJourney>, CareError> {
        let journeys = self.journeys.read().map_err(|_| CareError::LockFailed)?;
        Ok(journeys
            .get(&(kind, patient_id.to_string(), item.to_string()))
            .cloned())
    }

    fn upsert_journey(&self, journey: FollowupJourney) -> Result<(), CareError> {
        let mut journeys = self.journeys.write().map_err(|_| CareError::LockFailed)?;
        let key = (journey.kind, journey.patient_id.clone(), journey.item.clone());
        journeys.insert(key, journey);
        Ok(())
    }

    fn journeys(&self) -> Result<Vec<FollowupJourney>, CareError> {
        let journeys = self.journeys.read().map_err(|_| CareError::LockFailed)?;
        Ok(journeys.values().cloned().collect())
    }

    fn insert_ticket(&self, ticket: NewOpsTicket) -> Result<OpsTicket, CareError> {
        let mut table = self.tickets.write().map_err(|_| CareError::LockFailed)?;
        let stored = ticket.into_ticket(table.next_id);
        table.next_id += 1;
        table.rows.push(stored.clone());
        Ok(stored)
    }

    fn update_ticket(&self, ticket: &OpsTicket) -> Result<(), CareError> {
        let mut table = self.tickets.write().map_err(|_| CareError::LockFailed)?;
        let slot = table
            .rows
            .iter_mut()
            .find(|t| t.ticket_id == ticket.ticket_id)
            .ok_or_else(|| CareError::not_found("ops_ticket", ticket.ticket_id))?;
        *slot = ticket.clone();
        Ok(())
    }

    fn ticket(&self, ticket_id: u64) -> Result<Option<OpsTicket>, CareError> {
        let table = self.tickets.read().map_err(|_| CareError::LockFailed)?;
        Ok(table.rows.iter().find(|t| t.ticket_id == ticket_id).cloned())
    }

    fn tickets(&self) -> Result<Vec<OpsTicket>, CareError> {
        let table = self.tickets.read().map_err(|_| CareError::LockFailed)?;
        Ok(table.rows.clone())
    }

    fn set_caregiver_permissions(
        &self,
        permissions: CaregiverPermissions,
    ) -> Result<(), CareError> {
        let mut caregivers = self.caregivers.write().map_err(|_| CareError::LockFailed)?;
        caregivers.insert(permissions.caregiver_id.clone(), permissions);
        Ok(())
    }

    fn caregiver_permissions(
        &self,
        caregiver_id: &str,
    ) -> Result<Option<CaregiverPermissions>, CareError> {
        let caregivers = self.caregivers.read().map_err(|_| CareError::LockFailed)?;
        Ok(caregivers.get(caregiver_id).cloned())
    }

    fn append_audit_records(&self, records: &[AuditRecord]) -> Result<(), CareError> {
        let mut audit = self.audit.write().map_err(|_| CareError::LockFailed)?;
        audit.extend_from_slice(records);
        Ok(())
    }

    fn audit_records(&self) -> Result<Vec<AuditRecord>, CareError> {
        let audit = self.audit.read().map_err(|_| CareError::LockFailed)?;
        Ok(audit.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::enums::{AdherenceAction, Priority, TicketCategory, TicketStatus};
    use crate::models::QueueReason;
    use chrono::{Duration, TimeZone};
    use std::sync::Arc;

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, hour, 0, 0).unwrap()
    }

    fn event(action: AdherenceAction, when: DateTime<Utc>) -> AdherenceEvent {
        AdherenceEvent {
            patient_id: "p1".into(),
            medication: "metformin".into(),
            action,
            occurred_at: when,
        }
    }

    fn alert(streak: u32) -> Alert {
        Alert {
            patient_id: "p1".into(),
            medication: "metformin".into(),
            reason: AlertReason::MissedStreak(streak),
            opened_at: at(9),
            closed_at: None,
        }
    }

    fn queue_item(streak: u32) -> HumanQueueItem {
        HumanQueueItem {
            patient_id: "p1".into(),
            subject: "metformin".into(),
            reason: QueueReason::HighRiskMissedDoses(streak),
            queued_at: at(9),
            priority: Priority::P1,
            sla_minutes: 15,
        }
    }

    fn new_ticket(patient: &str) -> NewOpsTicket {
        NewOpsTicket {
            patient_id: patient.into(),
            category: TicketCategory::Triage,
            priority: Priority::P1,
            sla_minutes: 15,
            created_at: at(10),
            notes: None,
        }
    }

    // ── Ledger ─────────────────────────────────────────────────

    #[test]
    fn ledger_orders_by_time_even_when_appended_late() {
        let store = InMemoryStore::new();
        store.append_adherence(event(AdherenceAction::Skip, at(12))).unwrap();
        store.append_adherence(event(AdherenceAction::Taken, at(9))).unwrap();

        let slice = store.adherence_for("p1", "metformin").unwrap();
        assert_eq!(slice[0].action, AdherenceAction::Taken);
        assert_eq!(slice[1].action, AdherenceAction::Skip);
    }

    #[test]
    fn ledger_ties_keep_arrival_order() {
        let store = InMemoryStore::new();
        store.append_adherence(event(AdherenceAction::Taken, at(9))).unwrap();
        store.append_adherence(event(AdherenceAction::Skip, at(9))).unwrap();

        let slice = store.adherence_for("p1", "metformin").unwrap();
        assert_eq!(slice.last().unwrap().action, AdherenceAction::Skip);
    }

    #[test]
    fn ledger_slices_are_scoped_to_pair() {
        let store = InMemoryStore::new();
        store.append_adherence(event(AdherenceAction::Skip, at(9))).unwrap();
        assert!(store.adherence_for("p1", "insulin").unwrap().is_empty());
        assert!(store.adherence_for("p2", "metformin").unwrap().is_empty());
    }

    // ── Alerts ─────────────────────────────────────────────────

    #[test]
    fn alert_insert_is_idempotent_while_open() {
        let store = InMemoryStore::new();
        assert!(store.open_alert_if_absent(alert(2)).unwrap());
        assert!(!store.open_alert_if_absent(alert(2)).unwrap());
        assert!(store.open_alert_if_absent(alert(3)).unwrap());
        assert_eq!(store.alerts().unwrap().len(), 2);
    }

    #[test]
    fn closed_alert_can_reopen() {
        let store = InMemoryStore::new();
        store.open_alert_if_absent(alert(2)).unwrap();
        assert!(store
            .close_alert("p1", "metformin", AlertReason::MissedStreak(2), at(11))
            .unwrap());
        assert!(store.open_alert_if_absent(alert(2)).unwrap());

        let open = store.alerts().unwrap().iter().filter(|a| a.is_open()).count();
        assert_eq!(open, 1);
    }

    #[test]
    fn closing_unknown_alert_is_noop() {
        let store = InMemoryStore::new();
        assert!(!store
            .close_alert("p1", "metformin", AlertReason::MissedStreak(2), at(11))
            .unwrap());
    }

    #[test]
    fn concurrent_alert_opens_store_exactly_one() {
        let store = Arc::new(InMemoryStore::new());
        let opened: usize = std::thread::scope(|s| {
            let handles: Vec<_> = (0..8)
                .map(|_| {
                    let store = Arc::clone(&store);
                    s.spawn(move || store.open_alert_if_absent(alert(2)).unwrap())
                })
                .collect();
            handles
                .into_iter()
                .map(|h| h.join().unwrap())
                .filter(|stored| *stored)
                .count()
        });
        assert_eq!(opened, 1);
        assert_eq!(store.alerts().unwrap().len(), 1);
    }

    // ── Queue ──────────────────────────────────────────────────

    #[test]
    fn queue_dedupes_same_triple() {
        let store = InMemoryStore::new();
        assert!(store.enqueue_if_absent(queue_item(2)).unwrap());
        let mut later = queue_item(2);
        later.queued_at = at(9) + Duration::hours(5);
        assert!(!store.enqueue_if_absent(later).unwrap());
        assert!(store.enqueue_if_absent(queue_item(3)).unwrap());
        assert_eq!(store.human_queue().unwrap().len(), 2);
    }

    // ── Tickets ────────────────────────────────────────────────

    #[test]
    fn ticket_ids_are_sequential_from_one() {
        let store = InMemoryStore::new();
        let first = store.insert_ticket(new_ticket("p1")).unwrap();
        let second = store.insert_ticket(new_ticket("p2")).unwrap();
        assert_eq!(first.ticket_id, 1);
        assert_eq!(second.ticket_id, 2);
        assert_eq!(first.status, TicketStatus::Open);
    }

    #[test]
    fn update_unknown_ticket_is_not_found() {
        let store = InMemoryStore::new();
        let ghost = new_ticket("p1").into_ticket(99);
        let err = store.update_ticket(&ghost).unwrap_err();
        assert!(matches!(err, CareError::NotFound { .. }));
    }

    // ── Journeys & caregivers ──────────────────────────────────

    #[test]
    fn journey_upsert_overwrites_by_key() {
        let store = InMemoryStore::new();
        let mut journey = FollowupJourney::new(JourneyKind::Lab, "p1", "hba1c");
        store.upsert_journey(journey.clone()).unwrap();
        journey.status = crate::models::enums::FollowupStatus::Booked;
        store.upsert_journey(journey).unwrap();

        assert_eq!(store.journeys().unwrap().len(), 1);
        let stored = store.journey(JourneyKind::Lab, "p1", "hba1c").unwrap().unwrap();
        assert_eq!(stored.status, crate::models::enums::FollowupStatus::Booked);
        assert!(store
            .journey(JourneyKind::Appointment, "p1", "hba1c")
            .unwrap()
            .is_none());
    }

    #[test]
    fn caregiver_permissions_round_trip() {
        let store = InMemoryStore::new();
        store
            .set_caregiver_permissions(CaregiverPermissions {
                caregiver_id: "cg1".into(),
                can_snooze: true,
                can_skip: false,
            })
            .unwrap();
        let perms = store.caregiver_permissions("cg1").unwrap().unwrap();
        assert!(perms.can_snooze);
        assert!(!perms.can_skip);
        assert!(store.caregiver_permissions("cg2").unwrap().is_none());
    }
}
