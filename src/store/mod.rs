//! Repository seam for the core's derived entities.
//!
//! One handle (`Arc<dyn CareStore>`) is injected into every component.
//! Dedupe of alerts and queue items is an atomic insert-if-absent on the
//! store itself, never a read followed by a conditional write.

pub mod memory;

pub use memory::InMemoryStore;

use chrono::{DateTime, Utc};

use crate::error::CareError;
use crate::messaging::AuditRecord;
use crate::models::enums::JourneyKind;
use crate::models::{
    AdherenceEvent, Alert, AlertReason, CaregiverPermissions, FollowupJourney, HumanQueueItem,
    MissRecoveryEvent, NewOpsTicket, OpsTicket,
};

pub trait CareStore: Send + Sync {
    // ── Adherence ledger ────────────────────────────────────

    /// Append an event, keeping each (patient, medication) slice ordered by time.
    fn append_adherence(&self, event: AdherenceEvent) -> Result<(), CareError>;

    /// Ledger slice for one pair, oldest first.
    fn adherence_for(
        &self,
        patient_id: &str,
        medication: &str,
    ) -> Result<Vec<AdherenceEvent>, CareError>;

    fn adherence_events(&self) -> Result<Vec<AdherenceEvent>, CareError>;

    // ── Alerts ──────────────────────────────────────────────

    /// Store the alert unless an open alert with the same key exists.
    /// Returns true if stored.
    fn open_alert_if_absent(&self, alert: Alert) -> Result<bool, CareError>;

    /// Close the open alert with this key. Returns true if one was closed.
    fn close_alert(
        &self,
        patient_id: &str,
        medication: &str,
        reason: AlertReason,
        closed_at: DateTime<Utc>,
    ) -> Result<bool, CareError>;

    fn alerts(&self) -> Result<Vec<Alert>, CareError>;

    // ── Human queue ─────────────────────────────────────────

    /// Enqueue unless the same (patient, subject, reason) is already queued.
    /// Returns true if enqueued.
    fn enqueue_if_absent(&self, item: HumanQueueItem) -> Result<bool, CareError>;

    fn human_queue(&self) -> Result<Vec<HumanQueueItem>, CareError>;

    // ── Miss recovery ───────────────────────────────────────

    fn append_miss_recovery(&self, event: MissRecoveryEvent) -> Result<(), CareError>;

    fn miss_recoveries(&self) -> Result<Vec<MissRecoveryEvent>, CareError>;

    // ── Followup journeys ───────────────────────────────────

    fn journey(
        &self,
        kind: JourneyKind,
        patient_id: &str,
        item: &str,
    ) -> Result<Option<FollowupJourney>, CareError>;

    /// Insert or overwrite by (kind, patient, item). Last writer wins.
    fn upsert_journey(&self, journey: FollowupJourney) -> Result<(), CareError>;

    fn journeys(&self) -> Result<Vec<FollowupJourney>, CareError>;

    // ── Ops tickets ─────────────────────────────────────────

    /// Allocate the next sequential id and store the ticket as open.
    fn insert_ticket(&self, ticket: NewOpsTicket) -> Result<OpsTicket, CareError>;

    /// Overwrite an existing ticket. NotFound if the id is unknown.
    fn update_ticket(&self, ticket: &OpsTicket) -> Result<(), CareError>;

    fn ticket(&self, ticket_id: u64) -> Result<Option<OpsTicket>, CareError>;

    fn tickets(&self) -> Result<Vec<OpsTicket>, CareError>;

    // ── Caregivers ──────────────────────────────────────────

    fn set_caregiver_permissions(&self, permissions: CaregiverPermissions)
        -> Result<(), CareError>;

    fn caregiver_permissions(
        &self,
        caregiver_id: &str,
    ) -> Result<Option<CaregiverPermissions>, CareError>;

    // ── Audit ───────────────────────────────────────────────

    /// Append a batch of audit records. All or none are stored.
    fn append_audit_records(&self, records: &[AuditRecord]) -> Result<(), CareError>;

    /// Stored audit records in append order.
    fn audit_records(&self) -> Result<Vec<AuditRecord>, CareError>;
}
