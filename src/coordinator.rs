//! Single handle over the care core.
//!
//! `CareCoordinator` wires the store, messaging gateway, adherence engine,
//! trackers and policy gate together so transports (the stdin binary, a
//! webhook service, tests) call one object with raw string inputs.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::adherence::{ActionOutcome, AdherenceEngine};
use crate::config::CareConfig;
use crate::db::SqliteStore;
use crate::error::CareError;
use crate::followup::FollowupTracker;
use crate::messaging::{
    AuditTrail, Delivery, InboundTimestamps, MessageGateway, OutboundDispatcher, Payload,
    PolicyDecision, PolicyGate,
};
use crate::models::enums::{
    FollowupStatus, JourneyKind, MissReason, Priority, RecoveryAction, TicketCategory,
    WorkflowIntent,
};
use crate::models::{
    CaregiverDigest, CaregiverPermissions, DoseDueEvent, FollowupJourney, HumanQueueItem,
    OpsQueueSnapshot, OpsTicket, ProgramDashboard, QueueReason, RefillForecast, Regimen,
    TriageDecision, TRIAGE_SUBJECT,
};
use crate::ops::{build_dashboard, OpsTicketRegistry};
use crate::refill::RefillForecaster;
use crate::scheduler::{emit_dose_due, DoseReminderTicker, RegimenSource};
use crate::store::{CareStore, InMemoryStore};
use crate::triage::{assess_str, priority_for};
use crate::workflow::{apply_decision, normalize_text, route_inbound, WorkflowInput, WorkflowResult};

/// Flow name used when an inbound message does not request one.
pub const DEFAULT_FLOW: &str = "reply";

/// One inbound patient message as delivered by the messaging channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundMessage {
    pub message_id: String,
    pub patient_id: String,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    pub received_at: DateTime<Utc>,
    /// Intent declared by the channel, e.g. `medicine_ordering`. Overrides
    /// the detected intent for the policy gate.
    #[serde(default)]
    pub intent: Option<String>,
    #[serde(default)]
    pub requested_flow: Option<String>,
    /// Medication the reply is about. Adherence replies are recorded only
    /// when it is present.
    #[serde(default)]
    pub medication: Option<String>,
    #[serde(default)]
    pub caregiver_alerts_enabled: bool,
    /// Cohort for symptom triage, e.g. `asthma`.
    #[serde(default)]
    pub cohort: Option<String>,
    /// Lab test or clinician a followup update refers to.
    #[serde(default)]
    pub followup_item: Option<String>,
}

/// What the core recorded for an inbound message besides the reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CareAction {
    Adherence(ActionOutcome),
    MissRecovery {
        reason: MissReason,
        action: RecoveryAction,
    },
    Triage(TriageDecision),
    Followup(FollowupJourney),
}

/// Everything decided for one inbound message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundOutcome {
    pub workflow: WorkflowResult,
    pub action: Option<CareAction>,
    pub decision: PolicyDecision,
    pub delivery: Delivery,
}

// ═══════════════════════════════════════════════════════════
// CareCoordinator
// ═══════════════════════════════════════════════════════════

pub struct CareCoordinator {
    config: CareConfig,
    store: Arc<dyn CareStore>,
    engine: Arc<AdherenceEngine>,
    refill: RefillForecaster,
    followups: FollowupTracker,
    tickets: OpsTicketRegistry,
    gate: PolicyGate,
    dispatcher: OutboundDispatcher,
}

impl CareCoordinator {
    pub fn new(
        store: Arc<dyn CareStore>,
        gateway: Arc<dyn MessageGateway>,
        config: CareConfig,
    ) -> Result<Self, CareError> {
        config.validate()?;

        let engine = Arc::new(AdherenceEngine::new(store.clone(), gateway.clone(), &config)?);
        let refill = RefillForecaster::new(config.refill_bounds.clone())?;
        let followups =
            FollowupTracker::new(store.clone(), engine.clone(), config.transition_policy);
        let tickets = OpsTicketRegistry::new(store.clone(), config.transition_policy);

        let audit = Arc::new(AuditTrail::with_store(store.clone()));
        let gate = PolicyGate::with_window(
            Arc::new(InboundTimestamps::new()),
            audit.clone(),
            config.freeform_window,
        );
        let dispatcher = OutboundDispatcher::new(gateway, audit);

        Ok(Self {
            config,
            store,
            engine,
            refill,
            followups,
            tickets,
            gate,
            dispatcher,
        })
    }

    /// Build with the store the config asks for: SQLite when a database
    /// path is set, memory otherwise.
    pub fn from_config(
        config: CareConfig,
        gateway: Arc<dyn MessageGateway>,
    ) -> Result<Self, CareError> {
        let store: Arc<dyn CareStore> = match &config.database_path {
            Some(path) => Arc::new(SqliteStore::open(path)?),
            None => Arc::new(InMemoryStore::new()),
        };
        Self::new(store, gateway, config)
    }

    pub fn config(&self) -> &CareConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn CareStore> {
        &self.store
    }

    pub fn engine(&self) -> &Arc<AdherenceEngine> {
        &self.engine
    }

    pub fn audit(&self) -> &Arc<AuditTrail> {
        self.gate.audit()
    }

    pub fn policy_gate(&self) -> &PolicyGate {
        &self.gate
    }

    /// Write buffered audit records to the store.
    pub fn flush_audit(&self) -> Result<usize, CareError> {
        self.gate.audit().flush()
    }

    // ── Adherence ──────────────────────────────────────────────

    pub fn handle_reply(
        &self,
        regimen: &Regimen,
        reply: &str,
        when: impl Into<DateTime<Utc>>,
    ) -> Result<Option<ActionOutcome>, CareError> {
        self.engine.handle_reply(regimen, Some(reply), when)
    }

    pub fn handle_missed_reason(
        &self,
        regimen: &Regimen,
        reason: &str,
        when: impl Into<DateTime<Utc>>,
    ) -> Result<RecoveryAction, CareError> {
        self.engine
            .recover_missed_dose_str(&regimen.patient_id, &regimen.medication, reason, when)
    }

    /// Emit and remind every regimen now.
    pub fn run_dose_reminders(&self, regimens: &[Regimen]) -> Vec<DoseDueEvent> {
        let events = emit_dose_due(regimens);
        for event in &events {
            self.engine.send_reminder(event);
        }
        events
    }

    /// Start a background ticker at the configured interval.
    pub fn start_reminder_ticker(&self, source: Arc<dyn RegimenSource>) -> DoseReminderTicker {
        DoseReminderTicker::start(
            self.engine.clone(),
            source,
            StdDuration::from_secs(self.config.reminder_interval_secs),
        )
    }

    /// Forecast and send one stage prompt when a stage applies.
    pub fn run_refill_check(
        &self,
        patient_id: &str,
        medication: &str,
        days_left: i64,
    ) -> Option<RefillForecast> {
        let forecast = self.refill.forecast(patient_id, medication, days_left)?;
        self.engine.send_refill_stage_prompt(&forecast);
        Some(forecast)
    }

    // ── Triage ─────────────────────────────────────────────────

    /// Assess symptoms. Escalations queue one item per (cohort, severity)
    /// and alert the patient with call-now guidance.
    pub fn run_triage(
        &self,
        patient_id: &str,
        cohort: &str,
        symptom_text: &str,
        when: impl Into<DateTime<Utc>>,
    ) -> Result<TriageDecision, CareError> {
        let decision = assess_str(patient_id, cohort, symptom_text)?;
        if !decision.escalation_required {
            return Ok(decision);
        }

        let (priority, sla_minutes) = priority_for(decision.severity);
        let queued = self.store.enqueue_if_absent(HumanQueueItem {
            patient_id: patient_id.to_string(),
            subject: TRIAGE_SUBJECT.to_string(),
            reason: QueueReason::Triage {
                cohort: decision.cohort,
                severity: decision.severity,
            },
            queued_at: when.into(),
            priority,
            sla_minutes,
        })?;
        if queued {
            self.engine.send_triage_alert(&decision);
        }

        Ok(decision)
    }

    // ── Followups ──────────────────────────────────────────────

    pub fn advance_lab_journey(
        &self,
        patient_id: &str,
        test_name: &str,
        status: &str,
        when: impl Into<DateTime<Utc>>,
    ) -> Result<FollowupJourney, CareError> {
        let status = FollowupStatus::from_str(status)?;
        self.followups
            .advance(JourneyKind::Lab, patient_id, test_name, status, when)
    }

    pub fn advance_appointment_journey(
        &self,
        patient_id: &str,
        clinician: &str,
        status: &str,
        when: impl Into<DateTime<Utc>>,
    ) -> Result<FollowupJourney, CareError> {
        let status = FollowupStatus::from_str(status)?;
        self.followups
            .advance(JourneyKind::Appointment, patient_id, clinician, status, when)
    }

    pub fn build_program_dashboard(&self) -> Result<ProgramDashboard, CareError> {
        build_dashboard(self.store.as_ref())
    }

    // ── Ops tickets ────────────────────────────────────────────

    pub fn create_ops_ticket(
        &self,
        patient_id: &str,
        category: &str,
        priority: &str,
        sla_minutes: u32,
        created_at: impl Into<DateTime<Utc>>,
        notes: Option<&str>,
    ) -> Result<OpsTicket, CareError> {
        let category = TicketCategory::from_str(category)?;
        let priority = Priority::from_str(priority)?;
        self.tickets
            .create(patient_id, category, priority, sla_minutes, created_at, notes)
    }

    pub fn acknowledge_ops_ticket(
        &self,
        ticket_id: u64,
        at: impl Into<DateTime<Utc>>,
    ) -> Result<OpsTicket, CareError> {
        self.tickets.acknowledge(ticket_id, at)
    }

    pub fn resolve_ops_ticket(
        &self,
        ticket_id: u64,
        at: impl Into<DateTime<Utc>>,
        notes: Option<&str>,
    ) -> Result<OpsTicket, CareError> {
        self.tickets.resolve(ticket_id, at, notes)
    }

    pub fn ops_ticket(&self, ticket_id: u64) -> Result<Option<OpsTicket>, CareError> {
        self.tickets.get(ticket_id)
    }

    pub fn ops_queue_snapshot(&self) -> Result<OpsQueueSnapshot, CareError> {
        self.tickets.snapshot()
    }

    // ── Caregivers ─────────────────────────────────────────────

    pub fn set_caregiver_permissions(
        &self,
        caregiver_id: &str,
        can_snooze: bool,
        can_skip: bool,
    ) -> Result<(), CareError> {
        self.store.set_caregiver_permissions(CaregiverPermissions {
            caregiver_id: caregiver_id.to_string(),
            can_snooze,
            can_skip,
        })
    }

    pub fn caregiver_permissions(
        &self,
        caregiver_id: &str,
    ) -> Result<Option<CaregiverPermissions>, CareError> {
        self.store.caregiver_permissions(caregiver_id)
    }

    /// Misses in the 24h ending at `now` (inclusive) and the patient's open alerts.
    pub fn build_caregiver_digest(
        &self,
        patient_id: &str,
        caregiver_id: &str,
        now: impl Into<DateTime<Utc>>,
    ) -> Result<CaregiverDigest, CareError> {
        let now = now.into();
        let since = now - Duration::hours(24);

        let missed = self
            .store
            .adherence_events()?
            .iter()
            .filter(|e| e.patient_id == patient_id)
            .filter(|e| e.action.is_miss())
            .filter(|e| e.occurred_at > since && e.occurred_at <= now)
            .count();
        let open_alerts = self
            .store
            .alerts()?
            .iter()
            .filter(|a| a.patient_id == patient_id && a.is_open())
            .count();

        Ok(CaregiverDigest {
            patient_id: patient_id.to_string(),
            caregiver_id: caregiver_id.to_string(),
            missed_doses_24h: u32::try_from(missed).unwrap_or(u32::MAX),
            high_risk_alerts_open: u32::try_from(open_alerts).unwrap_or(u32::MAX),
            generated_at: now,
        })
    }

    pub fn build_and_send_caregiver_digest(
        &self,
        patient_id: &str,
        caregiver_id: &str,
        now: impl Into<DateTime<Utc>>,
    ) -> Result<CaregiverDigest, CareError> {
        let digest = self.build_caregiver_digest(patient_id, caregiver_id, now)?;
        self.engine.send_caregiver_digest(&digest);
        Ok(digest)
    }

    // ── Inbound messages ───────────────────────────────────────

    /// Route, act on, gate and answer one inbound message.
    ///
    /// The message's own time is recorded first, so the router and the gate
    /// judge the window from the same timestamp. The routed result is then
    /// restated from the gate's decision.
    pub fn handle_inbound(&self, message: &InboundMessage) -> Result<InboundOutcome, CareError> {
        self.gate
            .record_inbound(&message.patient_id, message.received_at)?;
        let last_inbound = self.gate.last_inbound(&message.patient_id)?;

        let mut workflow = route_inbound(&WorkflowInput {
            message_id: message.message_id.clone(),
            patient_id: message.patient_id.clone(),
            text: message.text.clone(),
            phone: message.phone.clone(),
            last_inbound_at: last_inbound,
            now: message.received_at,
        });

        let action = self.act_on_inbound(message, workflow.intent)?;

        let intent = message
            .intent
            .as_deref()
            .unwrap_or_else(|| workflow.intent.as_str());
        let flow = message.requested_flow.as_deref().unwrap_or(DEFAULT_FLOW);
        let decision = self
            .gate
            .evaluate(&message.patient_id, intent, flow, message.received_at)?;
        apply_decision(&mut workflow, &decision);

        let delivery = self.dispatcher.send(
            &decision,
            &workflow.response_body,
            workflow.template_name.as_deref(),
            Payload::new(),
        )?;

        Ok(InboundOutcome {
            workflow,
            action,
            decision,
            delivery,
        })
    }

    /// Pass the message to the adherence engine, triage or the followup
    /// tracker. A recognized dose reply wins over the detected intent.
    fn act_on_inbound(
        &self,
        message: &InboundMessage,
        intent: WorkflowIntent,
    ) -> Result<Option<CareAction>, CareError> {
        let when = message.received_at;
        let text = message.text.as_deref().unwrap_or_default();

        if let Some(medication) = message.medication.as_deref() {
            let regimen = Regimen {
                patient_id: message.patient_id.clone(),
                medication: medication.to_string(),
                due_at: when,
                caregiver_alerts_enabled: message.caregiver_alerts_enabled,
            };
            if let Some(outcome) = self.engine.handle_reply(&regimen, Some(text), when)? {
                return Ok(Some(CareAction::Adherence(outcome)));
            }
            if intent == WorkflowIntent::AdherenceUpdate {
                if let Some(reason) = miss_reason_in(text) {
                    let action = self.engine.recover_missed_dose(
                        &message.patient_id,
                        medication,
                        reason,
                        when,
                    )?;
                    return Ok(Some(CareAction::MissRecovery { reason, action }));
                }
            }
        }

        match intent {
            WorkflowIntent::SymptomReport => {
                let Some(cohort) = message.cohort.as_deref() else {
                    return Ok(None);
                };
                let decision = self.run_triage(&message.patient_id, cohort, text, when)?;
                Ok(Some(CareAction::Triage(decision)))
            }
            WorkflowIntent::FollowupUpdate => {
                let (Some(item), Some((kind, status))) =
                    (message.followup_item.as_deref(), followup_update_in(text))
                else {
                    return Ok(None);
                };
                let journey = self
                    .followups
                    .advance(kind, &message.patient_id, item, status, when)?;
                Ok(Some(CareAction::Followup(journey)))
            }
            _ => Ok(None),
        }
    }
}

/// Miss reason named in a free-text reply. `other` must be the whole reply.
fn miss_reason_in(text: &str) -> Option<MissReason> {
    let text = normalize_text(Some(text));
    MissReason::ALL.iter().copied().find(|reason| {
        let phrase = reason.as_str().replace('_', " ");
        match reason {
            MissReason::Other => text == phrase || text == reason.as_str(),
            _ => text.contains(&phrase) || text.contains(reason.as_str()),
        }
    })
}

/// Journey kind and the furthest status a followup reply names.
fn followup_update_in(text: &str) -> Option<(JourneyKind, FollowupStatus)> {
    let text = normalize_text(Some(text));
    let status = [
        ("reviewed", FollowupStatus::Reviewed),
        ("completed", FollowupStatus::Completed),
        ("booked", FollowupStatus::Booked),
    ]
    .into_iter()
    .find(|(word, _)| text.contains(word))
    .map(|(_, status)| status)?;

    let kind = if text.contains("appointment") {
        JourneyKind::Appointment
    } else {
        JourneyKind::Lab
    };
    Some((kind, status))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messaging::templates;
    use crate::messaging::RecordingGateway;
    use crate::models::enums::{FlowAction, OutboundMode, ReasonCode, Severity, TicketStatus};
    use chrono::TimeZone;

    struct Harness {
        gateway: Arc<RecordingGateway>,
        care: CareCoordinator,
    }

    fn harness() -> Harness {
        let gateway = Arc::new(RecordingGateway::new());
        let care = CareCoordinator::new(
            Arc::new(InMemoryStore::new()),
            gateway.clone(),
            CareConfig::default(),
        )
        .unwrap();
        Harness { gateway, care }
    }

    fn at(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, day, hour, 0, 0).unwrap()
    }

    fn regimen(patient: &str, medication: &str) -> Regimen {
        Regimen {
            patient_id: patient.into(),
            medication: medication.into(),
            due_at: at(1, 9),
            caregiver_alerts_enabled: true,
        }
    }

    fn inbound(text: &str, received_at: DateTime<Utc>) -> InboundMessage {
        InboundMessage {
            message_id: "m1".into(),
            patient_id: "p1".into(),
            text: Some(text.into()),
            phone: None,
            received_at,
            intent: None,
            requested_flow: None,
            medication: None,
            caregiver_alerts_enabled: false,
            cohort: None,
            followup_item: None,
        }
    }

    fn assert_workflow_matches_decision(outcome: &InboundOutcome) {
        assert_eq!(
            outcome.workflow.use_template,
            outcome.decision.outbound_mode == OutboundMode::Template
        );
        assert_eq!(
            outcome.workflow.audit_reasons.contains(&crate::workflow::TEMPLATE_REQUIRED.to_string()),
            outcome.workflow.use_template
        );
    }

    // ── Construction ───────────────────────────────────────────

    #[test]
    fn invalid_config_rejected() {
        let config = CareConfig {
            missed_threshold: 0,
            ..CareConfig::default()
        };
        let result = CareCoordinator::new(
            Arc::new(InMemoryStore::new()),
            Arc::new(RecordingGateway::new()),
            config,
        );
        assert!(matches!(result, Err(CareError::InvalidArgument { .. })));
    }

    #[test]
    fn sqlite_store_from_config() {
        let dir = tempfile::tempdir().unwrap();
        let config = CareConfig {
            database_path: Some(dir.path().join("care.db")),
            ..CareConfig::default()
        };
        let care = CareCoordinator::from_config(config, Arc::new(RecordingGateway::new())).unwrap();
        care.handle_reply(&regimen("p1", "metformin"), "taken", at(1, 9)).unwrap();
        assert_eq!(care.store().adherence_events().unwrap().len(), 1);
    }

    // ── Adherence flows ────────────────────────────────────────

    #[test]
    fn missed_reason_side_effect_escalates() {
        let h = harness();
        let action = h
            .care
            .handle_missed_reason(&regimen("p1", "metformin"), "side_effect", at(1, 10))
            .unwrap();
        assert_eq!(action, RecoveryAction::EscalateClinician);
        assert_eq!(h.care.store().human_queue().unwrap().len(), 1);
    }

    #[test]
    fn unknown_missed_reason_rejected() {
        let h = harness();
        assert!(h
            .care
            .handle_missed_reason(&regimen("p1", "metformin"), "bored", at(1, 10))
            .is_err());
    }

    #[test]
    fn dose_reminders_sent_per_regimen() {
        let h = harness();
        let events = h
            .care
            .run_dose_reminders(&[regimen("p1", "metformin"), regimen("p2", "amlodipine")]);
        assert_eq!(events.len(), 2);
        assert_eq!(h.gateway.sent_with_template(templates::DOSE_REMINDER).len(), 2);
    }

    #[test]
    fn refill_check_sends_one_prompt_per_forecast() {
        let h = harness();
        let forecast = h.care.run_refill_check("p1", "inhaler", 2).unwrap();
        assert_eq!(forecast.stage.as_str(), "d3");
        assert!(h.care.run_refill_check("p1", "inhaler", 20).is_none());
        assert_eq!(h.gateway.sent_with_template(templates::REFILL_STAGE).len(), 1);
    }

    // ── Triage ─────────────────────────────────────────────────

    #[test]
    fn triage_escalation_queues_once() {
        let h = harness();
        for _ in 0..2 {
            let decision = h
                .care
                .run_triage("p7", "asthma", "wheezing with night awakenings", at(2, 8))
                .unwrap();
            assert_eq!(decision.severity, Severity::High);
            assert!(decision.escalation_required);
        }

        let queue = h.care.store().human_queue().unwrap();
        assert_eq!(queue.len(), 1);
        assert_eq!(queue[0].reason.to_string(), "triage_asthma_high");
        assert_eq!(queue[0].priority, Priority::P1);
        assert_eq!(queue[0].subject, TRIAGE_SUBJECT);
        assert_eq!(h.gateway.sent_with_template(templates::TRIAGE_ALERT).len(), 1);
    }

    #[test]
    fn low_severity_triage_is_silent() {
        let h = harness();
        let decision = h.care.run_triage("p1", "bp", "all fine", at(2, 8)).unwrap();
        assert_eq!(decision.severity, Severity::Low);
        assert!(h.care.store().human_queue().unwrap().is_empty());
        assert!(h.gateway.sent().is_empty());
    }

    #[test]
    fn unknown_cohort_rejected() {
        let h = harness();
        assert!(matches!(
            h.care.run_triage("p1", "cardiac", "chest pain", at(2, 8)),
            Err(CareError::InvalidArgument { .. })
        ));
    }

    // ── Followups and dashboard ────────────────────────────────

    #[test]
    fn closure_loops_and_dashboard() {
        let h = harness();
        let reg = regimen("p-clinic", "metformin");
        h.care.handle_reply(&reg, "taken", at(5, 10)).unwrap();
        h.care.handle_reply(&reg, "skip", at(5, 11)).unwrap();
        h.care.handle_missed_reason(&reg, "out_of_stock", at(5, 12)).unwrap();

        let lab = h.care.advance_lab_journey("p-clinic", "HbA1c", "booked", at(5, 10)).unwrap();
        assert_eq!(lab.status, FollowupStatus::Booked);
        let lab = h.care.advance_lab_journey("p-clinic", "HbA1c", "reviewed", at(6, 10)).unwrap();
        assert_eq!(lab.status, FollowupStatus::Reviewed);

        h.care
            .advance_appointment_journey("p-clinic", "Dr. A", "completed", at(5, 10))
            .unwrap();
        h.care
            .advance_appointment_journey("p-clinic", "Dr. A", "reviewed", at(6, 10))
            .unwrap();

        let dashboard = h.care.build_program_dashboard().unwrap();
        assert!((dashboard.adherence_rate - 0.5).abs() < f64::EPSILON);
        assert!((dashboard.refill_risk_rate - 1.0).abs() < f64::EPSILON);
        assert!((dashboard.followup_closure_rate - 1.0).abs() < f64::EPSILON);

        assert_eq!(h.gateway.sent_with_template(templates::LAB_CLOSURE_UPDATE).len(), 2);
        assert_eq!(
            h.gateway.sent_with_template(templates::APPOINTMENT_CLOSURE_UPDATE).len(),
            2
        );
    }

    #[test]
    fn unknown_followup_status_rejected() {
        let h = harness();
        assert!(h.care.advance_lab_journey("p1", "HbA1c", "cancelled", at(5, 10)).is_err());
    }

    // ── Ops tickets ────────────────────────────────────────────

    #[test]
    fn ticket_lifecycle_through_facade() {
        let h = harness();
        let t1 = h.care.create_ops_ticket("p-1", "triage", "p1", 15, at(6, 10), None).unwrap();
        let t2 = h.care.create_ops_ticket("p-2", "followup", "p2", 60, at(6, 10), None).unwrap();

        h.care.acknowledge_ops_ticket(t1.ticket_id, at(6, 11)).unwrap();
        h.care
            .resolve_ops_ticket(t1.ticket_id, at(6, 12), Some("called patient"))
            .unwrap();

        let snapshot = h.care.ops_queue_snapshot().unwrap();
        assert_eq!(
            (snapshot.open, snapshot.acknowledged, snapshot.resolved, snapshot.total),
            (1, 0, 1, 2)
        );
        let t1 = h.care.ops_ticket(t1.ticket_id).unwrap().unwrap();
        assert_eq!(t1.notes.as_deref(), Some("called patient"));
        assert_eq!(
            h.care.ops_ticket(t2.ticket_id).unwrap().unwrap().status,
            TicketStatus::Open
        );
    }

    #[test]
    fn ticket_with_unknown_priority_rejected() {
        let h = harness();
        assert!(h.care.create_ops_ticket("p", "triage", "urgent", 15, at(6, 10), None).is_err());
    }

    // ── Caregivers ─────────────────────────────────────────────

    #[test]
    fn digest_counts_last_24h_misses_and_open_alerts() {
        let h = harness();
        let now = at(3, 9);
        let reg = regimen("patient-99", "amlodipine");
        h.care.handle_reply(&reg, "skip", now - Duration::hours(3)).unwrap();
        h.care.handle_reply(&reg, "skip", now - Duration::hours(2)).unwrap();
        // Outside the window.
        h.care
            .handle_reply(&regimen("patient-99", "metformin"), "skip", now - Duration::hours(25))
            .unwrap();

        let digest = h.care.build_and_send_caregiver_digest("patient-99", "cg-1", now).unwrap();
        assert_eq!(digest.missed_doses_24h, 2);
        assert_eq!(digest.high_risk_alerts_open, 1);

        let sent = h.gateway.sent_with_template(templates::CAREGIVER_DAILY_DIGEST);
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "cg-1");
    }

    #[test]
    fn caregiver_permissions_persist() {
        let h = harness();
        h.care.set_caregiver_permissions("cg-55", true, false).unwrap();
        let perms = h.care.caregiver_permissions("cg-55").unwrap().unwrap();
        assert!(perms.can_snooze);
        assert!(!perms.can_skip);
        assert!(h.care.caregiver_permissions("cg-00").unwrap().is_none());
    }

    // ── Inbound messages ───────────────────────────────────────

    #[test]
    fn first_inbound_replies_freeform_and_audits() {
        let h = harness();
        let outcome = h.care.handle_inbound(&inbound("Lab booked", at(4, 10))).unwrap();

        assert!(!outcome.workflow.use_template);
        assert!(outcome.workflow.template_name.is_none());
        assert_eq!(outcome.workflow.policy_reason, crate::workflow::POLICY_WITHIN_WINDOW);
        assert_eq!(outcome.decision.outbound_mode, OutboundMode::Freeform);
        assert!(outcome.action.is_none());
        assert_eq!(outcome.delivery.mode(), Some(OutboundMode::Freeform));
        assert_eq!(h.gateway.sent().len(), 1);
        // One decision record and one dispatch record.
        assert_eq!(h.care.audit().len(), 2);
        assert_eq!(
            h.care.policy_gate().last_inbound("p1").unwrap(),
            Some(at(4, 10))
        );
    }

    #[test]
    fn workflow_agrees_with_sent_mode() {
        let h = harness();
        let mut rerouted = inbound("can you send my meds", at(4, 11));
        rerouted.intent = Some("medicine_ordering".into());
        let mut rejected = inbound("order codeine", at(4, 12));
        rejected.requested_flow = Some("order_controlled_medicine".into());

        for msg in [
            inbound("Lab booked", at(4, 10)),
            inbound("Need refill, I might run out", at(5, 16)),
            rerouted,
            rejected,
        ] {
            let outcome = h.care.handle_inbound(&msg).unwrap();
            assert_workflow_matches_decision(&outcome);
        }
    }

    #[test]
    fn late_inbound_keeps_window_open() {
        let h = harness();
        h.care.handle_inbound(&inbound("hello", at(4, 10))).unwrap();
        // Delivered after the message above but stamped a day earlier.
        let late = h.care.handle_inbound(&inbound("hello again", at(3, 9))).unwrap();
        assert_workflow_matches_decision(&late);
        assert_eq!(h.care.policy_gate().last_inbound("p1").unwrap(), Some(at(4, 10)));

        let decision = h
            .care
            .policy_gate()
            .evaluate("p1", "general_question", DEFAULT_FLOW, at(5, 6))
            .unwrap();
        assert_eq!(decision.outbound_mode, OutboundMode::Freeform);
        assert!(decision.has_reason(ReasonCode::FreeformAllowedWithinWindow));
    }

    // ── Inbound care actions ───────────────────────────────────

    #[test]
    fn numeric_dose_reply_is_recorded() {
        let h = harness();
        let mut msg = inbound("3", at(4, 10));
        msg.medication = Some("metformin".into());
        let outcome = h.care.handle_inbound(&msg).unwrap();

        match &outcome.action {
            Some(CareAction::Adherence(result)) => {
                assert_eq!(result.action.as_str(), "skip");
                assert_eq!(result.streak, 1);
            }
            other => panic!("expected adherence action, got {other:?}"),
        }
        let ledger = h.care.store().adherence_for("p1", "metformin").unwrap();
        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger[0].occurred_at, at(4, 10));
    }

    #[test]
    fn dose_reply_without_medication_is_not_recorded() {
        let h = harness();
        let outcome = h.care.handle_inbound(&inbound("skip", at(4, 10))).unwrap();
        assert!(outcome.action.is_none());
        assert!(h.care.store().adherence_events().unwrap().is_empty());
    }

    #[test]
    fn miss_reason_reply_records_recovery() {
        let h = harness();
        let mut msg = inbound("I had a side effect", at(4, 10));
        msg.medication = Some("metformin".into());
        let outcome = h.care.handle_inbound(&msg).unwrap();

        assert_eq!(
            outcome.action,
            Some(CareAction::MissRecovery {
                reason: MissReason::SideEffect,
                action: RecoveryAction::EscalateClinician,
            })
        );
        assert_eq!(h.care.store().miss_recoveries().unwrap().len(), 1);
        assert_eq!(h.care.store().human_queue().unwrap().len(), 1);
    }

    #[test]
    fn symptom_with_cohort_is_triaged() {
        let h = harness();
        let mut msg = inbound("wheezing with night awakenings", at(4, 10));
        msg.cohort = Some("asthma".into());
        let outcome = h.care.handle_inbound(&msg).unwrap();

        match &outcome.action {
            Some(CareAction::Triage(decision)) => assert!(decision.escalation_required),
            other => panic!("expected triage action, got {other:?}"),
        }
        assert_eq!(h.gateway.sent_with_template(templates::TRIAGE_ALERT).len(), 1);
    }

    #[test]
    fn symptom_with_unknown_cohort_is_rejected() {
        let h = harness();
        let mut msg = inbound("chest pain", at(4, 10));
        msg.cohort = Some("cardiac".into());
        assert!(matches!(
            h.care.handle_inbound(&msg),
            Err(CareError::InvalidArgument { .. })
        ));
    }

    #[test]
    fn followup_reply_advances_journey() {
        let h = harness();
        let mut msg = inbound("Appointment completed", at(4, 10));
        msg.followup_item = Some("Dr. A".into());
        let outcome = h.care.handle_inbound(&msg).unwrap();

        match &outcome.action {
            Some(CareAction::Followup(journey)) => {
                assert_eq!(journey.kind, JourneyKind::Appointment);
                assert_eq!(journey.status, FollowupStatus::Completed);
                assert_eq!(journey.completed_at, Some(at(4, 10)));
            }
            other => panic!("expected followup action, got {other:?}"),
        }
    }

    #[test]
    fn followup_reply_without_item_is_not_tracked() {
        let h = harness();
        let outcome = h.care.handle_inbound(&inbound("Lab booked", at(4, 10))).unwrap();
        assert!(outcome.action.is_none());
        assert!(h.care.followups.journeys().unwrap().is_empty());
    }

    #[test]
    fn reply_parsers() {
        assert_eq!(miss_reason_in("Out of stock again"), Some(MissReason::OutOfStock));
        assert_eq!(miss_reason_in("FORGOT"), Some(MissReason::Forgot));
        assert_eq!(miss_reason_in("other"), Some(MissReason::Other));
        assert_eq!(miss_reason_in("my mother helped"), None);
        assert_eq!(
            followup_update_in("lab done, results reviewed"),
            Some((JourneyKind::Lab, FollowupStatus::Reviewed))
        );
        assert_eq!(followup_update_in("lab soon"), None);
    }

    // ── Audit persistence ──────────────────────────────────────

    #[test]
    fn audit_trail_flushes_to_sqlite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("care.db");
        let config = CareConfig {
            database_path: Some(path.clone()),
            ..CareConfig::default()
        };
        let care = CareCoordinator::from_config(config, Arc::new(RecordingGateway::new())).unwrap();
        care.handle_inbound(&inbound("hello", at(4, 10))).unwrap();
        assert_eq!(care.flush_audit().unwrap(), 2);
        assert!(care.audit().is_empty());
        drop(care);

        let reopened = SqliteStore::open(&path).unwrap();
        let records = reopened.audit_records().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].record_type(), "policy_decision");
        assert_eq!(records[1].record_type(), "outbound_dispatch");
    }

    #[test]
    fn regulated_intent_is_rerouted_to_template() {
        let h = harness();
        let mut msg = inbound("can you send my meds", at(4, 10));
        msg.intent = Some("medicine_ordering".into());
        let outcome = h.care.handle_inbound(&msg).unwrap();

        assert_eq!(outcome.decision.flow_action, FlowAction::Reroute);
        match &outcome.delivery {
            Delivery::Template { name, .. } => assert_eq!(name, "escalate_call_v1"),
            other => panic!("expected template delivery, got {other:?}"),
        }
    }

    #[test]
    fn disallowed_flow_sends_nothing() {
        let h = harness();
        let mut msg = inbound("order codeine", at(4, 10));
        msg.requested_flow = Some("order_controlled_medicine".into());
        let outcome = h.care.handle_inbound(&msg).unwrap();

        assert_eq!(outcome.decision.flow_action, FlowAction::Reject);
        assert!(outcome
            .decision
            .has_reason(ReasonCode::DisallowedMedicineOrderingFlow));
        assert_eq!(outcome.delivery, Delivery::Suppressed);
        assert!(h.gateway.sent().is_empty());
    }

    #[test]
    fn inbound_message_parses_from_json_line() {
        let line = r#"{"message_id":"m9","patient_id":"p1","text":"Lab booked","received_at":"2026-01-04T10:00:00Z"}"#;
        let msg: InboundMessage = serde_json::from_str(line).unwrap();
        assert_eq!(msg.received_at, at(4, 10));
        assert!(msg.requested_flow.is_none());
    }
}
