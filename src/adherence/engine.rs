use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::normalizer::normalize_reply;
use super::recovery::resolve_recovery;
use super::streak::missed_streak;
use crate::config::CareConfig;
use crate::error::CareError;
use crate::messaging::templates::{self, caregiver_recipient, MessageTemplates};
use crate::messaging::{MessageGateway, OutboundMessage};
use crate::models::enums::{
    AdherenceAction, MissReason, RecoveryAction, Severity, SnoozePolicy,
};
use crate::models::{
    AdherenceEvent, Alert, AlertReason, CaregiverDigest, DoseDueEvent, FollowupJourney,
    HumanQueueItem, MissRecoveryEvent, QueueReason, RefillForecast, Regimen, TriageDecision,
};
use crate::store::CareStore;
use crate::triage::priority_for;

/// What one recorded action led to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionOutcome {
    pub action: AdherenceAction,
    pub streak: u32,
    pub alert_opened: bool,
    pub queued: bool,
    pub prompted: bool,
}

/// Per-(patient, medication) streak state machine over the shared ledger.
pub struct AdherenceEngine {
    store: Arc<dyn CareStore>,
    gateway: Arc<dyn MessageGateway>,
    missed_threshold: u32,
    snooze_policy: SnoozePolicy,
}

impl AdherenceEngine {
    pub fn new(
        store: Arc<dyn CareStore>,
        gateway: Arc<dyn MessageGateway>,
        config: &CareConfig,
    ) -> Result<Self, CareError> {
        if config.missed_threshold < 1 {
            return Err(CareError::invalid("missed_threshold", config.missed_threshold));
        }
        Ok(Self {
            store,
            gateway,
            missed_threshold: config.missed_threshold,
            snooze_policy: config.snooze_policy,
        })
    }

    pub fn missed_threshold(&self) -> u32 {
        self.missed_threshold
    }

    /// Normalize a free-text reply and record it. Unrecognized replies
    /// record nothing and return None.
    pub fn handle_reply(
        &self,
        regimen: &Regimen,
        reply: Option<&str>,
        when: impl Into<DateTime<Utc>>,
    ) -> Result<Option<ActionOutcome>, CareError> {
        match normalize_reply(reply) {
            Some(action) => self.record_action(regimen, action, when).map(Some),
            None => {
                tracing::debug!(patient_id = %regimen.patient_id, "Unrecognized adherence reply");
                Ok(None)
            }
        }
    }

    pub fn record_action_str(
        &self,
        regimen: &Regimen,
        action: &str,
        when: impl Into<DateTime<Utc>>,
    ) -> Result<ActionOutcome, CareError> {
        let action = AdherenceAction::from_str(action)?;
        self.record_action(regimen, action, when)
    }

    /// Append the action to the ledger and evaluate the missed-dose streak.
    ///
    /// Below threshold, a trailing skip/missed gets a miss-reason prompt.
    /// At or above threshold, the alert for this exact depth is opened at most
    /// once; only the call that opens it notifies the patient, the caregiver
    /// (when enabled) and the human queue.
    pub fn record_action(
        &self,
        regimen: &Regimen,
        action: AdherenceAction,
        when: impl Into<DateTime<Utc>>,
    ) -> Result<ActionOutcome, CareError> {
        let when = when.into();
        self.store.append_adherence(AdherenceEvent {
            patient_id: regimen.patient_id.clone(),
            medication: regimen.medication.clone(),
            action,
            occurred_at: when,
        })?;

        let events = self
            .store
            .adherence_for(&regimen.patient_id, &regimen.medication)?;
        let streak = missed_streak(&events, self.snooze_policy);

        let mut outcome = ActionOutcome {
            action,
            streak,
            alert_opened: false,
            queued: false,
            prompted: false,
        };

        if streak < self.missed_threshold {
            let latest_is_miss = events.last().is_some_and(|e| e.action.is_miss());
            if latest_is_miss {
                self.send_missed_reason_prompt(&regimen.patient_id, &regimen.medication);
                outcome.prompted = true;
            }
            return Ok(outcome);
        }

        let reason = AlertReason::MissedStreak(streak);
        outcome.alert_opened = self.store.open_alert_if_absent(Alert {
            patient_id: regimen.patient_id.clone(),
            medication: regimen.medication.clone(),
            reason,
            opened_at: when,
            closed_at: None,
        })?;
        if !outcome.alert_opened {
            return Ok(outcome);
        }

        tracing::warn!(
            patient_id = %regimen.patient_id,
            streak,
            threshold = self.missed_threshold,
            "Missed-dose streak alert opened"
        );

        self.gateway.send(OutboundMessage::template(
            &regimen.patient_id,
            templates::DOSE_MISSED_FOLLOWUP,
            MessageTemplates::missed_streak(&regimen.medication, streak),
        ));
        if regimen.caregiver_alerts_enabled {
            self.gateway.send(OutboundMessage::template(
                &caregiver_recipient(&regimen.patient_id),
                templates::CAREGIVER_MISSED_STREAK,
                MessageTemplates::missed_streak(&regimen.medication, streak),
            ));
        }

        let (priority, sla_minutes) = priority_for(Severity::High);
        outcome.queued = self.store.enqueue_if_absent(HumanQueueItem {
            patient_id: regimen.patient_id.clone(),
            subject: regimen.medication.clone(),
            reason: QueueReason::HighRiskMissedDoses(streak),
            queued_at: when,
            priority,
            sla_minutes,
        })?;

        Ok(outcome)
    }

    pub fn recover_missed_dose_str(
        &self,
        patient_id: &str,
        medication: &str,
        reason: &str,
        when: impl Into<DateTime<Utc>>,
    ) -> Result<RecoveryAction, CareError> {
        let reason = MissReason::from_str(reason)?;
        self.recover_missed_dose(patient_id, medication, reason, when)
    }

    /// Map a disclosed miss reason to its remediation and record it.
    /// Clinician escalations also get one p1 queue item per reason.
    pub fn recover_missed_dose(
        &self,
        patient_id: &str,
        medication: &str,
        reason: MissReason,
        when: impl Into<DateTime<Utc>>,
    ) -> Result<RecoveryAction, CareError> {
        let when = when.into();
        let action = resolve_recovery(reason);

        self.store.append_miss_recovery(MissRecoveryEvent {
            patient_id: patient_id.to_string(),
            medication: medication.to_string(),
            reason,
            action,
            occurred_at: when,
        })?;

        // Queue only once the recovery itself is on record.
        if action == RecoveryAction::EscalateClinician {
            let (priority, sla_minutes) = priority_for(Severity::High);
            self.store.enqueue_if_absent(HumanQueueItem {
                patient_id: patient_id.to_string(),
                subject: medication.to_string(),
                reason: QueueReason::MissRecovery(reason),
                queued_at: when,
                priority,
                sla_minutes,
            })?;
        }

        tracing::info!(
            patient_id = %patient_id,
            reason = reason.as_str(),
            action = action.as_str(),
            "Miss recovery recorded"
        );

        Ok(action)
    }

    /// Close an open streak alert so the same depth may alert again later.
    pub fn close_alert(
        &self,
        patient_id: &str,
        medication: &str,
        reason: AlertReason,
        at: impl Into<DateTime<Utc>>,
    ) -> Result<bool, CareError> {
        self.store.close_alert(patient_id, medication, reason, at.into())
    }

    // ── Outbound payloads ──────────────────────────────────────

    pub fn send_reminder(&self, dose: &DoseDueEvent) {
        self.gateway.send(OutboundMessage::template(
            &dose.patient_id,
            templates::DOSE_REMINDER,
            MessageTemplates::dose_reminder(&dose.medication, &dose.due_at),
        ));
    }

    pub fn send_missed_reason_prompt(&self, patient_id: &str, medication: &str) {
        self.gateway.send(OutboundMessage::template(
            patient_id,
            templates::MISSED_REASON_PROMPT,
            MessageTemplates::missed_reason_prompt(medication),
        ));
    }

    pub fn send_refill_stage_prompt(&self, forecast: &RefillForecast) {
        self.gateway.send(OutboundMessage::template(
            &forecast.patient_id,
            templates::REFILL_STAGE,
            MessageTemplates::refill_stage(&forecast.medication, forecast.stage, forecast.days_left),
        ));
    }

    pub fn send_triage_alert(&self, decision: &TriageDecision) {
        self.gateway.send(OutboundMessage::template(
            &decision.patient_id,
            templates::TRIAGE_ALERT,
            MessageTemplates::triage_alert(decision.cohort, decision.severity, &decision.reason),
        ));
    }

    pub fn send_caregiver_digest(&self, digest: &CaregiverDigest) {
        self.gateway.send(OutboundMessage::template(
            &digest.caregiver_id,
            templates::CAREGIVER_DAILY_DIGEST,
            MessageTemplates::caregiver_digest(
                &digest.patient_id,
                digest.missed_doses_24h,
                digest.high_risk_alerts_open,
            ),
        ));
    }

    pub fn send_lab_closure_update(&self, journey: &FollowupJourney) {
        self.gateway.send(OutboundMessage::template(
            &journey.patient_id,
            templates::LAB_CLOSURE_UPDATE,
            MessageTemplates::lab_closure(&journey.item, journey.status),
        ));
    }

    pub fn send_appointment_closure_update(&self, journey: &FollowupJourney) {
        self.gateway.send(OutboundMessage::template(
            &journey.patient_id,
            templates::APPOINTMENT_CLOSURE_UPDATE,
            MessageTemplates::appointment_closure(&journey.item, journey.status),
        ));
    }
}
