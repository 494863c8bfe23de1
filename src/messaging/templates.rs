use chrono::{DateTime, Utc};

use super::Payload;
use crate::models::enums::{Cohort, FollowupStatus, RefillStage, Severity};

pub const DOSE_REMINDER: &str = "dose_reminder_v1";
pub const MISSED_REASON_PROMPT: &str = "missed_reason_prompt_v1";
pub const DOSE_MISSED_FOLLOWUP: &str = "dose_missed_followup_v1";
pub const CAREGIVER_MISSED_STREAK: &str = "caregiver_missed_streak_v1";
pub const REFILL_STAGE: &str = "refill_stage_v1";
pub const TRIAGE_ALERT: &str = "triage_alert_v1";
pub const CAREGIVER_DAILY_DIGEST: &str = "caregiver_daily_digest_v1";
pub const LAB_CLOSURE_UPDATE: &str = "lab_closure_update_v1";
pub const APPOINTMENT_CLOSURE_UPDATE: &str = "appointment_closure_update_v1";
pub const ESCALATE_CALL: &str = "escalate_call_v1";
/// Fallback when a template send is forced and the caller names none.
pub const PATIENT_FOLLOW_UP: &str = "patient_follow_up";

/// Reply options offered by the miss-reason prompt.
pub const MISS_REASON_OPTIONS: &str = "FORGOT, SIDE_EFFECT, OUT_OF_STOCK, CONFUSED, COST, OTHER";

/// Recipient id for a patient's caregiver channel.
pub fn caregiver_recipient(patient_id: &str) -> String {
    format!("caregiver:{patient_id}")
}

/// Payload builders for every template the core sends.
pub struct MessageTemplates;

impl MessageTemplates {
    pub fn dose_reminder(medication: &str, due_at: &DateTime<Utc>) -> Payload {
        payload(&[("medication", medication.to_string()), ("due_at", due_at.to_rfc3339())])
    }

    pub fn missed_reason_prompt(medication: &str) -> Payload {
        payload(&[
            ("medication", medication.to_string()),
            ("options", MISS_REASON_OPTIONS.to_string()),
        ])
    }

    /// Shared by the patient follow-up and the caregiver streak notice.
    pub fn missed_streak(medication: &str, streak: u32) -> Payload {
        payload(&[("medication", medication.to_string()), ("streak", streak.to_string())])
    }

    pub fn refill_stage(medication: &str, stage: RefillStage, days_left: i64) -> Payload {
        payload(&[
            ("medication", medication.to_string()),
            ("stage", stage.to_string()),
            ("days_left", days_left.to_string()),
        ])
    }

    pub fn triage_alert(cohort: Cohort, severity: Severity, reason: &str) -> Payload {
        payload(&[
            ("cohort", cohort.to_string()),
            ("severity", severity.to_string()),
            ("reason", reason.to_string()),
        ])
    }

    pub fn caregiver_digest(
        patient_id: &str,
        missed_doses_24h: u32,
        high_risk_alerts_open: u32,
    ) -> Payload {
        payload(&[
            ("patient_id", patient_id.to_string()),
            ("missed_doses_24h", missed_doses_24h.to_string()),
            ("high_risk_alerts_open", high_risk_alerts_open.to_string()),
        ])
    }

    pub fn lab_closure(test_name: &str, status: FollowupStatus) -> Payload {
        payload(&[("test_name", test_name.to_string()), ("status", status.to_string())])
    }

    pub fn appointment_closure(clinician: &str, status: FollowupStatus) -> Payload {
        payload(&[("clinician", clinician.to_string()), ("status", status.to_string())])
    }
}

fn payload(pairs: &[(&str, String)]) -> Payload {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn caregiver_recipient_prefixes_patient() {
        assert_eq!(caregiver_recipient("p7"), "caregiver:p7");
    }

    #[test]
    fn missed_streak_payload() {
        let p = MessageTemplates::missed_streak("amlodipine", 2);
        assert_eq!(p["medication"], "amlodipine");
        assert_eq!(p["streak"], "2");
        assert_eq!(p.len(), 2);
    }

    #[test]
    fn reminder_carries_due_time() {
        let due = Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap();
        let p = MessageTemplates::dose_reminder("amlodipine", &due);
        assert_eq!(p["due_at"], "2026-03-01T09:00:00+00:00");
    }

    #[test]
    fn refill_payload_uses_stage_label() {
        let p = MessageTemplates::refill_stage("inhaler", RefillStage::D3, 2);
        assert_eq!(p["stage"], "d3");
        assert_eq!(p["days_left"], "2");
    }

    #[test]
    fn closure_payloads_carry_status() {
        assert_eq!(
            MessageTemplates::lab_closure("hba1c", FollowupStatus::Booked)["status"],
            "booked"
        );
        assert_eq!(
            MessageTemplates::appointment_closure("dr_osei", FollowupStatus::Reviewed)["clinician"],
            "dr_osei"
        );
    }

    #[test]
    fn template_names_are_versioned() {
        for name in [
            DOSE_REMINDER,
            MISSED_REASON_PROMPT,
            DOSE_MISSED_FOLLOWUP,
            CAREGIVER_MISSED_STREAK,
            REFILL_STAGE,
            TRIAGE_ALERT,
            CAREGIVER_DAILY_DIGEST,
            LAB_CLOSURE_UPDATE,
            APPOINTMENT_CLOSURE_UPDATE,
            ESCALATE_CALL,
        ] {
            assert!(name.ends_with("_v1"), "{name} is not versioned");
        }
    }
}
