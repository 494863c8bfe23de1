//! Cohort-aware symptom triage.
//!
//! Free-text symptom reports are matched against an ordered rule list.
//! Cross-cohort red flags come first, then the patient's cohort signals,
//! then generic monitoring keywords. First match wins.

use std::str::FromStr;

use crate::error::CareError;
use crate::models::enums::{Cohort, Severity};
use crate::models::TriageDecision;

/// Reason when nothing matched.
pub const NO_RED_FLAG: &str = "no_red_flag";

struct TriageRule {
    id: &'static str,
    condition: TriageCondition,
    severity: Severity,
    reason: &'static str,
}

enum TriageCondition {
    /// Text contains any keyword, whatever the cohort.
    AnyCohort { keywords: &'static [&'static str] },
    /// Patient is in `cohort` and text contains any keyword.
    InCohort {
        cohort: Cohort,
        keywords: &'static [&'static str],
    },
}

// ── Keyword sets ────────────────────────────────────────────

static CRITICAL_KEYWORDS: &[&str] = &[
    "unconscious", "chest pain", "severe bleeding", "cannot breathe",
];

static DIABETES_KEYWORDS: &[&str] = &[
    "hypo", "low sugar", "ketone", "blurred vision", "excessive thirst", "sugar above 300",
];

static BP_KEYWORDS: &[&str] = &[
    "very high bp", "severe headache", "blurred vision", "bp above 180", "nosebleed",
];

static ASTHMA_KEYWORDS: &[&str] = &[
    "wheezing", "night awakenings", "breathless", "inhaler not helping", "tight chest",
];

static PREGNANCY_KEYWORDS: &[&str] = &[
    "bleeding", "reduced fetal movement", "severe headache", "swelling", "leaking fluid",
];

static POST_OP_KEYWORDS: &[&str] = &[
    "fever", "wound discharge", "redness spreading", "swelling", "pus", "wound opening",
];

static GENERIC_KEYWORDS: &[&str] = &["pain", "dizzy", "nausea", "weak"];

// ── Rule registry ───────────────────────────────────────────

fn rules() -> Vec<TriageRule> {
    vec![
        TriageRule {
            id: "TRI-CRIT",
            condition: TriageCondition::AnyCohort {
                keywords: CRITICAL_KEYWORDS,
            },
            severity: Severity::Critical,
            reason: "critical_red_flag",
        },
        TriageRule {
            id: "TRI-DM",
            condition: TriageCondition::InCohort {
                cohort: Cohort::Diabetes,
                keywords: DIABETES_KEYWORDS,
            },
            severity: Severity::High,
            reason: "diabetes_high_risk_signal",
        },
        TriageRule {
            id: "TRI-BP",
            condition: TriageCondition::InCohort {
                cohort: Cohort::Bp,
                keywords: BP_KEYWORDS,
            },
            severity: Severity::High,
            reason: "bp_high_risk_signal",
        },
        TriageRule {
            id: "TRI-AST",
            condition: TriageCondition::InCohort {
                cohort: Cohort::Asthma,
                keywords: ASTHMA_KEYWORDS,
            },
            severity: Severity::High,
            reason: "asthma_high_risk_signal",
        },
        TriageRule {
            id: "TRI-PREG",
            condition: TriageCondition::InCohort {
                cohort: Cohort::Pregnancy,
                keywords: PREGNANCY_KEYWORDS,
            },
            severity: Severity::High,
            reason: "pregnancy_high_risk_signal",
        },
        TriageRule {
            id: "TRI-POP",
            condition: TriageCondition::InCohort {
                cohort: Cohort::PostOp,
                keywords: POST_OP_KEYWORDS,
            },
            severity: Severity::High,
            reason: "post_op_high_risk_signal",
        },
        TriageRule {
            id: "TRI-GEN",
            condition: TriageCondition::AnyCohort {
                keywords: GENERIC_KEYWORDS,
            },
            severity: Severity::Medium,
            reason: "symptom_monitoring",
        },
    ]
}

impl TriageCondition {
    fn matches(&self, cohort: Cohort, text_lower: &str) -> bool {
        match self {
            Self::AnyCohort { keywords } => keywords.iter().any(|kw| text_lower.contains(kw)),
            Self::InCohort {
                cohort: rule_cohort,
                keywords,
            } => *rule_cohort == cohort && keywords.iter().any(|kw| text_lower.contains(kw)),
        }
    }
}

// ── Assessment ──────────────────────────────────────────────

/// Classify a symptom report. Pure; escalation follows severity.
pub fn assess(patient_id: &str, cohort: Cohort, symptom_text: &str) -> TriageDecision {
    let text_lower = symptom_text.to_lowercase();

    let (severity, reason) = rules()
        .into_iter()
        .find(|rule| rule.condition.matches(cohort, &text_lower))
        .map(|rule| {
            tracing::info!(
                rule_id = rule.id,
                cohort = cohort.as_str(),
                severity = rule.severity.as_str(),
                "Triage rule fired"
            );
            (rule.severity, rule.reason)
        })
        .unwrap_or((Severity::Low, NO_RED_FLAG));

    TriageDecision {
        patient_id: patient_id.to_string(),
        cohort,
        severity,
        reason: reason.to_string(),
        escalation_required: severity.requires_escalation(),
    }
}

/// [`assess`] with a raw cohort label. Unknown cohorts are rejected.
pub fn assess_str(
    patient_id: &str,
    cohort: &str,
    symptom_text: &str,
) -> Result<TriageDecision, CareError> {
    let cohort = Cohort::from_str(cohort)?;
    Ok(assess(patient_id, cohort, symptom_text))
}
