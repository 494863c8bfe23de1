use serde::{Deserialize, Serialize};

use super::enums::{Cohort, Severity};

/// Result of classifying one symptom report. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriageDecision {
    pub patient_id: String,
    pub cohort: Cohort,
    pub severity: Severity,
    pub reason: String,
    pub escalation_required: bool,
}
