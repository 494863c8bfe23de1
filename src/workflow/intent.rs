use crate::models::enums::WorkflowIntent;

static ADHERENCE_KEYWORDS: &[&str] = &[
    "taken", "snooze", "skip", "missed", "forgot", "side effect", "out of stock", "confused",
    "cost",
];

static REFILL_KEYWORDS: &[&str] = &["refill", "reorder", "run out", "update count"];

static FOLLOWUP_KEYWORDS: &[&str] = &[
    "booked", "completed", "reviewed", "lab", "appointment", "follow-up", "followup",
];

static SYMPTOM_KEYWORDS: &[&str] = &[
    "symptom", "breath", "pain", "dizzy", "fever", "bleeding", "wheezing", "hypo", "high bp",
];

static PREGNANCY_KEYWORDS: &[&str] = &["pregnan", "trimester"];

/// Detection order. Earlier entries win when a message matches several.
fn intent_rules() -> Vec<(WorkflowIntent, &'static [&'static str])> {
    vec![
        (WorkflowIntent::AdherenceUpdate, ADHERENCE_KEYWORDS),
        (WorkflowIntent::RefillRequest, REFILL_KEYWORDS),
        (WorkflowIntent::FollowupUpdate, FOLLOWUP_KEYWORDS),
        (WorkflowIntent::SymptomReport, SYMPTOM_KEYWORDS),
        (WorkflowIntent::PregnancyChecklist, PREGNANCY_KEYWORDS),
    ]
}

/// `text` must already be normalized (lowercase, collapsed whitespace).
pub fn detect_intent(text: &str) -> WorkflowIntent {
    if text.is_empty() {
        return WorkflowIntent::GeneralQuestion;
    }
    intent_rules()
        .into_iter()
        .find(|(_, keywords)| keywords.iter().any(|kw| text.contains(kw)))
        .map(|(intent, _)| intent)
        .unwrap_or(WorkflowIntent::GeneralQuestion)
}
