use crate::messaging::templates::ESCALATE_CALL;
use crate::models::enums::WorkflowIntent;

pub const ESCALATION_SUFFIX: &str = " Reply CALL now for urgent support.";

pub static QUICK_REPLIES: &[&str] = &["CALL", "HELP"];

/// Reply text for an intent, before any escalation suffix.
pub fn body_for(intent: WorkflowIntent) -> &'static str {
    match intent {
        WorkflowIntent::AdherenceUpdate => {
            "Adherence update received. If you missed a dose, reply FORGOT, SIDE_EFFECT, \
             OUT_OF_STOCK, CONFUSED, COST, or OTHER."
        }
        WorkflowIntent::RefillRequest => "Refill workflow started. Reply REORDER or UPDATE COUNT.",
        WorkflowIntent::FollowupUpdate => {
            "Follow-up update received. Reply BOOKED, COMPLETED, or REVIEWED to track closure."
        }
        WorkflowIntent::PregnancyChecklist => {
            "Pregnancy checklist support is ready. Reply HELP for clinic guidance."
        }
        WorkflowIntent::SymptomReport => {
            "Thanks for sharing symptoms. A clinician may need to review this."
        }
        WorkflowIntent::GeneralQuestion => {
            "Got it. Reply HELP for support or CALL for clinician callback."
        }
    }
}

/// Composed reply: body, template (when a template send is required) and quick replies.
pub fn compose(
    intent: WorkflowIntent,
    escalation_required: bool,
    use_template: bool,
) -> (String, Option<&'static str>, Vec<String>) {
    let mut body = body_for(intent).to_string();
    if escalation_required {
        body.push_str(ESCALATION_SUFFIX);
    }
    let template = use_template.then_some(ESCALATE_CALL);
    let quick_replies = QUICK_REPLIES.iter().map(|r| r.to_string()).collect();
    (body, template, quick_replies)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adherence_body_lists_reasons() {
        assert!(body_for(WorkflowIntent::AdherenceUpdate)
            .contains("FORGOT, SIDE_EFFECT, OUT_OF_STOCK, CONFUSED, COST, or OTHER."));
    }

    #[test]
    fn escalation_appends_call_prompt() {
        let (body, _, _) = compose(WorkflowIntent::SymptomReport, true, false);
        assert!(body.ends_with("Reply CALL now for urgent support."));
    }

    #[test]
    fn template_only_when_required() {
        assert_eq!(compose(WorkflowIntent::GeneralQuestion, false, true).1, Some("escalate_call_v1"));
        assert_eq!(compose(WorkflowIntent::GeneralQuestion, false, false).1, None);
    }

    #[test]
    fn quick_replies_are_fixed() {
        let (_, _, replies) = compose(WorkflowIntent::RefillRequest, false, false);
        assert_eq!(replies, vec!["CALL", "HELP"]);
    }
}
