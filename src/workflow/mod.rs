//! Inbound message router: intent detection, messaging-window check,
//! risk triage and reply composition, one decision per message.

pub mod compose;
pub mod intent;
pub mod risk;

pub use intent::detect_intent;
pub use risk::{assess_risk, RiskAssessment};

use std::sync::LazyLock;

use chrono::{DateTime, Duration, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::config::FREEFORM_WINDOW_HOURS;
use crate::messaging::policy::{window_state, PolicyDecision, WindowState};
use crate::messaging::templates::ESCALATE_CALL;
use crate::models::enums::{OutboundMode, ReasonCode, Severity, WorkflowIntent};

pub const POLICY_NO_INBOUND: &str = "No prior inbound message timestamp; require template send";
pub const POLICY_WITHIN_WINDOW: &str = "Within 24h freeform allowed";
pub const POLICY_OUTSIDE_WINDOW: &str = "Outside 24h template required";
pub const TEMPLATE_REQUIRED: &str = "template_required";

static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowInput {
    pub message_id: String,
    pub patient_id: String,
    pub text: Option<String>,
    pub phone: Option<String>,
    /// Last inbound message before this one.
    pub last_inbound_at: Option<DateTime<Utc>>,
    pub now: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowResult {
    pub intent: WorkflowIntent,
    pub risk_level: Severity,
    pub use_template: bool,
    pub policy_reason: String,
    pub escalation_required: bool,
    pub escalation_reason: Option<String>,
    pub response_body: String,
    pub template_name: Option<String>,
    pub quick_replies: Vec<String>,
    pub audit_reasons: Vec<String>,
}

/// Trim, collapse whitespace runs and lowercase.
pub fn normalize_text(text: Option<&str>) -> String {
    let text = text.unwrap_or_default().trim();
    WHITESPACE.replace_all(text, " ").to_lowercase()
}

/// Freeform decision and its human-readable reason.
fn window_policy(last_inbound_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> (bool, &'static str) {
    match window_state(last_inbound_at, now, Duration::hours(FREEFORM_WINDOW_HOURS)) {
        WindowState::NoInbound => (true, POLICY_NO_INBOUND),
        WindowState::Within(_) => (false, POLICY_WITHIN_WINDOW),
        WindowState::Outside(_) => (true, POLICY_OUTSIDE_WINDOW),
    }
}

/// Route one inbound message. Pure: no store, gateway or audit access.
pub fn route_inbound(input: &WorkflowInput) -> WorkflowResult {
    let text = normalize_text(input.text.as_deref());

    let intent = detect_intent(&text);
    let (use_template, policy_reason) = window_policy(input.last_inbound_at, input.now);
    let risk = assess_risk(intent, &text);
    let (body, template_name, quick_replies) =
        compose::compose(intent, risk.escalation_required, use_template);

    let audit_reasons = audit_reasons(policy_reason, risk.reason, use_template);

    tracing::info!(
        message_id = %input.message_id,
        patient_id = %input.patient_id,
        intent = intent.as_str(),
        risk = risk.level.as_str(),
        use_template,
        "Inbound message routed"
    );

    WorkflowResult {
        intent,
        risk_level: risk.level,
        use_template,
        policy_reason: policy_reason.to_string(),
        escalation_required: risk.escalation_required,
        escalation_reason: risk.reason.map(str::to_string),
        response_body: body,
        template_name: template_name.map(str::to_string),
        quick_replies,
        audit_reasons,
    }
}

fn audit_reasons(policy_reason: &str, risk_reason: Option<&str>, use_template: bool) -> Vec<String> {
    let mut reasons = vec![policy_reason.to_string()];
    if let Some(reason) = risk_reason {
        reasons.push(reason.to_string());
    }
    if use_template {
        reasons.push(TEMPLATE_REQUIRED.to_string());
    }
    reasons
}

/// Restate the window fields of a routed result from the policy gate's
/// decision, so the result describes the send that actually happens.
pub fn apply_decision(result: &mut WorkflowResult, decision: &PolicyDecision) {
    let use_template = decision.outbound_mode == OutboundMode::Template;
    let policy_reason = if decision.has_reason(ReasonCode::TemplateRequiredNoInboundFound) {
        POLICY_NO_INBOUND
    } else if decision.has_reason(ReasonCode::TemplateRequiredOutsideWindow) {
        POLICY_OUTSIDE_WINDOW
    } else {
        POLICY_WITHIN_WINDOW
    };

    let mut reasons = audit_reasons(policy_reason, result.escalation_reason.as_deref(), use_template);
    reasons.extend(
        decision
            .reason_codes
            .iter()
            .filter(|c| {
                matches!(
                    c,
                    ReasonCode::RegulatedContentRerouted | ReasonCode::DisallowedMedicineOrderingFlow
                )
            })
            .map(|c| c.as_str().to_string()),
    );

    result.use_template = use_template;
    result.policy_reason = policy_reason.to_string();
    result.template_name = use_template.then(|| ESCALATE_CALL.to_string());
    result.audit_reasons = reasons;
}
