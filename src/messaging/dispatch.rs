use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::audit::AuditTrail;
use super::policy::PolicyDecision;
use super::templates::PATIENT_FOLLOW_UP;
use super::{MessageGateway, OutboundMessage, Payload};
use crate::error::CareError;
use crate::models::enums::{FlowAction, OutboundMode, ReasonCode};

/// What the dispatcher actually did with a reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum Delivery {
    Freeform { text: String },
    Template { name: String, variables: Payload },
    Suppressed,
}

impl Delivery {
    pub fn mode(&self) -> Option<OutboundMode> {
        match self {
            Self::Freeform { .. } => Some(OutboundMode::Freeform),
            Self::Template { .. } => Some(OutboundMode::Template),
            Self::Suppressed => None,
        }
    }
}

/// Sends a composed reply in the form a policy decision permits.
pub struct OutboundDispatcher {
    gateway: Arc<dyn MessageGateway>,
    audit: Arc<AuditTrail>,
}

impl OutboundDispatcher {
    pub fn new(gateway: Arc<dyn MessageGateway>, audit: Arc<AuditTrail>) -> Self {
        Self { gateway, audit }
    }

    /// Rejected flows send nothing. Freeform is used only when the decision
    /// allows it; otherwise the text travels as the `body` variable of a
    /// template (`patient_follow_up` unless one is named), replacing any
    /// `body` the caller supplied.
    pub fn send(
        &self,
        decision: &PolicyDecision,
        text: &str,
        template: Option<&str>,
        mut variables: Payload,
    ) -> Result<Delivery, CareError> {
        let mut reason_codes = decision.reason_codes.clone();
        let recipient = decision.patient_id.as_str();

        let delivery = if decision.flow_action == FlowAction::Reject {
            Delivery::Suppressed
        } else if decision.allow_freeform {
            self.gateway.send(OutboundMessage::freeform(recipient, text));
            Delivery::Freeform {
                text: text.to_string(),
            }
        } else {
            let name = template.unwrap_or(PATIENT_FOLLOW_UP);
            variables.insert("body".to_string(), text.to_string());
            if !reason_codes.iter().any(|c| c.requires_template()) {
                reason_codes.push(ReasonCode::TemplateRequiredOutsideWindow);
            }
            self.gateway
                .send(OutboundMessage::template(recipient, name, variables.clone()));
            Delivery::Template {
                name: name.to_string(),
                variables,
            }
        };

        self.audit
            .log_dispatch(recipient, delivery.mode(), reason_codes)?;

        tracing::debug!(
            patient_id = %recipient,
            mode = delivery.mode().map(|m| m.as_str()).unwrap_or("suppressed"),
            "Outbound reply dispatched"
        );

        Ok(delivery)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messaging::audit::AuditRecord;
    use crate::messaging::{OutboundBody, RecordingGateway};
    use std::collections::BTreeMap;

    fn decision(allow_freeform: bool, flow_action: FlowAction, codes: Vec<ReasonCode>) -> PolicyDecision {
        PolicyDecision {
            patient_id: "p1".into(),
            allow_freeform,
            outbound_mode: if allow_freeform {
                OutboundMode::Freeform
            } else {
                OutboundMode::Template
            },
            flow_action,
            escalation_actions: vec!["CALL".into()],
            reason_codes: codes,
            details: BTreeMap::new(),
        }
    }

    fn setup() -> (Arc<RecordingGateway>, Arc<AuditTrail>, OutboundDispatcher) {
        let gateway = Arc::new(RecordingGateway::new());
        let audit = Arc::new(AuditTrail::new());
        let dispatcher = OutboundDispatcher::new(gateway.clone(), audit.clone());
        (gateway, audit, dispatcher)
    }

    fn dispatch_codes(audit: &AuditTrail) -> Vec<ReasonCode> {
        match audit.records().last() {
            Some(AuditRecord::OutboundDispatch { reason_codes, .. }) => reason_codes.clone(),
            other => panic!("expected dispatch record, got {other:?}"),
        }
    }

    #[test]
    fn freeform_inside_window() {
        let (gateway, audit, dispatcher) = setup();
        let d = decision(
            true,
            FlowAction::Allow,
            vec![ReasonCode::FreeformAllowedWithinWindow, ReasonCode::HumanEscalationExposed],
        );
        let delivery = dispatcher.send(&d, "See you soon", None, Payload::new()).unwrap();

        assert_eq!(delivery.mode(), Some(OutboundMode::Freeform));
        let sent = gateway.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(
            sent[0].body,
            OutboundBody::Freeform { text: "See you soon".into() }
        );
        assert_eq!(audit.len(), 1);
    }

    #[test]
    fn template_outside_window_uses_default_name_and_body() {
        let (gateway, audit, dispatcher) = setup();
        let d = decision(
            false,
            FlowAction::Allow,
            vec![ReasonCode::TemplateRequiredOutsideWindow, ReasonCode::HumanEscalationExposed],
        );
        let delivery = dispatcher.send(&d, "Time for a check-in", None, Payload::new()).unwrap();

        match delivery {
            Delivery::Template { name, variables } => {
                assert_eq!(name, "patient_follow_up");
                assert_eq!(variables["body"], "Time for a check-in");
            }
            other => panic!("expected template, got {other:?}"),
        }
        assert_eq!(gateway.sent_with_template("patient_follow_up").len(), 1);
        assert_eq!(
            dispatch_codes(&audit),
            vec![ReasonCode::TemplateRequiredOutsideWindow, ReasonCode::HumanEscalationExposed]
        );
    }

    #[test]
    fn rerouted_template_gains_window_code() {
        let (_gateway, audit, dispatcher) = setup();
        let d = decision(
            false,
            FlowAction::Reroute,
            vec![
                ReasonCode::FreeformAllowedWithinWindow,
                ReasonCode::RegulatedContentRerouted,
                ReasonCode::HumanEscalationExposed,
            ],
        );
        dispatcher
            .send(&d, "A pharmacist will reach out", Some("pharmacist_handoff_v1"), Payload::new())
            .unwrap();
        assert!(dispatch_codes(&audit).contains(&ReasonCode::TemplateRequiredOutsideWindow));
    }

    #[test]
    fn composed_text_replaces_caller_body() {
        let (_gateway, _audit, dispatcher) = setup();
        let d = decision(
            false,
            FlowAction::Allow,
            vec![ReasonCode::TemplateRequiredNoInboundFound, ReasonCode::HumanEscalationExposed],
        );
        let mut vars = Payload::new();
        vars.insert("body".into(), "custom".into());
        vars.insert("clinic".into(), "north".into());
        let delivery = dispatcher
            .send(&d, "Reply CALL now", Some("escalate_call_v1"), vars)
            .unwrap();
        match delivery {
            Delivery::Template { variables, .. } => {
                assert_eq!(variables["body"], "Reply CALL now");
                assert_eq!(variables["clinic"], "north");
            }
            other => panic!("expected template, got {other:?}"),
        }
    }

    #[test]
    fn rejected_flow_sends_nothing_but_is_audited() {
        let (gateway, audit, dispatcher) = setup();
        let d = decision(
            false,
            FlowAction::Reject,
            vec![ReasonCode::DisallowedMedicineOrderingFlow, ReasonCode::HumanEscalationExposed],
        );
        let delivery = dispatcher.send(&d, "no", None, Payload::new()).unwrap();
        assert_eq!(delivery, Delivery::Suppressed);
        assert!(gateway.sent().is_empty());
        assert_eq!(audit.len(), 1);
    }
}
