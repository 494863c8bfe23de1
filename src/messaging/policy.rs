//! Messaging-window policy gate.
//!
//! Decides whether an outbound reply may be freeform or must use an approved
//! template (24h after the patient's last inbound message), and whether the
//! requested flow is allowed, rerouted, or rejected. Every decision carries an
//! ordered, duplicate-free list of reason codes and is written to the audit
//! trail before it is returned.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use super::audit::AuditTrail;
use super::inbound::InboundTimestamps;
use crate::config::FREEFORM_WINDOW_HOURS;
use crate::error::CareError;
use crate::models::enums::{FlowAction, OutboundMode, ReasonCode};

/// Flows the core never executes.
pub static DISALLOWED_FLOWS: &[&str] = &[
    "order_controlled_medicine",
    "sell_prescription_without_verification",
];

/// Intents that must be handed to a human channel.
pub static REGULATED_INTENTS: &[&str] = &["medicine_ordering", "controlled_substance_request"];

/// Human paths exposed on every decision.
pub static ESCALATION_ACTIONS: &[&str] = &["CALL", "talk to pharmacist", "talk to doctor"];

// ---------------------------------------------------------------------------
// Window
// ---------------------------------------------------------------------------

/// Where `now` falls relative to the patient's freeform window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowState {
    NoInbound,
    /// Elapsed time since the last inbound message, clamped to zero.
    Within(Duration),
    Outside(Duration),
}

impl WindowState {
    pub fn allows_freeform(&self) -> bool {
        matches!(self, Self::Within(_))
    }
}

/// Inclusive window: exactly `window` elapsed is still inside.
pub fn window_state(
    last_inbound: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    window: Duration,
) -> WindowState {
    match last_inbound {
        None => WindowState::NoInbound,
        Some(last) => {
            let elapsed = (now - last).max(Duration::zero());
            if elapsed <= window {
                WindowState::Within(elapsed)
            } else {
                WindowState::Outside(elapsed)
            }
        }
    }
}

/// Drop repeated codes, keeping the first occurrence of each.
pub fn dedupe_reason_codes(codes: Vec<ReasonCode>) -> Vec<ReasonCode> {
    let mut unique = Vec::with_capacity(codes.len());
    for code in codes {
        if !unique.contains(&code) {
            unique.push(code);
        }
    }
    unique
}

// ---------------------------------------------------------------------------
// Decision
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyDecision {
    pub patient_id: String,
    pub allow_freeform: bool,
    pub outbound_mode: OutboundMode,
    pub flow_action: FlowAction,
    pub escalation_actions: Vec<String>,
    pub reason_codes: Vec<ReasonCode>,
    pub details: BTreeMap<String, String>,
}

impl PolicyDecision {
    pub fn has_reason(&self, code: ReasonCode) -> bool {
        self.reason_codes.contains(&code)
    }
}

/// The gate owns only the last-inbound map and the audit trail.
pub struct PolicyGate {
    timestamps: Arc<InboundTimestamps>,
    audit: Arc<AuditTrail>,
    window: Duration,
}

impl PolicyGate {
    pub fn new(timestamps: Arc<InboundTimestamps>, audit: Arc<AuditTrail>) -> Self {
        Self::with_window(timestamps, audit, Duration::hours(FREEFORM_WINDOW_HOURS))
    }

    pub fn with_window(
        timestamps: Arc<InboundTimestamps>,
        audit: Arc<AuditTrail>,
        window: Duration,
    ) -> Self {
        Self {
            timestamps,
            audit,
            window,
        }
    }

    /// Record an inbound message. The held time never moves backwards.
    pub fn record_inbound(
        &self,
        patient_id: &str,
        at: impl Into<DateTime<Utc>>,
    ) -> Result<(), CareError> {
        self.timestamps.set(patient_id, at)
    }

    pub fn last_inbound(&self, patient_id: &str) -> Result<Option<DateTime<Utc>>, CareError> {
        self.timestamps.get(patient_id)
    }

    pub fn audit(&self) -> &Arc<AuditTrail> {
        &self.audit
    }

    pub fn evaluate(
        &self,
        patient_id: &str,
        intent: &str,
        requested_flow: &str,
        now: impl Into<DateTime<Utc>>,
    ) -> Result<PolicyDecision, CareError> {
        let now = now.into();
        let last_inbound = self.timestamps.get(patient_id)?;

        let mut details = BTreeMap::new();
        details.insert("intent".to_string(), intent.to_string());
        details.insert("requested_flow".to_string(), requested_flow.to_string());

        let mut reason_codes = Vec::new();
        let window = window_state(last_inbound, now, self.window);
        let mut allow_freeform = window.allows_freeform();

        match window {
            WindowState::NoInbound => {
                details.insert("last_inbound".to_string(), "missing".to_string());
                reason_codes.push(ReasonCode::TemplateRequiredNoInboundFound);
            }
            WindowState::Within(elapsed) | WindowState::Outside(elapsed) => {
                if let Some(last) = last_inbound {
                    details.insert(
                        "last_inbound".to_string(),
                        last.to_rfc3339_opts(SecondsFormat::Secs, true),
                    );
                }
                details.insert(
                    "elapsed_since_last_inbound_seconds".to_string(),
                    elapsed.num_seconds().to_string(),
                );
                reason_codes.push(if allow_freeform {
                    ReasonCode::FreeformAllowedWithinWindow
                } else {
                    ReasonCode::TemplateRequiredOutsideWindow
                });
            }
        }

        let mut flow_action = FlowAction::Allow;
        if DISALLOWED_FLOWS.contains(&requested_flow) {
            flow_action = FlowAction::Reject;
            allow_freeform = false;
            reason_codes.push(ReasonCode::DisallowedMedicineOrderingFlow);
        } else if REGULATED_INTENTS.contains(&intent) {
            flow_action = FlowAction::Reroute;
            allow_freeform = false;
            reason_codes.push(ReasonCode::RegulatedContentRerouted);
        }

        reason_codes.push(ReasonCode::HumanEscalationExposed);

        let decision = PolicyDecision {
            patient_id: patient_id.to_string(),
            allow_freeform,
            outbound_mode: if allow_freeform {
                OutboundMode::Freeform
            } else {
                OutboundMode::Template
            },
            flow_action,
            escalation_actions: ESCALATION_ACTIONS.iter().map(|a| a.to_string()).collect(),
            reason_codes: dedupe_reason_codes(reason_codes),
            details,
        };

        self.audit.log_decision(&decision)?;

        tracing::info!(
            patient_id = %decision.patient_id,
            outbound_mode = decision.outbound_mode.as_str(),
            flow_action = decision.flow_action.as_str(),
            "Policy decision"
        );

        Ok(decision)
    }
}
