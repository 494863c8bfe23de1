use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::policy::{PolicyDecision, ESCALATION_ACTIONS};
use crate::error::CareError;
use crate::models::enums::{FlowAction, OutboundMode, ReasonCode};
use crate::store::CareStore;

/// Buffered records that trigger a flush to the store. A trail without a
/// store keeps only this many, dropping the oldest.
pub const AUDIT_BUFFER_CAPACITY: usize = 100;

/// A single append-only audit entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuditRecord {
    PolicyDecision {
        record_id: Uuid,
        patient_id: String,
        outbound_mode: OutboundMode,
        flow_action: FlowAction,
        reason_codes: Vec<ReasonCode>,
        details: BTreeMap<String, String>,
        logged_at: DateTime<Utc>,
    },
    OutboundDispatch {
        record_id: Uuid,
        patient_id: String,
        /// None when the flow was rejected and nothing was sent.
        mode: Option<OutboundMode>,
        reason_codes: Vec<ReasonCode>,
        logged_at: DateTime<Utc>,
    },
}

impl AuditRecord {
    pub fn record_id(&self) -> Uuid {
        match self {
            Self::PolicyDecision { record_id, .. } | Self::OutboundDispatch { record_id, .. } => {
                *record_id
            }
        }
    }

    pub fn patient_id(&self) -> &str {
        match self {
            Self::PolicyDecision { patient_id, .. } => patient_id,
            Self::OutboundDispatch { patient_id, .. } => patient_id,
        }
    }

    pub fn logged_at(&self) -> DateTime<Utc> {
        match self {
            Self::PolicyDecision { logged_at, .. } | Self::OutboundDispatch { logged_at, .. } => {
                *logged_at
            }
        }
    }

    /// Same string as the serialized `type` tag.
    pub fn record_type(&self) -> &'static str {
        match self {
            Self::PolicyDecision { .. } => "policy_decision",
            Self::OutboundDispatch { .. } => "outbound_dispatch",
        }
    }
}

/// Append-only audit buffer. Records are never mutated after logging.
///
/// With a store attached, the buffer is flushed to it whenever it reaches
/// [`AUDIT_BUFFER_CAPACITY`] and on [`AuditTrail::flush`].
#[derive(Default)]
pub struct AuditTrail {
    buffer: Mutex<Vec<AuditRecord>>,
    sink: Option<Arc<dyn CareStore>>,
}

impl AuditTrail {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_store(store: Arc<dyn CareStore>) -> Self {
        Self {
            buffer: Mutex::new(Vec::with_capacity(AUDIT_BUFFER_CAPACITY)),
            sink: Some(store),
        }
    }

    /// Log a policy decision after checking it is internally consistent.
    pub fn log_decision(&self, decision: &PolicyDecision) -> Result<(), CareError> {
        validate_decision(decision)?;
        self.push(AuditRecord::PolicyDecision {
            record_id: Uuid::new_v4(),
            patient_id: decision.patient_id.clone(),
            outbound_mode: decision.outbound_mode,
            flow_action: decision.flow_action,
            reason_codes: decision.reason_codes.clone(),
            details: decision.details.clone(),
            logged_at: Utc::now(),
        })
    }

    /// Log a decision supplied as raw strings, e.g. replayed from another
    /// service. Unknown modes, actions or reason codes are rejected.
    pub fn log_raw_decision(
        &self,
        patient_id: &str,
        outbound_mode: &str,
        flow_action: &str,
        reason_codes: &[&str],
        details: BTreeMap<String, String>,
    ) -> Result<(), CareError> {
        let outbound_mode = OutboundMode::from_str(outbound_mode)?;
        let flow_action = FlowAction::from_str(flow_action)?;
        let reason_codes = reason_codes
            .iter()
            .map(|c| ReasonCode::from_str(c))
            .collect::<Result<Vec<_>, _>>()?;

        self.log_decision(&PolicyDecision {
            patient_id: patient_id.to_string(),
            allow_freeform: outbound_mode == OutboundMode::Freeform,
            outbound_mode,
            flow_action,
            escalation_actions: ESCALATION_ACTIONS.iter().map(|a| a.to_string()).collect(),
            reason_codes,
            details,
        })
    }

    pub fn log_dispatch(
        &self,
        patient_id: &str,
        mode: Option<OutboundMode>,
        reason_codes: Vec<ReasonCode>,
    ) -> Result<(), CareError> {
        self.push(AuditRecord::OutboundDispatch {
            record_id: Uuid::new_v4(),
            patient_id: patient_id.to_string(),
            mode,
            reason_codes,
            logged_at: Utc::now(),
        })
    }

    /// Buffered records not yet flushed.
    pub fn records(&self) -> Vec<AuditRecord> {
        self.buffer
            .lock()
            .map(|buf| buf.clone())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.buffer.lock().map(|buf| buf.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn drain(&self) -> Vec<AuditRecord> {
        self.buffer
            .lock()
            .map(|mut buf| buf.drain(..).collect())
            .unwrap_or_default()
    }

    /// Move every buffered record to the store. On failure the records go
    /// back to the front of the buffer for the next attempt.
    pub fn flush(&self) -> Result<usize, CareError> {
        let Some(sink) = &self.sink else {
            return Ok(0);
        };
        let records = self.drain();
        if records.is_empty() {
            return Ok(0);
        }

        if let Err(e) = sink.append_audit_records(&records) {
            let mut buf = self.buffer.lock().map_err(|_| CareError::LockFailed)?;
            buf.splice(0..0, records);
            return Err(e);
        }

        let count = records.len();
        tracing::debug!(count, "Flushed audit records to store");
        Ok(count)
    }

    fn push(&self, record: AuditRecord) -> Result<(), CareError> {
        let full = {
            let mut buf = self.buffer.lock().map_err(|_| CareError::LockFailed)?;
            buf.push(record);
            if self.sink.is_none() && buf.len() > AUDIT_BUFFER_CAPACITY {
                let excess = buf.len() - AUDIT_BUFFER_CAPACITY;
                buf.drain(..excess);
            }
            buf.len() >= AUDIT_BUFFER_CAPACITY
        };

        if full && self.sink.is_some() {
            if let Err(e) = self.flush() {
                tracing::warn!(error = %e, "Audit flush failed, records stay buffered");
            }
        }
        Ok(())
    }
}

fn validate_decision(decision: &PolicyDecision) -> Result<(), CareError> {
    let expected_mode = if decision.allow_freeform {
        OutboundMode::Freeform
    } else {
        OutboundMode::Template
    };
    if decision.outbound_mode != expected_mode {
        return Err(CareError::invalid("outbound_mode", decision.outbound_mode));
    }

    if decision.flow_action != FlowAction::Allow && decision.allow_freeform {
        return Err(CareError::invalid("flow_action", decision.flow_action));
    }

    if !decision.reason_codes.contains(&ReasonCode::HumanEscalationExposed) {
        return Err(CareError::invalid(
            "reason_codes",
            "missing HUMAN_ESCALATION_EXPOSED",
        ));
    }

    for (i, code) in decision.reason_codes.iter().enumerate() {
        if decision.reason_codes[..i].contains(code) {
            return Err(CareError::invalid("reason_codes", format!("duplicate {code}")));
        }
    }

    Ok(())
}
