use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::enums::{Priority, TicketCategory, TicketStatus};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpsTicket {
    pub ticket_id: u64,
    pub patient_id: String,
    pub category: TicketCategory,
    pub priority: Priority,
    pub sla_minutes: u32,
    pub status: TicketStatus,
    pub created_at: DateTime<Utc>,
    pub acknowledged_at: Option<DateTime<Utc>>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
}

/// Ticket fields supplied by the caller; the store allocates the id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewOpsTicket {
    pub patient_id: String,
    pub category: TicketCategory,
    pub priority: Priority,
    pub sla_minutes: u32,
    pub created_at: DateTime<Utc>,
    pub notes: Option<String>,
}

impl NewOpsTicket {
    pub fn into_ticket(self, ticket_id: u64) -> OpsTicket {
        OpsTicket {
            ticket_id,
            patient_id: self.patient_id,
            category: self.category,
            priority: self.priority,
            sla_minutes: self.sla_minutes,
            status: TicketStatus::Open,
            created_at: self.created_at,
            acknowledged_at: None,
            resolved_at: None,
            notes: self.notes,
        }
    }
}

/// Ticket counts by status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpsQueueSnapshot {
    pub open: u32,
    pub acknowledged: u32,
    pub resolved: u32,
    pub total: u32,
}

/// Program-level rates, each a fraction in [0, 1].
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ProgramDashboard {
    pub adherence_rate: f64,
    pub refill_risk_rate: f64,
    pub followup_closure_rate: f64,
}
