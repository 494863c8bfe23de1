use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::error::CareError;
use crate::models::enums::{Priority, Severity, TicketCategory, TicketStatus, TransitionPolicy};
use crate::models::{NewOpsTicket, OpsQueueSnapshot, OpsTicket};
use crate::store::CareStore;
use crate::triage::priority_for;

/// Ticket lifecycle open → acknowledged → resolved over the shared store.
pub struct OpsTicketRegistry {
    store: Arc<dyn CareStore>,
    policy: TransitionPolicy,
}

impl OpsTicketRegistry {
    pub fn new(store: Arc<dyn CareStore>, policy: TransitionPolicy) -> Self {
        Self { store, policy }
    }

    pub fn create(
        &self,
        patient_id: &str,
        category: TicketCategory,
        priority: Priority,
        sla_minutes: u32,
        created_at: impl Into<DateTime<Utc>>,
        notes: Option<&str>,
    ) -> Result<OpsTicket, CareError> {
        let ticket = self.store.insert_ticket(NewOpsTicket {
            patient_id: patient_id.to_string(),
            category,
            priority,
            sla_minutes,
            created_at: created_at.into(),
            notes: notes.map(str::to_string),
        })?;

        tracing::info!(
            ticket_id = ticket.ticket_id,
            category = category.as_str(),
            priority = priority.as_str(),
            "Ops ticket created"
        );
        Ok(ticket)
    }

    /// Create with priority and SLA taken from the severity table.
    pub fn create_for_severity(
        &self,
        patient_id: &str,
        category: TicketCategory,
        severity: Severity,
        created_at: impl Into<DateTime<Utc>>,
        notes: Option<&str>,
    ) -> Result<OpsTicket, CareError> {
        let (priority, sla_minutes) = priority_for(severity);
        self.create(patient_id, category, priority, sla_minutes, created_at, notes)
    }

    pub fn acknowledge(
        &self,
        ticket_id: u64,
        at: impl Into<DateTime<Utc>>,
    ) -> Result<OpsTicket, CareError> {
        let mut ticket = self.require(ticket_id)?;
        if self.policy == TransitionPolicy::ForwardOnly && ticket.status == TicketStatus::Resolved {
            return Err(CareError::invalid("status", "resolved -> acknowledged"));
        }

        ticket.status = TicketStatus::Acknowledged;
        ticket.acknowledged_at = Some(at.into());
        self.store.update_ticket(&ticket)?;

        tracing::info!(ticket_id, "Ops ticket acknowledged");
        Ok(ticket)
    }

    /// Resolve a ticket. Existing notes are replaced only when `notes` is given.
    pub fn resolve(
        &self,
        ticket_id: u64,
        at: impl Into<DateTime<Utc>>,
        notes: Option<&str>,
    ) -> Result<OpsTicket, CareError> {
        let mut ticket = self.require(ticket_id)?;

        ticket.status = TicketStatus::Resolved;
        ticket.resolved_at = Some(at.into());
        if let Some(notes) = notes {
            ticket.notes = Some(notes.to_string());
        }
        self.store.update_ticket(&ticket)?;

        tracing::info!(ticket_id, "Ops ticket resolved");
        Ok(ticket)
    }

    pub fn get(&self, ticket_id: u64) -> Result<Option<OpsTicket>, CareError> {
        self.store.ticket(ticket_id)
    }

    pub fn snapshot(&self) -> Result<OpsQueueSnapshot, CareError> {
        let tickets = self.store.tickets()?;
        let mut snapshot = OpsQueueSnapshot::default();
        for ticket in &tickets {
            match ticket.status {
                TicketStatus::Open => snapshot.open += 1,
                TicketStatus::Acknowledged => snapshot.acknowledged += 1,
                TicketStatus::Resolved => snapshot.resolved += 1,
            }
        }
        snapshot.total = snapshot.open + snapshot.acknowledged + snapshot.resolved;
        Ok(snapshot)
    }

    fn require(&self, ticket_id: u64) -> Result<OpsTicket, CareError> {
        self.store
            .ticket(ticket_id)?
            .ok_or_else(|| CareError::not_found("ops_ticket", ticket_id))
    }
}
