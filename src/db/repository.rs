use std::path::Path;
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use super::{open_database, open_memory_database, DatabaseError};
use crate::error::CareError;
use crate::messaging::AuditRecord;
use crate::models::enums::*;
use crate::models::*;
use crate::store::CareStore;

/// SQLite-backed store. One connection behind a mutex; dedupe is enforced
/// by unique indexes so insert-if-absent is a single statement.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (creating parent directories) and migrate the database at `path`.
    pub fn open(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        Ok(Self::from_connection(open_database(path)?))
    }

    pub fn open_in_memory() -> Result<Self, DatabaseError> {
        Ok(Self::from_connection(open_memory_database()?))
    }

    /// Wrap an already-migrated connection.
    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, CareError> {
        self.conn.lock().map_err(|_| CareError::LockFailed)
    }
}

// ── Column helpers ──────────────────────────────────────────

fn ts(at: &DateTime<Utc>) -> String {
    // Fixed width, so text order equals time order.
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn opt_ts(at: &Option<DateTime<Utc>>) -> Option<String> {
    at.as_ref().map(ts)
}

fn parse_ts(raw: &str) -> Result<DateTime<Utc>, CareError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| DatabaseError::Corrupt(format!("timestamp '{raw}': {e}")).into())
}

fn parse_opt_ts(raw: Option<String>) -> Result<Option<DateTime<Utc>>, CareError> {
    raw.as_deref().map(parse_ts).transpose()
}

type TicketRow = (
    i64,
    String,
    String,
    String,
    u32,
    String,
    String,
    Option<String>,
    Option<String>,
    Option<String>,
);

const TICKET_COLUMNS: &str = "ticket_id, patient_id, category, priority, sla_minutes, status,
     created_at, acknowledged_at, resolved_at, notes";

fn ticket_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<TicketRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
        row.get(7)?,
        row.get(8)?,
        row.get(9)?,
    ))
}

fn ticket_from_row(row: TicketRow) -> Result<OpsTicket, CareError> {
    let (id, patient_id, category, priority, sla_minutes, status, created, acked, resolved, notes) =
        row;
    Ok(OpsTicket {
        ticket_id: id as u64,
        patient_id,
        category: TicketCategory::from_str(&category)?,
        priority: Priority::from_str(&priority)?,
        sla_minutes,
        status: TicketStatus::from_str(&status)?,
        created_at: parse_ts(&created)?,
        acknowledged_at: parse_opt_ts(acked)?,
        resolved_at: parse_opt_ts(resolved)?,
        notes,
    })
}

type JourneyRow = (
    String,
    String,
    String,
    String,
    Option<String>,
    Option<String>,
    Option<String>,
);

fn journey_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<JourneyRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
    ))
}

fn journey_from_row(row: JourneyRow) -> Result<FollowupJourney, CareError> {
    let (kind, patient_id, item, status, booked, completed, reviewed) = row;
    Ok(FollowupJourney {
        kind: JourneyKind::from_str(&kind)?,
        patient_id,
        item,
        status: FollowupStatus::from_str(&status)?,
        booked_at: parse_opt_ts(booked)?,
        completed_at: parse_opt_ts(completed)?,
        reviewed_at: parse_opt_ts(reviewed)?,
    })
}

fn load_adherence(
    conn: &Connection,
    filter: Option<(&str, &str)>,
) -> Result<Vec<AdherenceEvent>, CareError> {
    let mut sql = String::from(
        "SELECT patient_id, medication, action, occurred_at FROM adherence_events",
    );
    if filter.is_some() {
        sql.push_str(" WHERE patient_id = ?1 AND medication = ?2");
    }
    sql.push_str(" ORDER BY occurred_at, seq");

    let mut stmt = conn.prepare(&sql)?;
    let map_row = |row: &rusqlite::Row<'_>| -> rusqlite::Result<(String, String, String, String)> {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, String>(3)?,
        ))
    };
    let rows = match filter {
        Some((patient_id, medication)) => stmt
            .query_map(params![patient_id, medication], map_row)?
            .collect::<Result<Vec<_>, _>>()?,
        None => stmt.query_map([], map_row)?.collect::<Result<Vec<_>, _>>()?,
    };

    let mut events = Vec::with_capacity(rows.len());
    for (patient_id, medication, action, occurred_at) in rows {
        events.push(AdherenceEvent {
            patient_id,
            medication,
            action: AdherenceAction::from_str(&action)?,
            occurred_at: parse_ts(&occurred_at)?,
        });
    }
    Ok(events)
}

impl CareStore for SqliteStore {
    fn append_adherence(&self, event: AdherenceEvent) -> Result<(), CareError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO adherence_events (patient_id, medication, action, occurred_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                event.patient_id,
                event.medication,
                event.action.as_str(),
                ts(&event.occurred_at),
            ],
        )?;
        Ok(())
    }

    fn adherence_for(
        &self,
        patient_id: &str,
        medication: &str,
    ) -> Result<Vec<AdherenceEvent>, CareError> {
        let conn = self.conn()?;
        load_adherence(&conn, Some((patient_id, medication)))
    }

    fn adherence_events(&self) -> Result<Vec<AdherenceEvent>, CareError> {
        let conn = self.conn()?;
        load_adherence(&conn, None)
    }

    fn open_alert_if_absent(&self, alert: Alert) -> Result<bool, CareError> {
        let conn = self.conn()?;
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO alerts (patient_id, medication, reason, opened_at, closed_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                alert.patient_id,
                alert.medication,
                alert.reason.to_string(),
                ts(&alert.opened_at),
                opt_ts(&alert.closed_at),
            ],
        )?;
        if inserted == 0 {
            tracing::debug!(
                patient_id = %alert.patient_id,
                reason = %alert.reason,
                "Alert already open, skipping"
            );
        }
        Ok(inserted == 1)
    }

    fn close_alert(
        &self,
        patient_id: &str,
        medication: &str,
        reason: AlertReason,
        closed_at: DateTime<Utc>,
    ) -> Result<bool, CareError> {
        let conn = self.conn()?;
        let changed = conn.execute(
            "UPDATE alerts SET closed_at = ?4
             WHERE patient_id = ?1 AND medication = ?2 AND reason = ?3 AND closed_at IS NULL",
            params![patient_id, medication, reason.to_string(), ts(&closed_at)],
        )?;
        Ok(changed > 0)
    }

    fn alerts(&self) -> Result<Vec<Alert>, CareError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT patient_id, medication, reason, opened_at, closed_at
             FROM alerts ORDER BY id",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, Option<String>>(4)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut alerts = Vec::with_capacity(rows.len());
        for (patient_id, medication, reason, opened_at, closed_at) in rows {
            alerts.push(Alert {
                patient_id,
                medication,
                reason: AlertReason::from_str(&reason)?,
                opened_at: parse_ts(&opened_at)?,
                closed_at: parse_opt_ts(closed_at)?,
            });
        }
        Ok(alerts)
    }

    fn enqueue_if_absent(&self, item: HumanQueueItem) -> Result<bool, CareError> {
        let conn = self.conn()?;
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO human_queue
             (patient_id, subject, reason, queued_at, priority, sla_minutes)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                item.patient_id,
                item.subject,
                item.reason.to_string(),
                ts(&item.queued_at),
                item.priority.as_str(),
                item.sla_minutes,
            ],
        )?;
        if inserted == 0 {
            tracing::debug!(
                patient_id = %item.patient_id,
                reason = %item.reason,
                "Queue item already present, skipping"
            );
        }
        Ok(inserted == 1)
    }

    fn human_queue(&self) -> Result<Vec<HumanQueueItem>, CareError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT patient_id, subject, reason, queued_at, priority, sla_minutes
             FROM human_queue ORDER BY id",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, u32>(5)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut items = Vec::with_capacity(rows.len());
        for (patient_id, subject, reason, queued_at, priority, sla_minutes) in rows {
            items.push(HumanQueueItem {
                patient_id,
                subject,
                reason: QueueReason::from_str(&reason)?,
                queued_at: parse_ts(&queued_at)?,
                priority: Priority::from_str(&priority)?,
                sla_minutes,
            });
        }
        Ok(items)
    }

    fn append_miss_recovery(&self, event: MissRecoveryEvent) -> Result<(), CareError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO miss_recovery_events (patient_id, medication, reason, action, occurred_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                event.patient_id,
                event.medication,
                event.reason.as_str(),
                event.action.as_str(),
                ts(&event.occurred_at),
            ],
        )?;
        Ok(())
    }

    fn miss_recoveries(&self) -> Result<Vec<MissRecoveryEvent>, CareError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT patient_id, medication, reason, action, occurred_at
             FROM miss_recovery_events ORDER BY id",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut events = Vec::with_capacity(rows.len());
        for (patient_id, medication, reason, action, occurred_at) in rows {
            events.push(MissRecoveryEvent {
                patient_id,
                medication,
                reason: MissReason::from_str(&reason)?,
                action: RecoveryAction::from_str(&action)?,
                occurred_at: parse_ts(&occurred_at)?,
            });
        }
        Ok(events)
    }

    fn journey(
        &self,
        kind: JourneyKind,
        patient_id: &str,
        item: &str,
    ) -> Result<Option<FollowupJourney>, CareError> {
        let conn = self.conn()?;
        let row = conn
            .query_row(
                "SELECT kind, patient_id, item, status, booked_at, completed_at, reviewed_at
                 FROM followup_journeys WHERE kind = ?1 AND patient_id = ?2 AND item = ?3",
                params![kind.as_str(), patient_id, item],
                journey_row,
            )
            .optional()?;
        row.map(journey_from_row).transpose()
    }

    fn upsert_journey(&self, journey: FollowupJourney) -> Result<(), CareError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO followup_journeys
             (kind, patient_id, item, status, booked_at, completed_at, reviewed_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT (kind, patient_id, item) DO UPDATE SET
                status = excluded.status,
                booked_at = excluded.booked_at,
                completed_at = excluded.completed_at,
                reviewed_at = excluded.reviewed_at",
            params![
                journey.kind.as_str(),
                journey.patient_id,
                journey.item,
                journey.status.as_str(),
                opt_ts(&journey.booked_at),
                opt_ts(&journey.completed_at),
                opt_ts(&journey.reviewed_at),
            ],
        )?;
        Ok(())
    }

    fn journeys(&self) -> Result<Vec<FollowupJourney>, CareError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT kind, patient_id, item, status, booked_at, completed_at, reviewed_at
             FROM followup_journeys ORDER BY kind, patient_id, item",
        )?;
        let rows = stmt
            .query_map([], journey_row)?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().map(journey_from_row).collect()
    }

    fn insert_ticket(&self, ticket: NewOpsTicket) -> Result<OpsTicket, CareError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO ops_tickets
             (patient_id, category, priority, sla_minutes, status, created_at, notes)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                ticket.patient_id,
                ticket.category.as_str(),
                ticket.priority.as_str(),
                ticket.sla_minutes,
                TicketStatus::Open.as_str(),
                ts(&ticket.created_at),
                ticket.notes,
            ],
        )?;
        let id = conn.last_insert_rowid() as u64;
        Ok(ticket.into_ticket(id))
    }

    fn update_ticket(&self, ticket: &OpsTicket) -> Result<(), CareError> {
        let conn = self.conn()?;
        let changed = conn.execute(
            "UPDATE ops_tickets SET
                patient_id = ?2, category = ?3, priority = ?4, sla_minutes = ?5, status = ?6,
                created_at = ?7, acknowledged_at = ?8, resolved_at = ?9, notes = ?10
             WHERE ticket_id = ?1",
            params![
                ticket.ticket_id as i64,
                ticket.patient_id,
                ticket.category.as_str(),
                ticket.priority.as_str(),
                ticket.sla_minutes,
                ticket.status.as_str(),
                ts(&ticket.created_at),
                opt_ts(&ticket.acknowledged_at),
                opt_ts(&ticket.resolved_at),
                ticket.notes,
            ],
        )?;
        if changed == 0 {
            return Err(CareError::not_found("ops_ticket", ticket.ticket_id));
        }
        Ok(())
    }

    fn ticket(&self, ticket_id: u64) -> Result<Option<OpsTicket>, CareError> {
        let conn = self.conn()?;
        let row = conn
            .query_row(
                &format!("SELECT {TICKET_COLUMNS} FROM ops_tickets WHERE ticket_id = ?1"),
                params![ticket_id as i64],
                ticket_row,
            )
            .optional()?;
        row.map(ticket_from_row).transpose()
    }

    fn tickets(&self) -> Result<Vec<OpsTicket>, CareError> {
        let conn = self.conn()?;
        let mut stmt =
            conn.prepare(&format!("SELECT {TICKET_COLUMNS} FROM ops_tickets ORDER BY ticket_id"))?;
        let rows = stmt
            .query_map([], ticket_row)?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().map(ticket_from_row).collect()
    }

    fn set_caregiver_permissions(
        &self,
        permissions: CaregiverPermissions,
    ) -> Result<(), CareError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT OR REPLACE INTO caregiver_permissions (caregiver_id, can_snooze, can_skip)
             VALUES (?1, ?2, ?3)",
            params![
                permissions.caregiver_id,
                permissions.can_snooze,
                permissions.can_skip,
            ],
        )?;
        Ok(())
    }

    fn caregiver_permissions(
        &self,
        caregiver_id: &str,
    ) -> Result<Option<CaregiverPermissions>, CareError> {
        let conn = self.conn()?;
        let perms = conn
            .query_row(
                "SELECT caregiver_id, can_snooze, can_skip
                 FROM caregiver_permissions WHERE caregiver_id = ?1",
                params![caregiver_id],
                |row| {
                    Ok(CaregiverPermissions {
                        caregiver_id: row.get(0)?,
                        can_snooze: row.get(1)?,
                        can_skip: row.get(2)?,
                    })
                },
            )
            .optional()?;
        Ok(perms)
    }

    fn append_audit_records(&self, records: &[AuditRecord]) -> Result<(), CareError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT OR IGNORE INTO audit_records
                 (record_id, record_type, patient_id, logged_at, body)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            for record in records {
                let body = serde_json::to_string(record)
                    .map_err(|e| DatabaseError::Corrupt(e.to_string()))?;
                stmt.execute(params![
                    record.record_id().to_string(),
                    record.record_type(),
                    record.patient_id(),
                    ts(&record.logged_at()),
                    body,
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn audit_records(&self) -> Result<Vec<AuditRecord>, CareError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT body FROM audit_records ORDER BY seq")?;
        let bodies = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;

        let mut records = Vec::with_capacity(bodies.len());
        for body in bodies {
            let record = serde_json::from_str(&body)
                .map_err(|e| DatabaseError::Corrupt(format!("audit record: {e}")))?;
            records.push(record);
        }
        Ok(records)
    }
}
