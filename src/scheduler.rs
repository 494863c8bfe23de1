//! Dose-due emission, care event envelopes, and the background reminder ticker.
//!
//! The ticker wakes every `reminder_interval_secs`, collects regimens due in
//! the window since its previous tick, and sends one reminder per dose.
//! Windows are contiguous, so each dose is reminded once per ticker.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::json;

use crate::adherence::AdherenceEngine;
use crate::error::CareError;
use crate::models::enums::EventType;
use crate::models::{CareEvent, DoseDueEvent, FollowupJourney, Regimen, TriageDecision};

/// Sleep granularity for shutdown responsiveness.
const SLEEP_GRANULARITY: Duration = Duration::from_millis(250);

/// Read access to active regimens, supplied by the external patient store.
pub trait RegimenSource: Send + Sync {
    fn regimens(&self) -> Result<Vec<Regimen>, CareError>;
}

impl RegimenSource for Vec<Regimen> {
    fn regimens(&self) -> Result<Vec<Regimen>, CareError> {
        Ok(self.clone())
    }
}

/// One dose-due event per regimen.
pub fn emit_dose_due(regimens: &[Regimen]) -> Vec<DoseDueEvent> {
    regimens.iter().map(dose_due).collect()
}

/// Dose-due events for regimens due in `(window_start, window_end]`.
pub fn dose_due_events(
    regimens: &[Regimen],
    window_start: DateTime<Utc>,
    window_end: DateTime<Utc>,
) -> Vec<DoseDueEvent> {
    regimens
        .iter()
        .filter(|r| r.due_at > window_start && r.due_at <= window_end)
        .map(dose_due)
        .collect()
}

fn dose_due(regimen: &Regimen) -> DoseDueEvent {
    DoseDueEvent {
        patient_id: regimen.patient_id.clone(),
        medication: regimen.medication.clone(),
        due_at: regimen.due_at,
    }
}

// ── Event envelopes ─────────────────────────────────────────

pub fn dose_due_event(dose: &DoseDueEvent, at: DateTime<Utc>) -> CareEvent {
    CareEvent::new(
        EventType::DoseDue,
        &dose.patient_id,
        at,
        json!({
            "medication": dose.medication,
            "due_at": dose.due_at.to_rfc3339(),
        }),
    )
}

pub fn triage_alert_event(decision: &TriageDecision, at: DateTime<Utc>) -> CareEvent {
    CareEvent::new(
        EventType::TriageAlert,
        &decision.patient_id,
        at,
        json!({
            "cohort": decision.cohort.as_str(),
            "severity": decision.severity.as_str(),
            "reason": decision.reason,
            "escalation_required": decision.escalation_required,
        }),
    )
}

pub fn followup_closure_event(journey: &FollowupJourney, at: DateTime<Utc>) -> CareEvent {
    CareEvent::new(
        EventType::FollowupClosure,
        &journey.patient_id,
        at,
        json!({
            "kind": journey.kind.as_str(),
            "item": journey.item,
            "status": journey.status.as_str(),
        }),
    )
}

// ── Background ticker ───────────────────────────────────────

/// Handle for the reminder thread. Dropping it stops and joins the thread.
pub struct DoseReminderTicker {
    shutdown: Arc<AtomicBool>,
    handle: Option<std::thread::JoinHandle<()>>,
}

impl DoseReminderTicker {
    pub fn start(
        engine: Arc<AdherenceEngine>,
        source: Arc<dyn RegimenSource>,
        interval: Duration,
    ) -> Self {
        let shutdown = Arc::new(AtomicBool::new(false));
        let flag = shutdown.clone();

        let handle = std::thread::spawn(move || {
            tracing::info!(interval_ms = interval.as_millis() as u64, "Dose reminder ticker started");
            ticker_loop(&engine, source.as_ref(), interval, &flag);
        });

        Self {
            shutdown,
            handle: Some(handle),
        }
    }

    /// Ask the thread to stop after its current tick.
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::Relaxed);
    }
}

impl Drop for DoseReminderTicker {
    fn drop(&mut self) {
        self.shutdown();
        if let Some(h) = self.handle.take() {
            let _ = h.join();
        }
    }
}

fn ticker_loop(
    engine: &AdherenceEngine,
    source: &dyn RegimenSource,
    interval: Duration,
    shutdown: &AtomicBool,
) {
    let step = interval.min(SLEEP_GRANULARITY);
    let mut window_start = Utc::now();

    while !shutdown.load(Ordering::Relaxed) {
        let mut slept = Duration::ZERO;
        while slept < interval {
            if shutdown.load(Ordering::Relaxed) {
                tracing::info!("Dose reminder ticker shutting down");
                return;
            }
            std::thread::sleep(step);
            slept += step;
        }

        let window_end = Utc::now();
        match tick(engine, source, window_start, window_end) {
            Ok(sent) if sent > 0 => tracing::info!(sent, "Dose reminders sent"),
            Ok(_) => {}
            Err(e) => tracing::warn!(error = %e, "Dose reminder tick failed"),
        }
        window_start = window_end;
    }
    tracing::info!("Dose reminder ticker shutting down");
}

/// Send reminders for doses due in `(window_start, window_end]`.
pub fn tick(
    engine: &AdherenceEngine,
    source: &dyn RegimenSource,
    window_start: DateTime<Utc>,
    window_end: DateTime<Utc>,
) -> Result<usize, CareError> {
    let regimens = source.regimens()?;
    let due = dose_due_events(&regimens, window_start, window_end);
    for dose in &due {
        engine.send_reminder(dose);
    }
    Ok(due.len())
}
