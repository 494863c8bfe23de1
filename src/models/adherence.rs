use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::enums::{AdherenceAction, Cohort, MissReason, Priority, RecoveryAction, Severity};
use crate::error::CareError;

/// Queue subject used for triage items, which are not tied to a medication.
pub const TRIAGE_SUBJECT: &str = "triage";

/// Read-only regimen attributes supplied by the external patient store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Regimen {
    pub patient_id: String,
    pub medication: String,
    pub due_at: DateTime<Utc>,
    pub caregiver_alerts_enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DoseDueEvent {
    pub patient_id: String,
    pub medication: String,
    pub due_at: DateTime<Utc>,
}

/// Immutable ledger entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdherenceEvent {
    pub patient_id: String,
    pub medication: String,
    pub action: AdherenceAction,
    pub occurred_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Alerts
// ---------------------------------------------------------------------------

/// Why an alert was opened. The streak depth is part of the key, so a
/// deeper streak opens a distinct alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum AlertReason {
    MissedStreak(u32),
}

impl fmt::Display for AlertReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissedStreak(n) => write!(f, "missed_streak_{n}"),
        }
    }
}

impl FromStr for AlertReason {
    type Err = CareError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.strip_prefix("missed_streak_")
            .and_then(|n| n.parse().ok())
            .map(Self::MissedStreak)
            .ok_or_else(|| CareError::invalid("AlertReason", s))
    }
}

impl From<AlertReason> for String {
    fn from(reason: AlertReason) -> Self {
        reason.to_string()
    }
}

impl TryFrom<String> for AlertReason {
    type Error = CareError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alert {
    pub patient_id: String,
    pub medication: String,
    pub reason: AlertReason,
    pub opened_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
}

impl Alert {
    pub fn is_open(&self) -> bool {
        self.closed_at.is_none()
    }

    /// Identity used for the one-open-alert-per-reason rule.
    pub fn same_key(&self, other: &Alert) -> bool {
        self.patient_id == other.patient_id
            && self.medication == other.medication
            && self.reason == other.reason
    }
}

// ---------------------------------------------------------------------------
// Human queue
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum QueueReason {
    HighRiskMissedDoses(u32),
    MissRecovery(MissReason),
    Triage { cohort: Cohort, severity: Severity },
}

impl fmt::Display for QueueReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::HighRiskMissedDoses(n) => write!(f, "high_risk_missed_doses:{n}"),
            Self::MissRecovery(reason) => write!(f, "miss_recovery_{reason}"),
            Self::Triage { cohort, severity } => write!(f, "triage_{cohort}_{severity}"),
        }
    }
}

impl FromStr for QueueReason {
    type Err = CareError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || CareError::invalid("QueueReason", s);

        if let Some(n) = s.strip_prefix("high_risk_missed_doses:") {
            return n.parse().map(Self::HighRiskMissedDoses).map_err(|_| invalid());
        }
        if let Some(reason) = s.strip_prefix("miss_recovery_") {
            return reason.parse().map(Self::MissRecovery).map_err(|_| invalid());
        }
        if let Some(rest) = s.strip_prefix("triage_") {
            // Cohort names may contain underscores (post_op); severity never does.
            let (cohort, severity) = rest.rsplit_once('_').ok_or_else(invalid)?;
            return Ok(Self::Triage {
                cohort: cohort.parse().map_err(|_| invalid())?,
                severity: severity.parse().map_err(|_| invalid())?,
            });
        }
        Err(invalid())
    }
}

impl From<QueueReason> for String {
    fn from(reason: QueueReason) -> Self {
        reason.to_string()
    }
}

impl TryFrom<String> for QueueReason {
    type Error = CareError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Item awaiting manual operator attention.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HumanQueueItem {
    pub patient_id: String,
    /// Medication name, or [`TRIAGE_SUBJECT`] for triage items.
    pub subject: String,
    pub reason: QueueReason,
    pub queued_at: DateTime<Utc>,
    pub priority: Priority,
    pub sla_minutes: u32,
}

impl HumanQueueItem {
    pub fn same_key(&self, other: &HumanQueueItem) -> bool {
        self.patient_id == other.patient_id
            && self.subject == other.subject
            && self.reason == other.reason
    }
}

// ---------------------------------------------------------------------------
// Miss recovery & refill
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MissRecoveryEvent {
    pub patient_id: String,
    pub medication: String,
    pub reason: MissReason,
    pub action: RecoveryAction,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefillForecast {
    pub patient_id: String,
    pub medication: String,
    /// Days of supply left, clamped to zero.
    pub days_left: i64,
    pub stage: super::enums::RefillStage,
}
