use crate::error::CareError;
use serde::{Deserialize, Serialize};

/// Macro to generate a closed enum with as_str + std::str::FromStr + Display.
/// Serde uses the same wire strings as `as_str`.
macro_rules! str_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(#[serde(rename = $s)] $variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$(Self::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }
        }

        impl std::str::FromStr for $name {
            type Err = CareError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$variant)),+,
                    _ => Err(CareError::InvalidArgument {
                        field: stringify!($name).into(),
                        value: s.into(),
                    }),
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

// ── Adherence ───────────────────────────────────────────────

str_enum!(
    /// Canonical patient-reported adherence action.
    AdherenceAction {
        Taken => "taken",
        Snooze => "snooze",
        Skip => "skip",
        Missed => "missed",
    }
);

impl AdherenceAction {
    /// Actions that extend a missed-dose streak.
    pub fn is_miss(&self) -> bool {
        matches!(self, Self::Skip | Self::Missed)
    }
}

str_enum!(
    /// Reason a patient discloses for a missed dose.
    MissReason {
        Forgot => "forgot",
        SideEffect => "side_effect",
        OutOfStock => "out_of_stock",
        Confused => "confused",
        Cost => "cost",
        Other => "other",
    }
);

str_enum!(RecoveryAction {
    Reschedule => "reschedule",
    EscalateClinician => "escalate_clinician",
    RefillSupport => "refill_support",
    HumanReview => "human_review",
});

str_enum!(RefillStage {
    D7 => "d7",
    D3 => "d3",
    D1 => "d1",
});

// ── Triage & ops ────────────────────────────────────────────

str_enum!(
    /// Clinical risk category selecting the triage keyword set.
    Cohort {
        Diabetes => "diabetes",
        Bp => "bp",
        Asthma => "asthma",
        Pregnancy => "pregnancy",
        PostOp => "post_op",
    }
);

str_enum!(Severity {
    Low => "low",
    Medium => "medium",
    High => "high",
    Critical => "critical",
});

impl Severity {
    /// High and critical findings always need a human.
    pub fn requires_escalation(&self) -> bool {
        matches!(self, Self::High | Self::Critical)
    }
}

str_enum!(Priority {
    P0 => "p0",
    P1 => "p1",
    P2 => "p2",
    P3 => "p3",
});

str_enum!(TicketStatus {
    Open => "open",
    Acknowledged => "acknowledged",
    Resolved => "resolved",
});

str_enum!(TicketCategory {
    Adherence => "adherence",
    Refill => "refill",
    Triage => "triage",
    Followup => "followup",
    MissRecovery => "miss_recovery",
    General => "general",
});

// ── Followup journeys ───────────────────────────────────────

str_enum!(JourneyKind {
    Lab => "lab",
    Appointment => "appointment",
});

str_enum!(FollowupStatus {
    Due => "due",
    Booked => "booked",
    Completed => "completed",
    Reviewed => "reviewed",
});

impl FollowupStatus {
    /// Position in the closure ladder due → booked → completed → reviewed.
    pub fn rank(&self) -> u8 {
        match self {
            Self::Due => 0,
            Self::Booked => 1,
            Self::Completed => 2,
            Self::Reviewed => 3,
        }
    }
}

// ── Messaging policy ────────────────────────────────────────

str_enum!(OutboundMode {
    Freeform => "FREEFORM",
    Template => "TEMPLATE",
});

str_enum!(FlowAction {
    Allow => "ALLOW",
    Reroute => "REROUTE",
    Reject => "REJECT",
});

str_enum!(
    /// Symbolic audit tag explaining a policy decision.
    ReasonCode {
        FreeformAllowedWithinWindow => "FREEFORM_ALLOWED_WITHIN_WINDOW",
        TemplateRequiredOutsideWindow => "TEMPLATE_REQUIRED_OUTSIDE_WINDOW",
        TemplateRequiredNoInboundFound => "TEMPLATE_REQUIRED_NO_INBOUND_FOUND",
        DisallowedMedicineOrderingFlow => "DISALLOWED_MEDICINE_ORDERING_FLOW",
        RegulatedContentRerouted => "REGULATED_CONTENT_REROUTED",
        HumanEscalationExposed => "HUMAN_ESCALATION_EXPOSED",
    }
);

impl ReasonCode {
    pub fn requires_template(&self) -> bool {
        matches!(
            self,
            Self::TemplateRequiredOutsideWindow | Self::TemplateRequiredNoInboundFound
        )
    }
}

// ── Workflow & events ───────────────────────────────────────

str_enum!(WorkflowIntent {
    AdherenceUpdate => "adherence_update",
    RefillRequest => "refill_request",
    FollowupUpdate => "followup_update",
    SymptomReport => "symptom_report",
    PregnancyChecklist => "pregnancy_checklist",
    GeneralQuestion => "general_question",
});

str_enum!(EventType {
    DoseDue => "dose_due",
    TriageAlert => "triage_alert",
    FollowupClosure => "followup_closure",
});

// ── Engine policies ─────────────────────────────────────────

str_enum!(
    /// How a `snooze` between misses is treated when counting a streak.
    SnoozePolicy {
        BreaksStreak => "breaks_streak",
        Ignored => "ignored",
    }
);

impl Default for SnoozePolicy {
    fn default() -> Self {
        Self::BreaksStreak
    }
}

str_enum!(
    /// Whether journey and ticket statuses may move backwards.
    TransitionPolicy {
        Permissive => "permissive",
        ForwardOnly => "forward_only",
    }
);

impl Default for TransitionPolicy {
    fn default() -> Self {
        Self::Permissive
    }
}
