//! Miss-recovery resolver: disclosed reason → remediation action.

use crate::models::enums::{MissReason, RecoveryAction};

/// Deterministic remediation for a missed-dose reason.
pub fn resolve_recovery(reason: MissReason) -> RecoveryAction {
    match reason {
        MissReason::Forgot => RecoveryAction::Reschedule,
        MissReason::SideEffect | MissReason::Confused => RecoveryAction::EscalateClinician,
        MissReason::OutOfStock | MissReason::Cost => RecoveryAction::RefillSupport,
        MissReason::Other => RecoveryAction::HumanReview,
    }
}
