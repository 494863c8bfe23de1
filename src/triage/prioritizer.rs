use std::str::FromStr;

use crate::models::enums::{Priority, Severity};

/// Queue priority and SLA (minutes) for a severity.
pub fn priority_for(severity: Severity) -> (Priority, u32) {
    match severity {
        Severity::Critical => (Priority::P0, 5),
        Severity::High => (Priority::P1, 15),
        Severity::Medium => (Priority::P2, 60),
        Severity::Low => (Priority::P3, 240),
    }
}

/// Same as [`priority_for`] for a raw label. Unknown labels get the lowest tier.
pub fn priority_for_label(label: &str) -> (Priority, u32) {
    Severity::from_str(label)
        .map(priority_for)
        .unwrap_or((Priority::P3, 240))
}
