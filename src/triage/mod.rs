//! Symptom triage and severity-to-priority mapping.

pub mod assessor;
pub mod prioritizer;

pub use assessor::{assess, assess_str};
pub use prioritizer::{priority_for, priority_for_label};
