//! Dose-reply handling: reply normalization, missed-streak detection,
//! alerting, and miss-reason recovery.

pub mod engine;
pub mod normalizer;
pub mod recovery;
pub mod streak;

pub use engine::{ActionOutcome, AdherenceEngine};
pub use normalizer::normalize_reply;
pub use recovery::resolve_recovery;
pub use streak::missed_streak;
