//! Medication-adherence and escalation core.
//!
//! Patients answer scheduled dose reminders over a messaging channel. The
//! core normalizes their replies, tracks missed-dose streaks, opens alerts
//! and human-queue items once per streak depth, triages symptoms, tracks
//! lab and appointment closure, and gates every reply through the 24-hour
//! freeform/template messaging window with an audit trail.

pub mod adherence;
pub mod clock;
pub mod config;
pub mod coordinator;
pub mod db;
pub mod error;
pub mod followup;
pub mod messaging;
pub mod models;
pub mod ops;
pub mod refill;
pub mod scheduler;
pub mod store;
pub mod triage;
pub mod workflow;

mod log_audit;

pub use coordinator::{CareCoordinator, InboundMessage, InboundOutcome};
pub use error::CareError;

use tracing_subscriber::EnvFilter;

/// Install the global fmt subscriber. `RUST_LOG` overrides the default filter.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .with_writer(std::io::stderr)
        .try_init();
}
