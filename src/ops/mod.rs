//! Human-operator ticket lifecycle and program-level metrics.

pub mod dashboard;
pub mod tickets;

pub use dashboard::build_dashboard;
pub use tickets::OpsTicketRegistry;
