pub mod adherence;
pub mod caregiver;
pub mod enums;
pub mod events;
pub mod followup;
pub mod ops;
pub mod triage;

pub use adherence::*;
pub use caregiver::*;
pub use events::*;
pub use followup::*;
pub use ops::*;
pub use triage::*;
