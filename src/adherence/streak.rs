use crate::models::enums::{AdherenceAction, SnoozePolicy};
use crate::models::AdherenceEvent;

/// Contiguous run of skip/missed events counted back from the newest.
///
/// `taken` always ends the run. `snooze` ends it under
/// [`SnoozePolicy::BreaksStreak`] and is stepped over under
/// [`SnoozePolicy::Ignored`].
pub fn missed_streak(events: &[AdherenceEvent], snooze: SnoozePolicy) -> u32 {
    let mut streak = 0;
    for event in events.iter().rev() {
        match event.action {
            AdherenceAction::Skip | AdherenceAction::Missed => streak += 1,
            AdherenceAction::Snooze if snooze == SnoozePolicy::Ignored => continue,
            AdherenceAction::Snooze | AdherenceAction::Taken => break,
        }
    }
    streak
}
