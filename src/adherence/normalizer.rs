//! Maps noisy patient replies to canonical adherence actions.

use crate::models::enums::AdherenceAction;

/// Fixed reply vocabulary. Lookup is exact after trimming and lowercasing.
static REPLY_MAP: &[(&str, AdherenceAction)] = &[
    ("1", AdherenceAction::Taken),
    ("taken", AdherenceAction::Taken),
    ("\u{2705}", AdherenceAction::Taken),
    ("2", AdherenceAction::Snooze),
    ("snooze", AdherenceAction::Snooze),
    ("\u{23f0}", AdherenceAction::Snooze),
    ("3", AdherenceAction::Skip),
    ("skip", AdherenceAction::Skip),
    ("\u{274c}", AdherenceAction::Skip),
    ("missed", AdherenceAction::Missed),
];

/// Canonical action for a reply, or None for absent or unrecognized text.
pub fn normalize_reply(reply: Option<&str>) -> Option<AdherenceAction> {
    let cleaned = reply?.trim().to_lowercase();
    REPLY_MAP
        .iter()
        .find(|(key, _)| *key == cleaned)
        .map(|(_, action)| *action)
}
