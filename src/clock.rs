//! Reference-time helpers. Every timestamp inside the core is UTC; callers
//! holding zoned or naive values convert at the boundary.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};

/// Normalize any zoned timestamp to the reference zone.
pub fn to_reference<Tz: TimeZone>(at: &DateTime<Tz>) -> DateTime<Utc> {
    at.with_timezone(&Utc)
}

/// Naive timestamps carry no offset and are read as reference time.
pub fn assume_utc(naive: NaiveDateTime) -> DateTime<Utc> {
    Utc.from_utc_datetime(&naive)
}
