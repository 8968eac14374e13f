//! Date/time prelude (§4.10, last paragraph): a stable, human-readable
//! block prefixed to the system prompt ahead of the original prompt text and
//! any workflow-communication instructions.

use chrono::{DateTime, Utc};

/// Render the date/time prelude for `now`. Takes an explicit timestamp
/// rather than calling `Utc::now()` internally so the loop stays
/// deterministically testable.
pub fn system_prelude(now: DateTime<Utc>) -> String {
    format!(
        "current date: {date}\ncurrent time: {time} UTC\nutc offset: +00:00\ntimezone: UTC",
        date = now.format("%Y-%m-%d"),
        time = now.format("%H:%M:%S"),
    )
}
