//! Common utilities shared across modules.

use chrono::{DateTime, Local, SubsecRound};

/// Timestamp format used in the activity log and alert bodies.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Current local time with sub-second precision dropped.
pub fn now_seconds() -> DateTime<Local> {
    truncate_to_seconds(Local::now())
}

/// Drop sub-second precision from a timestamp.
pub fn truncate_to_seconds(ts: DateTime<Local>) -> DateTime<Local> {
    ts.trunc_subsecs(0)
}

/// Format a timestamp as `YYYY-MM-DD HH:MM:SS`.
pub fn format_timestamp(ts: &DateTime<Local>) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}
