//! Domain model for roster members, check-in records and trigger marks.
//!
//! # Invariants
//! - A person is identified by `name`, unique within one roster.
//! - At most one `CheckInRecord` exists per `(person_name, date)`.

pub mod person;
pub mod record;
pub mod time_mark;

use chrono::NaiveDate;

/// ISO calendar-day format used for storage keys and evidence directories.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Formats a calendar day in its storage form (`YYYY-MM-DD`).
pub fn date_key(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

/// Parses a `YYYY-MM-DD` calendar day.
pub fn parse_date_key(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), DATE_FORMAT).ok()
}
