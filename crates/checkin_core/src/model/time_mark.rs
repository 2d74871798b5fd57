//! Minute-of-day trigger marks (`HH:MM`).
//!
//! # Invariants
//! - A blank mark is unset and never fires.
//! - A mark matches a wall-clock instant only on the same hour and minute.

use chrono::{NaiveTime, Timelike};
use std::error::Error;
use std::fmt::{Display, Formatter};

const TIME_MARK_FORMAT: &str = "%H:%M";

/// A configured minute of the day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimeMark {
    hour: u32,
    minute: u32,
}

impl TimeMark {
    pub fn new(hour: u32, minute: u32) -> Option<Self> {
        (hour < 24 && minute < 60).then_some(Self { hour, minute })
    }

    /// Returns whether `time` falls within this mark's minute.
    pub fn matches(self, time: impl Timelike) -> bool {
        time.hour() == self.hour && time.minute() == self.minute
    }
}

impl Display for TimeMark {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeMarkError {
    pub value: String,
}

impl Display for TimeMarkError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid time mark `{}`; expected HH:MM", self.value)
    }
}

impl Error for TimeMarkError {}

/// Parses one configured mark.
///
/// Returns `Ok(None)` for a blank value.
pub fn parse_time_mark(value: &str) -> Result<Option<TimeMark>, TimeMarkError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }

    let time = NaiveTime::parse_from_str(trimmed, TIME_MARK_FORMAT).map_err(|_| TimeMarkError {
        value: trimmed.to_string(),
    })?;
    Ok(TimeMark::new(time.hour(), time.minute()))
}
