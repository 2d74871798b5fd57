//! Check-in record model.

use chrono::{DateTime, Local, NaiveDate};
use serde::{Deserialize, Serialize};

/// Persisted proof that one person checked in on one calendar day.
///
/// A later submission for the same `(person_name, date)` replaces this record
/// instead of adding a second one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckInRecord {
    pub person_name: String,
    pub date: NaiveDate,
    /// Blob store location returned when the evidence was stored.
    pub evidence_location: String,
    pub recorded_at: DateTime<Local>,
}
