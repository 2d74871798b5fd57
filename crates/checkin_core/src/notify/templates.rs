//! Reminder and digest message templates.

use crate::model::person::Person;
use chrono::NaiveDate;
use std::fmt::Write;

pub const REMINDER_SUBJECT: &str = "Check-in reminder";
pub const DIGEST_SUBJECT: &str = "Daily check-in: missing submissions";

const FOOTER: &str = "This message was sent automatically; please do not reply.";
const MISSING_EMAIL: &str = "(none)";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub subject: String,
    pub body: String,
}

/// Individual reminder for one person who has not checked in on `date`.
pub fn reminder_message(person: &Person, date: NaiveDate) -> Message {
    Message {
        subject: REMINDER_SUBJECT.to_string(),
        body: format!(
            "Dear {},\n\nYou have not checked in for {date} yet. Please upload your check-in proof as soon as possible.\n\n{FOOTER}",
            person.name
        ),
    }
}

/// Roster-wide digest listing everyone missing a check-in on `date`.
pub fn digest_message(date: NaiveDate, missing: &[&Person]) -> Message {
    let mut body = format!("The following people have not checked in for {date}:\n\n");
    for person in missing {
        // Writing into a String cannot fail.
        let _ = writeln!(
            body,
            "Name: {}, Email: {}",
            person.name,
            person.reachable_email().unwrap_or(MISSING_EMAIL)
        );
    }
    body.push('\n');
    body.push_str(FOOTER);

    Message {
        subject: DIGEST_SUBJECT.to_string(),
        body,
    }
}
