//! Individual reminder pass.
//!
//! # Invariants
//! - Only roster members without a record for the date and with a reachable
//!   email receive a reminder.
//! - One failed send never blocks the remaining recipients; there is no retry.
//! - Calling the pass twice sends twice; de-duplication is the scheduler's job.

use crate::model::person::Person;
use crate::notify::templates::reminder_message;
use crate::notify::NotificationGateway;
use crate::repo::attendance_repo::{AttendanceRepository, RepoResult};
use crate::settings::SettingsProvider;
use chrono::NaiveDate;
use log::{info, warn};
use std::sync::Arc;

/// Names of roster members grouped by what the pass did for them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReminderReport {
    pub sent: Vec<String>,
    pub failed: Vec<String>,
    pub skipped_no_email: Vec<String>,
    pub already_checked_in: Vec<String>,
}

pub struct ReminderEngine {
    settings: Arc<dyn SettingsProvider>,
    repo: Arc<dyn AttendanceRepository>,
    gateway: Arc<dyn NotificationGateway>,
}

impl ReminderEngine {
    pub fn new(
        settings: Arc<dyn SettingsProvider>,
        repo: Arc<dyn AttendanceRepository>,
        gateway: Arc<dyn NotificationGateway>,
    ) -> Self {
        Self {
            settings,
            repo,
            gateway,
        }
    }

    /// Sends one reminder to each reachable person missing a check-in on `date`.
    ///
    /// # Errors
    /// Returns the storage error when attendance cannot be read; nothing is sent
    /// in that case.
    pub fn run_reminder_pass(&self, date: NaiveDate) -> RepoResult<ReminderReport> {
        let settings = self.settings.snapshot();
        info!(
            "event=reminder_pass module=reminder status=start date={date} roster_size={}",
            settings.roster.len()
        );

        let mut report = ReminderReport::default();
        let mut pending: Vec<(&Person, &str)> = Vec::new();
        for person in &settings.roster {
            if self.repo.has_checked_in(&person.name, date)? {
                report.already_checked_in.push(person.name.clone());
                continue;
            }
            match person.reachable_email() {
                Some(email) => pending.push((person, email)),
                None => {
                    info!(
                        "event=reminder_send module=reminder status=skip reason=no_email name={}",
                        person.name
                    );
                    report.skipped_no_email.push(person.name.clone());
                }
            }
        }

        for (person, email) in pending {
            let message = reminder_message(person, date);
            match self
                .gateway
                .send(&[email.to_string()], &message.subject, &message.body)
            {
                Ok(()) => {
                    info!(
                        "event=reminder_send module=reminder status=ok name={} email={email}",
                        person.name
                    );
                    report.sent.push(person.name.clone());
                }
                Err(err) => {
                    warn!(
                        "event=reminder_send module=reminder status=error name={} email={email} error={err}",
                        person.name
                    );
                    report.failed.push(person.name.clone());
                }
            }
        }

        info!(
            "event=reminder_pass module=reminder status=ok date={date} sent={} failed={} skipped={} compliant={}",
            report.sent.len(),
            report.failed.len(),
            report.skipped_no_email.len(),
            report.already_checked_in.len()
        );
        Ok(report)
    }
}
