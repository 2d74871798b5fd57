//! Roster-wide summary pass and evidence purge.
//!
//! # Invariants
//! - Digest recipients are every reachable email on the roster, compliant or
//!   not, de-duplicated in roster order.
//! - Evidence for the date is purged only when everyone complied or the digest
//!   was delivered. A failed digest or an unreachable roster keeps it.
//! - Purge covers both attendance rows and blobs, and is safe to repeat.

use crate::evidence::{BlobError, EvidenceBlobStore};
use crate::model::person::Person;
use crate::notify::templates::digest_message;
use crate::notify::{DispatchError, NotificationGateway};
use crate::repo::attendance_repo::{AttendanceRepository, RepoError, RepoResult};
use crate::settings::SettingsProvider;
use chrono::NaiveDate;
use log::{error, info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

/// Failure of one or both halves of a purge.
#[derive(Debug)]
pub struct PurgeError {
    pub records: Option<RepoError>,
    pub evidence: Option<BlobError>,
}

impl Display for PurgeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "purge incomplete")?;
        if let Some(err) = &self.records {
            write!(f, "; records: {err}")?;
        }
        if let Some(err) = &self.evidence {
            write!(f, "; evidence: {err}")?;
        }
        Ok(())
    }
}

impl Error for PurgeError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        if let Some(err) = &self.records {
            return Some(err);
        }
        self.evidence.as_ref().map(|err| err as &(dyn Error + 'static))
    }
}

/// Records removed by a completed purge.
pub type PurgeResult = Result<usize, PurgeError>;

#[derive(Debug)]
pub enum SummaryOutcome {
    /// Nobody is missing; evidence was purged without a digest.
    FullyCompliant { purge: PurgeResult },
    DigestSent {
        missing: Vec<String>,
        recipients: Vec<String>,
        purge: PurgeResult,
    },
    /// Digest delivery failed; evidence is retained for manual follow-up.
    DispatchFailed {
        missing: Vec<String>,
        recipients: Vec<String>,
        error: DispatchError,
    },
    /// People are missing but nobody on the roster has an email; evidence is
    /// retained.
    NoRecipients { missing: Vec<String> },
}

impl SummaryOutcome {
    /// Names without a check-in, in roster order.
    pub fn missing(&self) -> &[String] {
        match self {
            Self::FullyCompliant { .. } => &[],
            Self::DigestSent { missing, .. }
            | Self::DispatchFailed { missing, .. }
            | Self::NoRecipients { missing } => missing,
        }
    }

    /// Whether the date's evidence was fully purged.
    pub fn purged(&self) -> bool {
        match self {
            Self::FullyCompliant { purge } | Self::DigestSent { purge, .. } => purge.is_ok(),
            Self::DispatchFailed { .. } | Self::NoRecipients { .. } => false,
        }
    }
}

pub struct SummaryEngine {
    settings: Arc<dyn SettingsProvider>,
    repo: Arc<dyn AttendanceRepository>,
    gateway: Arc<dyn NotificationGateway>,
    evidence: Arc<dyn EvidenceBlobStore>,
}

impl SummaryEngine {
    pub fn new(
        settings: Arc<dyn SettingsProvider>,
        repo: Arc<dyn AttendanceRepository>,
        gateway: Arc<dyn NotificationGateway>,
        evidence: Arc<dyn EvidenceBlobStore>,
    ) -> Self {
        Self {
            settings,
            repo,
            gateway,
            evidence,
        }
    }

    /// Partitions the roster for `date`, sends the digest when needed and
    /// purges evidence according to the outcome.
    ///
    /// # Errors
    /// Returns the storage error when attendance cannot be read; no digest is
    /// sent and nothing is purged in that case.
    pub fn run_summary_pass(&self, date: NaiveDate) -> RepoResult<SummaryOutcome> {
        let settings = self.settings.snapshot();
        info!(
            "event=summary_pass module=summary status=start date={date} roster_size={}",
            settings.roster.len()
        );

        let mut missing: Vec<&Person> = Vec::new();
        let mut recipients: Vec<String> = Vec::new();
        for person in &settings.roster {
            if let Some(email) = person.reachable_email() {
                if !recipients.iter().any(|known| known == email) {
                    recipients.push(email.to_string());
                }
            }
            if !self.repo.has_checked_in(&person.name, date)? {
                missing.push(person);
            }
        }
        let missing_names: Vec<String> =
            missing.iter().map(|person| person.name.clone()).collect();

        if missing.is_empty() {
            info!("event=summary_pass module=summary status=ok date={date} result=fully_compliant");
            return Ok(SummaryOutcome::FullyCompliant {
                purge: self.purge_date(date),
            });
        }

        if recipients.is_empty() {
            warn!(
                "event=summary_pass module=summary status=skip date={date} reason=no_recipients missing={}",
                missing_names.len()
            );
            return Ok(SummaryOutcome::NoRecipients {
                missing: missing_names,
            });
        }

        let message = digest_message(date, &missing);
        match self
            .gateway
            .send(&recipients, &message.subject, &message.body)
        {
            Ok(()) => {
                info!(
                    "event=summary_send module=summary status=ok date={date} recipients={} missing={}",
                    recipients.len(),
                    missing_names.len()
                );
                Ok(SummaryOutcome::DigestSent {
                    missing: missing_names,
                    recipients,
                    purge: self.purge_date(date),
                })
            }
            Err(err) => {
                error!(
                    "event=summary_send module=summary status=error date={date} action=retain_evidence error={err}"
                );
                Ok(SummaryOutcome::DispatchFailed {
                    missing: missing_names,
                    recipients,
                    error: err,
                })
            }
        }
    }

    /// Removes every record and blob for `date`. Both halves are attempted even
    /// when one fails.
    pub fn purge_date(&self, date: NaiveDate) -> PurgeResult {
        let records = self.repo.purge_date(date);
        let evidence = self.evidence.purge_date(date);

        match (records, evidence) {
            (Ok(removed), Ok(())) => {
                info!("event=purge module=summary status=ok date={date} records_removed={removed}");
                Ok(removed)
            }
            (records, evidence) => {
                let err = PurgeError {
                    records: records.err(),
                    evidence: evidence.err(),
                };
                error!("event=purge module=summary status=error date={date} error={err}");
                Err(err)
            }
        }
    }
}
