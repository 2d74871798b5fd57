//! Check-in submission and status use-cases.
//!
//! # Invariants
//! - Only roster members may submit, and only `image/*` payloads.
//! - A submission counts as recorded only after the attendance row is
//!   written; a stored blob alone is not a check-in.
//! - Submissions are serialized so a person's replaced evidence never leaves
//!   two blobs behind for the same date.
//! - Earlier evidence is removed only after the new record is written, so an
//!   existing record never points at a deleted blob.

use crate::evidence::{BlobError, EvidenceBlobStore};
use crate::model::person::Person;
use crate::repo::attendance_repo::{AttendanceRepository, RepoError, RepoResult};
use crate::settings::SettingsProvider;
use chrono::NaiveDate;
use log::{error, info, warn};
use serde::Serialize;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

const IMAGE_CONTENT_TYPE_PREFIX: &str = "image/";

/// One uploaded proof file.
#[derive(Debug, Clone, Copy)]
pub struct CheckInSubmission<'a> {
    pub name: &'a str,
    /// MIME type declared by the uploader.
    pub content_type: &'a str,
    /// Original file name; only its extension is kept.
    pub file_name: &'a str,
    pub bytes: &'a [u8],
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckInReceipt {
    pub name: String,
    pub date: NaiveDate,
    pub evidence_location: String,
}

/// Per-person compliance row for one date, in roster order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckInStatus {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    pub uploaded: bool,
}

#[derive(Debug)]
pub enum SubmissionError {
    MissingName,
    UnknownPerson(String),
    UnsupportedContentType(String),
    Blob(BlobError),
    /// Evidence may already be stored, but the check-in was not recorded.
    Repo(RepoError),
}

impl Display for SubmissionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingName => write!(f, "submission is missing a name"),
            Self::UnknownPerson(name) => write!(f, "`{name}` is not on the check-in roster"),
            Self::UnsupportedContentType(value) => {
                write!(f, "only image uploads are accepted, got `{value}`")
            }
            Self::Blob(err) => write!(f, "failed to store evidence: {err}"),
            Self::Repo(err) => write!(f, "failed to record check-in: {err}"),
        }
    }
}

impl Error for SubmissionError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Blob(err) => Some(err),
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<BlobError> for SubmissionError {
    fn from(value: BlobError) -> Self {
        Self::Blob(value)
    }
}

impl From<RepoError> for SubmissionError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

/// Use-case service for submissions and compliance queries.
pub struct CheckInService {
    settings: Arc<dyn SettingsProvider>,
    repo: Arc<dyn AttendanceRepository>,
    evidence: Arc<dyn EvidenceBlobStore>,
    submit_lock: Mutex<()>,
}

impl CheckInService {
    pub fn new(
        settings: Arc<dyn SettingsProvider>,
        repo: Arc<dyn AttendanceRepository>,
        evidence: Arc<dyn EvidenceBlobStore>,
    ) -> Self {
        Self {
            settings,
            repo,
            evidence,
            submit_lock: Mutex::new(()),
        }
    }

    /// Current roster snapshot.
    pub fn roster(&self) -> Vec<Person> {
        self.settings.snapshot().roster.clone()
    }

    /// Stores the proof for `date`, records the check-in, then drops any
    /// earlier proof the same person left under another extension.
    ///
    /// # Errors
    /// - `MissingName`/`UnknownPerson` when the name is blank or not on the roster.
    /// - `UnsupportedContentType` for non-image payloads.
    /// - `Blob` when evidence cannot be stored; nothing is recorded.
    /// - `Repo` when the record write fails; any earlier record and its evidence
    ///   stay in place.
    pub fn submit(
        &self,
        submission: &CheckInSubmission<'_>,
        date: NaiveDate,
    ) -> Result<CheckInReceipt, SubmissionError> {
        let name = submission.name.trim();
        if name.is_empty() {
            return Err(SubmissionError::MissingName);
        }
        if self.settings.snapshot().person(name).is_none() {
            warn!(
                "event=checkin_submit module=service status=rejected reason=unknown_person name={name}"
            );
            return Err(SubmissionError::UnknownPerson(name.to_string()));
        }
        if !submission
            .content_type
            .trim()
            .to_ascii_lowercase()
            .starts_with(IMAGE_CONTENT_TYPE_PREFIX)
        {
            return Err(SubmissionError::UnsupportedContentType(
                submission.content_type.to_string(),
            ));
        }

        let extension = Path::new(submission.file_name)
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or_default();

        let _guard = self.submit_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let location = self
            .evidence
            .store(name, date, extension, submission.bytes)?;

        if let Err(err) = self.repo.record_check_in(name, date, &location) {
            error!(
                "event=checkin_submit module=service status=error name={name} date={date} error_code=record_failed error={err}"
            );
            return Err(err.into());
        }

        // The day's purge still clears a blob this cleanup leaves behind.
        if let Err(err) = self.evidence.remove_except(name, date, &location) {
            warn!(
                "event=checkin_submit module=service status=warn name={name} date={date} error_code=stale_evidence error={err}"
            );
        }

        info!(
            "event=checkin_submit module=service status=ok name={name} date={date} bytes={}",
            submission.bytes.len()
        );
        Ok(CheckInReceipt {
            name: name.to_string(),
            date,
            evidence_location: location,
        })
    }

    /// Compliance of every roster member for `date`.
    pub fn status_for(&self, date: NaiveDate) -> RepoResult<Vec<CheckInStatus>> {
        let settings = self.settings.snapshot();
        settings
            .roster
            .iter()
            .map(|person| -> RepoResult<CheckInStatus> {
                Ok(CheckInStatus {
                    name: person.name.clone(),
                    avatar: person.avatar.clone(),
                    uploaded: self.repo.has_checked_in(&person.name, date)?,
                })
            })
            .collect()
    }
}
