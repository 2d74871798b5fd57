//! Evidence blob storage contract and filesystem implementation.
//!
//! # Responsibility
//! - Store, replace and purge the proof files attached to check-ins.
//!
//! # Invariants
//! - Blobs are keyed by `(person name, date)`; after `remove_except` with the
//!   freshly stored location, one person keeps exactly one blob per date.
//! - `purge_date` is idempotent.

pub mod fs_store;

use chrono::NaiveDate;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

pub type BlobResult<T> = Result<T, BlobError>;

#[derive(Debug)]
pub enum BlobError {
    Io { path: PathBuf, source: std::io::Error },
    /// Person name cannot be mapped to a safe file name.
    InvalidName(String),
}

impl Display for BlobError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "evidence io error at `{}`: {source}", path.display())
            }
            Self::InvalidName(name) => {
                write!(f, "name cannot be used for evidence files: `{name}`")
            }
        }
    }
}

impl Error for BlobError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::InvalidName(_) => None,
        }
    }
}

/// Storage for the day's proof files.
pub trait EvidenceBlobStore: Send + Sync {
    /// Writes `bytes` for `(name, date)` and returns the stored location.
    fn store(
        &self,
        name: &str,
        date: NaiveDate,
        extension: &str,
        bytes: &[u8],
    ) -> BlobResult<String>;
    /// Removes every blob stored for `(name, date)` other than `keep`,
    /// whatever its extension. Returns how many blobs were removed.
    fn remove_except(&self, name: &str, date: NaiveDate, keep: &str) -> BlobResult<usize>;
    /// Removes every blob for `date`, leaving an empty slot for new uploads.
    fn purge_date(&self, date: NaiveDate) -> BlobResult<()>;
}
