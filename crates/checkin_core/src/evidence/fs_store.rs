//! Filesystem evidence store laid out as `<root>/<YYYY-MM-DD>/<name><ext>`.

use super::{BlobError, BlobResult, EvidenceBlobStore};
use crate::model::date_key;
use chrono::NaiveDate;
use log::{debug, info};
use once_cell::sync::Lazy;
use regex::Regex;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use uuid::Uuid;

const DEFAULT_EXTENSION: &str = ".jpg";

static UNSAFE_NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[\s/\\:]+").expect("valid unsafe-name regex"));

/// Evidence store rooted at a local directory.
#[derive(Debug, Clone)]
pub struct FsEvidenceStore {
    root: PathBuf,
}

impl FsEvidenceStore {
    /// Creates the root directory when missing.
    pub fn open(root: impl Into<PathBuf>) -> BlobResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|source| io_error(&root, source))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding every blob for `date`.
    pub fn date_dir(&self, date: NaiveDate) -> PathBuf {
        self.root.join(date_key(date))
    }
}

impl EvidenceBlobStore for FsEvidenceStore {
    fn store(
        &self,
        name: &str,
        date: NaiveDate,
        extension: &str,
        bytes: &[u8],
    ) -> BlobResult<String> {
        let file_stem = safe_file_stem(name)?;
        let dir = self.date_dir(date);
        fs::create_dir_all(&dir).map_err(|source| io_error(&dir, source))?;

        let target = dir.join(format!("{file_stem}{}", normalize_extension(extension)));
        let staging = dir.join(format!(".{file_stem}.{}.tmp", Uuid::new_v4()));
        fs::write(&staging, bytes).map_err(|source| io_error(&staging, source))?;
        if let Err(source) = fs::rename(&staging, &target) {
            let _ = fs::remove_file(&staging);
            return Err(io_error(&target, source));
        }

        debug!(
            "event=evidence_store module=evidence status=ok name={name} date={date} bytes={}",
            bytes.len()
        );
        Ok(target.to_string_lossy().into_owned())
    }

    fn remove_except(&self, name: &str, date: NaiveDate, keep: &str) -> BlobResult<usize> {
        let file_stem = safe_file_stem(name)?;
        let dir = self.date_dir(date);
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(0),
            Err(source) => return Err(io_error(&dir, source)),
        };

        let keep = Path::new(keep);
        let mut removed = 0;
        for entry in entries {
            let path = entry.map_err(|source| io_error(&dir, source))?.path();
            let matches = path.is_file()
                && path != keep
                && path.file_stem().and_then(|stem| stem.to_str()) == Some(file_stem.as_str());
            if matches {
                fs::remove_file(&path).map_err(|source| io_error(&path, source))?;
                removed += 1;
                debug!(
                    "event=evidence_remove module=evidence status=ok name={name} date={date} path={}",
                    path.display()
                );
            }
        }
        Ok(removed)
    }

    fn purge_date(&self, date: NaiveDate) -> BlobResult<()> {
        let dir = self.date_dir(date);
        match fs::remove_dir_all(&dir) {
            Ok(()) => {}
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!(
                    "event=evidence_purge module=evidence status=skip date={date} reason=missing_dir"
                );
            }
            Err(source) => return Err(io_error(&dir, source)),
        }
        fs::create_dir_all(&dir).map_err(|source| io_error(&dir, source))?;

        info!(
            "event=evidence_purge module=evidence status=ok date={date} dir={}",
            dir.display()
        );
        Ok(())
    }
}

/// Maps a person name to the file stem used for their evidence.
///
/// Whitespace, path separators and drive colons collapse to `_`.
pub fn safe_file_stem(name: &str) -> BlobResult<String> {
    let stem = UNSAFE_NAME_RE.replace_all(name.trim(), "_").into_owned();
    if stem.is_empty() || stem.trim_matches('_').is_empty() || stem.starts_with('.') {
        return Err(BlobError::InvalidName(name.to_string()));
    }
    Ok(stem)
}

/// Returns a lowercase `.ext` suffix, falling back to `.jpg`.
pub fn normalize_extension(extension: &str) -> String {
    let cleaned: String = extension
        .trim()
        .trim_start_matches('.')
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_lowercase())
        .collect();
    if cleaned.is_empty() {
        DEFAULT_EXTENSION.to_string()
    } else {
        format!(".{cleaned}")
    }
}

fn io_error(path: &Path, source: std::io::Error) -> BlobError {
    BlobError::Io {
        path: path.to_path_buf(),
        source,
    }
}
