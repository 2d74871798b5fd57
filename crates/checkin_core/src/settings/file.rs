//! JSON settings file provider with change detection.

use super::{ConfigError, Settings, SettingsProvider, SharedSettings};
use log::{debug, info, warn};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::SystemTime;

/// Settings provider backed by a JSON file.
///
/// `snapshot()` re-reads the file whenever its modification time or length
/// changes. An unreadable or invalid update keeps the previous snapshot active
/// and is retried on every snapshot until it parses, so a completed save that
/// lands in the same mtime granule as a partial one is still picked up.
#[derive(Debug)]
pub struct JsonFileSettings {
    path: PathBuf,
    shared: SharedSettings,
    state: Mutex<FileState>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Fingerprint {
    modified: SystemTime,
    len: u64,
}

#[derive(Debug, Default)]
struct FileState {
    seen: Option<Fingerprint>,
    /// The file at `seen` failed to load.
    failing: bool,
}

impl JsonFileSettings {
    /// Loads the file; any failure here is fatal for the caller.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let seen = fingerprint(&path);
        let settings = read_settings(&path)?;
        info!(
            "event=settings_load module=settings status=ok path={} roster_size={}",
            path.display(),
            settings.roster.len()
        );

        Ok(Self {
            path,
            shared: SharedSettings::new(settings),
            state: Mutex::new(FileState {
                seen,
                failing: false,
            }),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Re-reads the file unconditionally and publishes it on success.
    pub fn reload(&self) -> Result<(), ConfigError> {
        let seen = fingerprint(&self.path);
        let result = read_settings(&self.path);
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = FileState {
            seen,
            failing: result.is_err(),
        };

        let settings = result?;
        info!(
            "event=settings_reload module=settings status=ok path={} roster_size={}",
            self.path.display(),
            settings.roster.len()
        );
        self.shared.replace(settings);
        Ok(())
    }

    fn refresh_if_changed(&self) {
        let current = fingerprint(&self.path);
        let (changed, already_reported) = {
            let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            (
                state.failing || state.seen != current,
                state.failing && state.seen == current,
            )
        };
        if !changed {
            return;
        }

        match self.reload() {
            Ok(()) => {}
            Err(err) if already_reported => debug!(
                "event=settings_reload module=settings status=retry path={} error={err}",
                self.path.display()
            ),
            Err(err) => warn!(
                "event=settings_reload module=settings status=error path={} action=keep_previous error={err}",
                self.path.display()
            ),
        }
    }
}

impl SettingsProvider for JsonFileSettings {
    fn snapshot(&self) -> Arc<Settings> {
        self.refresh_if_changed();
        self.shared.snapshot()
    }

    fn version(&self) -> u64 {
        self.shared.version()
    }
}

fn read_settings(path: &Path) -> Result<Settings, ConfigError> {
    let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Settings::from_json_str(&text)
}

fn fingerprint(path: &Path) -> Option<Fingerprint> {
    let meta = fs::metadata(path).ok()?;
    Some(Fingerprint {
        modified: meta.modified().ok()?,
        len: meta.len(),
    })
}
