//! Live settings: roster plus reminder and summary time marks.
//!
//! # Responsibility
//! - Hand out immutable settings snapshots to engines and the scheduler.
//! - Validate roster identity rules when settings are loaded.
//!
//! # Invariants
//! - Consumers read one `Arc<Settings>` per decision and never observe a
//!   partially applied update.
//! - Person names are non-empty, carry no surrounding whitespace and are
//!   unique within a roster, so a trimmed submission name always finds its
//!   roster entry.
//! - Time marks are not validated here; malformed marks never fire.

mod file;

pub use file::JsonFileSettings;

use crate::model::person::Person;
use crate::model::time_mark::parse_time_mark;
use log::warn;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

/// One consistent view of the configuration file.
///
/// Field names follow the on-disk JSON keys. Keys belonging to other layers
/// (mail transport, request tokens) are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(rename = "checkInPersonList", default)]
    pub roster: Vec<Person>,
    /// `HH:MM` mark for the individual reminder pass.
    #[serde(rename = "mentionTime", default)]
    pub reminder_time: String,
    /// `HH:MM` mark for the summary and purge pass.
    #[serde(rename = "checkInTime", default)]
    pub summary_time: String,
}

impl Settings {
    /// Parses and validates settings from JSON text.
    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        let settings: Self = serde_json::from_str(text).map_err(ConfigError::Parse)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Checks roster identity rules and warns about unusable time marks.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut seen = HashSet::with_capacity(self.roster.len());
        for (index, person) in self.roster.iter().enumerate() {
            let trimmed = person.name.trim();
            if trimmed.is_empty() {
                return Err(ConfigError::EmptyName { index });
            }
            if trimmed.len() != person.name.len() {
                return Err(ConfigError::PaddedName {
                    index,
                    name: person.name.clone(),
                });
            }
            if !seen.insert(person.name.as_str()) {
                return Err(ConfigError::DuplicatePerson(person.name.clone()));
            }
        }

        for (key, value) in [
            ("mentionTime", &self.reminder_time),
            ("checkInTime", &self.summary_time),
        ] {
            if let Err(err) = parse_time_mark(value) {
                warn!("event=settings_validate module=settings status=warn key={key} error={err}");
            }
        }
        Ok(())
    }

    pub fn person(&self, name: &str) -> Option<&Person> {
        self.roster.iter().find(|person| person.name == name)
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Parse(serde_json::Error),
    EmptyName {
        index: usize,
    },
    PaddedName {
        index: usize,
        name: String,
    },
    DuplicatePerson(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "failed to read settings `{}`: {source}", path.display())
            }
            Self::Parse(err) => write!(f, "failed to parse settings: {err}"),
            Self::EmptyName { index } => write!(f, "roster entry {index} has an empty name"),
            Self::PaddedName { index, name } => write!(
                f,
                "roster entry {index} name `{name}` has leading or trailing whitespace"
            ),
            Self::DuplicatePerson(name) => write!(f, "roster lists `{name}` more than once"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Parse(err) => Some(err),
            Self::EmptyName { .. } | Self::PaddedName { .. } | Self::DuplicatePerson(_) => None,
        }
    }
}

/// Read-only source of settings snapshots.
pub trait SettingsProvider: Send + Sync {
    /// Returns the current snapshot. Cheap; callers must not cache it across
    /// decisions.
    fn snapshot(&self) -> Arc<Settings>;
    /// Increments every time a new snapshot is published.
    fn version(&self) -> u64;
}

/// In-memory provider with atomic snapshot replacement.
#[derive(Debug, Default)]
pub struct SharedSettings {
    current: RwLock<Arc<Settings>>,
    version: AtomicU64,
}

impl SharedSettings {
    pub fn new(settings: Settings) -> Self {
        Self {
            current: RwLock::new(Arc::new(settings)),
            version: AtomicU64::new(1),
        }
    }

    /// Publishes a new snapshot. Readers holding the previous one keep it.
    pub fn replace(&self, settings: Settings) {
        let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
        *current = Arc::new(settings);
        self.version.fetch_add(1, Ordering::SeqCst);
    }
}

impl SettingsProvider for SharedSettings {
    fn snapshot(&self) -> Arc<Settings> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn version(&self) -> u64 {
        self.version.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::{ConfigError, Settings, SettingsProvider, SharedSettings};
    use crate::model::person::Person;

    #[test]
    fn parses_source_config_layout_and_ignores_transport_keys() {
        let settings = Settings::from_json_str(
            r#"{
                "checkInPersonList": [
                    {"name": "Alice", "email": "a@x", "avatar": "alice.png"},
                    {"name": "Bob", "email": ""}
                ],
                "mentionTime": "17:00",
                "checkInTime": "21:30",
                "tokenMd5": "0123456789abcdef",
                "smtpHost": "smtp.example.com",
                "smtpPort": 465
            }"#,
        )
        .expect("settings should parse");

        assert_eq!(settings.roster.len(), 2);
        assert_eq!(settings.roster[0].avatar.as_deref(), Some("alice.png"));
        assert_eq!(settings.roster[1].reachable_email(), None);
        assert_eq!(settings.reminder_time, "17:00");
        assert_eq!(settings.summary_time, "21:30");
    }

    #[test]
    fn rejects_duplicate_and_blank_names() {
        let duplicate = Settings {
            roster: vec![Person::new("Alice"), Person::new("Alice")],
            ..Settings::default()
        };
        assert!(matches!(
            duplicate.validate(),
            Err(ConfigError::DuplicatePerson(name)) if name == "Alice"
        ));

        let blank = Settings {
            roster: vec![Person::new("Alice"), Person::new("  ")],
            ..Settings::default()
        };
        assert!(matches!(
            blank.validate(),
            Err(ConfigError::EmptyName { index: 1 })
        ));
    }

    #[test]
    fn rejects_names_with_surrounding_whitespace() {
        for name in ["Bob ", " Bob", "Bob\t"] {
            let settings = Settings {
                roster: vec![Person::new("Alice"), Person::new(name)],
                ..Settings::default()
            };
            assert!(matches!(
                settings.validate(),
                Err(ConfigError::PaddedName { index: 1, name: padded }) if padded == name
            ));
        }

        let inner_space = Settings {
            roster: vec![Person::new("Mary Ann")],
            ..Settings::default()
        };
        assert!(inner_space.validate().is_ok());
    }

    #[test]
    fn malformed_time_marks_do_not_fail_validation() {
        let settings = Settings {
            roster: vec![Person::new("Alice")],
            reminder_time: "late".to_string(),
            summary_time: "25:00".to_string(),
        };
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn replace_publishes_new_snapshot_without_touching_old_one() {
        let shared = SharedSettings::new(Settings {
            reminder_time: "08:00".to_string(),
            ..Settings::default()
        });
        let before = shared.snapshot();
        let version_before = shared.version();

        shared.replace(Settings {
            reminder_time: "09:00".to_string(),
            ..Settings::default()
        });

        assert_eq!(before.reminder_time, "08:00");
        assert_eq!(shared.snapshot().reminder_time, "09:00");
        assert!(shared.version() > version_before);
    }
}
