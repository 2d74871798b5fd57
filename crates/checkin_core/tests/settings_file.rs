use checkin_core::{ConfigError, JsonFileSettings, SettingsProvider};
use serde_json::json;
use std::fs::{self, OpenOptions};
use std::path::Path;
use std::thread;
use std::time::{Duration, SystemTime};

fn write_json(path: &Path, value: serde_json::Value) {
    fs::write(path, serde_json::to_vec_pretty(&value).unwrap()).unwrap();
}

fn config(names: &[&str], mention: &str) -> serde_json::Value {
    json!({
        "checkInPersonList": names
            .iter()
            .map(|name| json!({"name": name, "email": format!("{name}@x")}))
            .collect::<Vec<_>>(),
        "mentionTime": mention,
        "checkInTime": "21:00",
        "tokenMd5": "ignored"
    })
}

/// Rewrites the file until its modification time visibly changes.
fn rewrite(path: &Path, value: serde_json::Value) {
    rewrite_raw(path, &serde_json::to_vec_pretty(&value).unwrap());
}

fn rewrite_raw(path: &Path, bytes: &[u8]) {
    let before = modified(path);
    loop {
        thread::sleep(Duration::from_millis(20));
        fs::write(path, bytes).unwrap();
        if modified(path) != before {
            return;
        }
    }
}

fn modified(path: &Path) -> SystemTime {
    fs::metadata(path).unwrap().modified().unwrap()
}

fn set_modified(path: &Path, at: SystemTime) {
    OpenOptions::new()
        .write(true)
        .open(path)
        .unwrap()
        .set_modified(at)
        .unwrap();
}

#[test]
fn load_reads_roster_and_marks() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    write_json(&path, config(&["Alice", "Bob"], "17:00"));

    let settings = JsonFileSettings::load(&path).unwrap();
    let snapshot = settings.snapshot();

    assert_eq!(snapshot.roster.len(), 2);
    assert_eq!(snapshot.roster[1].reachable_email(), Some("Bob@x"));
    assert_eq!(snapshot.reminder_time, "17:00");
    assert_eq!(snapshot.summary_time, "21:00");
}

#[test]
fn load_failures_are_config_errors() {
    let dir = tempfile::tempdir().unwrap();

    let missing = JsonFileSettings::load(dir.path().join("absent.json")).unwrap_err();
    assert!(matches!(missing, ConfigError::Io { .. }));

    let broken = dir.path().join("broken.json");
    fs::write(&broken, "{ not json").unwrap();
    assert!(matches!(
        JsonFileSettings::load(&broken).unwrap_err(),
        ConfigError::Parse(_)
    ));

    let duplicate = dir.path().join("duplicate.json");
    write_json(&duplicate, config(&["Alice", "Alice"], "17:00"));
    assert!(matches!(
        JsonFileSettings::load(&duplicate).unwrap_err(),
        ConfigError::DuplicatePerson(_)
    ));

    let padded = dir.path().join("padded.json");
    write_json(&padded, config(&["Alice", "Bob "], "17:00"));
    assert!(matches!(
        JsonFileSettings::load(&padded).unwrap_err(),
        ConfigError::PaddedName { index: 1, .. }
    ));
}

#[test]
fn snapshot_picks_up_file_changes() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    write_json(&path, config(&["Alice"], "17:00"));
    let settings = JsonFileSettings::load(&path).unwrap();
    let before = settings.snapshot();
    let version_before = settings.version();

    rewrite(&path, config(&["Alice", "Bob"], "18:00"));

    let after = settings.snapshot();
    assert_eq!(after.roster.len(), 2);
    assert_eq!(after.reminder_time, "18:00");
    assert!(settings.version() > version_before);
    assert_eq!(before.roster.len(), 1);
}

#[test]
fn invalid_update_keeps_previous_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    write_json(&path, config(&["Alice"], "17:00"));
    let settings = JsonFileSettings::load(&path).unwrap();

    rewrite(&path, config(&["Alice", "Alice"], "18:00"));

    let snapshot = settings.snapshot();
    assert_eq!(snapshot.roster.len(), 1);
    assert_eq!(snapshot.reminder_time, "17:00");
    assert!(settings.reload().is_err());
}

#[test]
fn completed_save_with_same_mtime_replaces_partial_one() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    write_json(&path, config(&["Alice"], "17:00"));
    let settings = JsonFileSettings::load(&path).unwrap();

    let complete = serde_json::to_vec_pretty(&config(&["Alice"], "18:30")).unwrap();
    rewrite_raw(&path, &complete[..complete.len() / 2]);
    let partial_at = modified(&path);
    assert_eq!(settings.snapshot().reminder_time, "17:00");
    assert_eq!(settings.snapshot().reminder_time, "17:00");

    fs::write(&path, &complete).unwrap();
    set_modified(&path, partial_at);

    assert_eq!(settings.snapshot().reminder_time, "18:30");
}

#[test]
fn completed_save_with_same_mtime_and_length_is_still_loaded() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    write_json(&path, config(&["Alice"], "17:00"));
    let settings = JsonFileSettings::load(&path).unwrap();

    let complete = serde_json::to_vec_pretty(&config(&["Alice"], "18:30")).unwrap();
    let mut garbled = complete.clone();
    garbled[0] = b'?';
    rewrite_raw(&path, &garbled);
    let garbled_at = modified(&path);
    assert_eq!(settings.snapshot().reminder_time, "17:00");

    fs::write(&path, &complete).unwrap();
    set_modified(&path, garbled_at);

    assert_eq!(settings.snapshot().reminder_time, "18:30");
}
