#![allow(dead_code)]

use checkin_core::db::open_db_in_memory;
use checkin_core::{
    AttendanceRepository, CheckInRecord, DispatchError, DispatchResult, FsEvidenceStore,
    NotificationGateway, Person, ReminderEngine, RepoError, RepoResult, Settings, SharedSettings,
    SqliteAttendanceRepository, SummaryEngine,
};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub recipients: Vec<String>,
    pub subject: String,
    pub body: String,
}

/// Gateway double that records every attempt and fails on demand.
#[derive(Default)]
pub struct RecordingGateway {
    sent: Mutex<Vec<SentMessage>>,
    failing_recipients: Mutex<HashSet<String>>,
    fail_all: Mutex<bool>,
}

impl RecordingGateway {
    pub fn fail_all(&self, fail: bool) {
        *self.fail_all.lock().unwrap() = fail;
    }

    pub fn fail_for(&self, recipient: &str) {
        self.failing_recipients
            .lock()
            .unwrap()
            .insert(recipient.to_string());
    }

    /// Attempts, including failed ones.
    pub fn sent(&self) -> Vec<SentMessage> {
        self.sent.lock().unwrap().clone()
    }
}

impl NotificationGateway for RecordingGateway {
    fn send(&self, recipients: &[String], subject: &str, body: &str) -> DispatchResult {
        self.sent.lock().unwrap().push(SentMessage {
            recipients: recipients.to_vec(),
            subject: subject.to_string(),
            body: body.to_string(),
        });

        if *self.fail_all.lock().unwrap() {
            return Err(DispatchError::Transport("connection refused".to_string()));
        }
        let failing = self.failing_recipients.lock().unwrap();
        if recipients.iter().any(|recipient| failing.contains(recipient)) {
            return Err(DispatchError::Rejected("mailbox unavailable".to_string()));
        }
        Ok(())
    }
}

/// Gateway double that panics on every send.
#[derive(Default)]
pub struct PanickingGateway {
    attempts: AtomicUsize,
}

impl PanickingGateway {
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

impl NotificationGateway for PanickingGateway {
    fn send(&self, _recipients: &[String], _subject: &str, _body: &str) -> DispatchResult {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        panic!("gateway exploded");
    }
}

/// SQLite-backed store whose reads or writes can be switched to fail.
pub struct FaultyRepo {
    inner: SqliteAttendanceRepository,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
}

impl FaultyRepo {
    pub fn new() -> Self {
        Self {
            inner: SqliteAttendanceRepository::new(open_db_in_memory().unwrap()),
            fail_reads: AtomicBool::new(false),
            fail_writes: AtomicBool::new(false),
        }
    }

    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn check(flag: &AtomicBool, op: &str) -> RepoResult<()> {
        if flag.load(Ordering::SeqCst) {
            return Err(RepoError::InvalidData(format!("{op} unavailable")));
        }
        Ok(())
    }
}

impl AttendanceRepository for FaultyRepo {
    fn record_check_in(&self, name: &str, date: NaiveDate, location: &str) -> RepoResult<()> {
        Self::check(&self.fail_writes, "write")?;
        self.inner.record_check_in(name, date, location)
    }

    fn has_checked_in(&self, name: &str, date: NaiveDate) -> RepoResult<bool> {
        Self::check(&self.fail_reads, "read")?;
        self.inner.has_checked_in(name, date)
    }

    fn purge_date(&self, date: NaiveDate) -> RepoResult<usize> {
        Self::check(&self.fail_writes, "write")?;
        self.inner.purge_date(date)
    }

    fn get_record(&self, name: &str, date: NaiveDate) -> RepoResult<Option<CheckInRecord>> {
        Self::check(&self.fail_reads, "read")?;
        self.inner.get_record(name, date)
    }

    fn list_for_date(&self, date: NaiveDate) -> RepoResult<Vec<CheckInRecord>> {
        Self::check(&self.fail_reads, "read")?;
        self.inner.list_for_date(date)
    }
}

pub struct Harness {
    pub settings: Arc<SharedSettings>,
    pub repo: Arc<SqliteAttendanceRepository>,
    pub evidence: Arc<FsEvidenceStore>,
    pub gateway: Arc<RecordingGateway>,
    pub uploads: TempDir,
}

impl Harness {
    pub fn new(roster: Vec<Person>) -> Self {
        Self::with_settings(Settings {
            roster,
            reminder_time: "17:00".to_string(),
            summary_time: "21:00".to_string(),
        })
    }

    pub fn with_settings(settings: Settings) -> Self {
        let uploads = tempfile::tempdir().unwrap();
        Self {
            settings: Arc::new(SharedSettings::new(settings)),
            repo: Arc::new(SqliteAttendanceRepository::new(
                open_db_in_memory().unwrap(),
            )),
            evidence: Arc::new(FsEvidenceStore::open(uploads.path().join("uploads")).unwrap()),
            gateway: Arc::new(RecordingGateway::default()),
            uploads,
        }
    }

    pub fn reminder_engine(&self) -> ReminderEngine {
        ReminderEngine::new(
            self.settings.clone(),
            self.repo.clone(),
            self.gateway.clone(),
        )
    }

    pub fn summary_engine(&self) -> SummaryEngine {
        SummaryEngine::new(
            self.settings.clone(),
            self.repo.clone(),
            self.gateway.clone(),
            self.evidence.clone(),
        )
    }

    /// Records a check-in directly, bypassing blob storage.
    pub fn check_in(&self, name: &str, date: NaiveDate) {
        self.repo
            .record_check_in(name, date, &format!("uploads/{date}/{name}.jpg"))
            .unwrap();
    }
}

pub fn alice() -> Person {
    Person::new("Alice").with_email("a@x")
}

pub fn bob() -> Person {
    Person::new("Bob").with_email("b@x")
}

pub fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 5, d).unwrap()
}

pub fn at(date: NaiveDate, hour: u32, minute: u32, second: u32) -> NaiveDateTime {
    date.and_time(NaiveTime::from_hms_opt(hour, minute, second).unwrap())
}
