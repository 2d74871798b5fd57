//! Attendance repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Own persistence of `CheckInRecord` rows, one per `(name, date)`.
//! - Answer "has person P checked in on date D" as the single source of truth.
//!
//! # Invariants
//! - `record_check_in` upserts; a second call for the same pair replaces the
//!   evidence location and timestamp instead of inserting a second row.
//! - Read paths surface storage failures as errors; they never report
//!   "not checked in" in place of an error.
//! - All statements run under one connection mutex, so conflicting writes to
//!   the same pair are serialized and resolve last-write-wins.

use crate::db::{open_db, DbError};
use crate::model::record::CheckInRecord;
use crate::model::{date_key, parse_date_key};
use chrono::{DateTime, Local, NaiveDate, SecondsFormat};
use log::{debug, error, info};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

const RECORD_SELECT_SQL: &str = "SELECT
    name,
    date,
    evidence_path,
    recorded_at
FROM checkin_records";

pub type RepoResult<T> = Result<T, RepoError>;

/// Storage error for attendance persistence and query operations.
#[derive(Debug)]
pub enum RepoError {
    Db(DbError),
    InvalidData(String),
    LockPoisoned,
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::InvalidData(message) => write!(f, "invalid persisted check-in data: {message}"),
            Self::LockPoisoned => write!(f, "attendance store lock poisoned"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::InvalidData(_) | Self::LockPoisoned => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Durable `(person, date) -> record` mapping.
pub trait AttendanceRepository: Send + Sync {
    /// Inserts or replaces the record for `(name, date)`, stamping it with now.
    fn record_check_in(
        &self,
        name: &str,
        date: NaiveDate,
        evidence_location: &str,
    ) -> RepoResult<()>;
    /// Returns whether a record exists for `(name, date)`.
    fn has_checked_in(&self, name: &str, date: NaiveDate) -> RepoResult<bool>;
    /// Removes every record for `date` and returns how many were removed.
    ///
    /// Calling this for an already-empty date is a no-op.
    fn purge_date(&self, date: NaiveDate) -> RepoResult<usize>;
    fn get_record(&self, name: &str, date: NaiveDate) -> RepoResult<Option<CheckInRecord>>;
    /// Lists records for `date` ordered by name.
    fn list_for_date(&self, date: NaiveDate) -> RepoResult<Vec<CheckInRecord>>;
}

/// SQLite-backed attendance repository.
///
/// The connection is owned behind a mutex so one repository can be shared
/// between request handlers and the scheduler thread.
pub struct SqliteAttendanceRepository {
    conn: Mutex<Connection>,
}

impl SqliteAttendanceRepository {
    /// Wraps a connection that already has migrations applied.
    pub fn new(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }

    /// Opens (or creates) the database file and applies migrations.
    pub fn open(path: impl AsRef<Path>) -> RepoResult<Self> {
        Ok(Self::new(open_db(path)?))
    }

    fn lock(&self) -> RepoResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| {
            error!("event=store_lock module=repo status=error error_code=lock_poisoned");
            RepoError::LockPoisoned
        })
    }
}

impl AttendanceRepository for SqliteAttendanceRepository {
    fn record_check_in(
        &self,
        name: &str,
        date: NaiveDate,
        evidence_location: &str,
    ) -> RepoResult<()> {
        let recorded_at = Local::now().to_rfc3339_opts(SecondsFormat::Millis, false);
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO checkin_records (name, date, evidence_path, recorded_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT (name, date) DO UPDATE SET
                evidence_path = excluded.evidence_path,
                recorded_at = excluded.recorded_at;",
            params![name, date_key(date), evidence_location, recorded_at],
        )
        .map_err(|err| {
            error!(
                "event=record_check_in module=repo status=error name={name} date={date} error={err}"
            );
            err
        })?;

        debug!("event=record_check_in module=repo status=ok name={name} date={date}");
        Ok(())
    }

    fn has_checked_in(&self, name: &str, date: NaiveDate) -> RepoResult<bool> {
        let conn = self.lock()?;
        let exists: i64 = conn
            .query_row(
                "SELECT EXISTS(
                    SELECT 1 FROM checkin_records WHERE name = ?1 AND date = ?2
                );",
                params![name, date_key(date)],
                |row| row.get(0),
            )
            .map_err(|err| {
                error!(
                    "event=has_checked_in module=repo status=error name={name} date={date} error={err}"
                );
                err
            })?;
        Ok(exists == 1)
    }

    fn purge_date(&self, date: NaiveDate) -> RepoResult<usize> {
        let conn = self.lock()?;
        let removed = conn
            .execute(
                "DELETE FROM checkin_records WHERE date = ?1;",
                [date_key(date)],
            )
            .map_err(|err| {
                error!("event=purge_records module=repo status=error date={date} error={err}");
                err
            })?;

        info!("event=purge_records module=repo status=ok date={date} removed={removed}");
        Ok(removed)
    }

    fn get_record(&self, name: &str, date: NaiveDate) -> RepoResult<Option<CheckInRecord>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "{RECORD_SELECT_SQL} WHERE name = ?1 AND date = ?2;"
        ))?;
        let record = stmt
            .query_row(params![name, date_key(date)], |row| Ok(parse_record_row(row)))
            .optional()?;
        record.transpose()
    }

    fn list_for_date(&self, date: NaiveDate) -> RepoResult<Vec<CheckInRecord>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "{RECORD_SELECT_SQL} WHERE date = ?1 ORDER BY name ASC;"
        ))?;
        let mut rows = stmt.query([date_key(date)])?;
        let mut records = Vec::new();

        while let Some(row) = rows.next()? {
            records.push(parse_record_row(row)?);
        }

        Ok(records)
    }
}

fn parse_record_row(row: &Row<'_>) -> RepoResult<CheckInRecord> {
    let date_text: String = row.get("date")?;
    let date = parse_date_key(&date_text).ok_or_else(|| {
        RepoError::InvalidData(format!(
            "invalid date `{date_text}` in checkin_records.date"
        ))
    })?;

    let recorded_text: String = row.get("recorded_at")?;
    let recorded_at = DateTime::parse_from_rfc3339(&recorded_text)
        .map_err(|_| {
            RepoError::InvalidData(format!(
                "invalid timestamp `{recorded_text}` in checkin_records.recorded_at"
            ))
        })?
        .with_timezone(&Local);

    Ok(CheckInRecord {
        person_name: row.get("name")?,
        date,
        evidence_location: row.get("evidence_path")?,
        recorded_at,
    })
}

#[cfg(test)]
mod tests {
    use super::{AttendanceRepository, RepoError, SqliteAttendanceRepository};
    use crate::db::open_db_in_memory;
    use chrono::NaiveDate;

    fn repo() -> SqliteAttendanceRepository {
        SqliteAttendanceRepository::new(open_db_in_memory().expect("in-memory db should open"))
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, d).expect("valid date")
    }

    #[test]
    fn get_record_returns_none_for_unknown_pair() {
        let repo = repo();
        assert!(repo
            .get_record("Alice", day(1))
            .expect("lookup should succeed")
            .is_none());
    }

    #[test]
    fn corrupted_date_is_reported_instead_of_masked() {
        let repo = repo();
        repo.lock()
            .expect("lock")
            .execute(
                "INSERT INTO checkin_records (name, date, evidence_path, recorded_at)
                 VALUES ('Alice', 'not-a-date', 'x', '2024-05-01T08:00:00+00:00');",
                [],
            )
            .expect("raw insert should succeed");

        let mut parse_err = None;
        let conn = repo.lock().expect("lock");
        let mut stmt = conn
            .prepare("SELECT name, date, evidence_path, recorded_at FROM checkin_records;")
            .expect("prepare");
        let mut rows = stmt.query([]).expect("query");
        if let Some(row) = rows.next().expect("row") {
            parse_err = super::parse_record_row(row).err();
        }
        assert!(matches!(parse_err, Some(RepoError::InvalidData(_))));
    }
}
