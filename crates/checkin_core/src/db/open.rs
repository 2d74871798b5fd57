//! Connection bootstrap for the attendance database.
//!
//! # Invariants
//! - Returned connections wait up to five seconds on a locked database.
//! - Returned connections are at [`super::migrations::latest_version`].

use super::migrations::apply_migrations;
use super::{DbError, DbLocation, DbResult};
use log::{error, info};
use rusqlite::Connection;
use std::path::Path;
use std::time::{Duration, Instant};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Opens the attendance database file and applies all pending migrations.
///
/// The file is created when missing.
pub fn open_db(path: impl AsRef<Path>) -> DbResult<Connection> {
    open_at(DbLocation::File(path.as_ref().to_path_buf()))
}

/// Opens an in-memory attendance database, mostly for tests and dry runs.
pub fn open_db_in_memory() -> DbResult<Connection> {
    open_at(DbLocation::Memory)
}

fn open_at(location: DbLocation) -> DbResult<Connection> {
    let started_at = Instant::now();
    let mode = location.mode();
    info!("event=db_open module=db status=start mode={mode} location={location}");

    let result = connect(&location).and_then(|mut conn| {
        let applied = apply_migrations(&mut conn)?;
        Ok((conn, applied))
    });

    match result {
        Ok((conn, applied)) => {
            info!(
                "event=db_open module=db status=ok mode={mode} migrations_applied={applied} duration_ms={}",
                started_at.elapsed().as_millis()
            );
            Ok(conn)
        }
        Err(err) => {
            error!(
                "event=db_open module=db status=error mode={mode} location={location} duration_ms={} error={err}",
                started_at.elapsed().as_millis()
            );
            Err(err)
        }
    }
}

fn connect(location: &DbLocation) -> DbResult<Connection> {
    let conn = match location {
        DbLocation::File(path) => Connection::open(path),
        DbLocation::Memory => Connection::open_in_memory(),
    }
    .and_then(|conn| {
        conn.busy_timeout(BUSY_TIMEOUT)?;
        Ok(conn)
    });

    conn.map_err(|source| DbError::Open {
        location: location.clone(),
        source,
    })
}
