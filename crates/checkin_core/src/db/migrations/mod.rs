//! Ordered schema steps for the attendance table.
//!
//! # Invariants
//! - Step versions are contiguous from 1 and never reused.
//! - Every pending step runs in one transaction, so a failed run leaves the
//!   previous schema version in place.

use crate::db::{DbError, DbResult};
use log::info;
use rusqlite::Connection;

struct SchemaStep {
    version: u32,
    /// Shown in logs and in [`DbError::Migration`].
    purpose: &'static str,
    sql: &'static str,
}

const SCHEMA_STEPS: &[SchemaStep] = &[
    SchemaStep {
        version: 1,
        purpose: "create checkin_records keyed by (name, date)",
        sql: include_str!("0001_checkin_records.sql"),
    },
    SchemaStep {
        version: 2,
        purpose: "index checkin_records by date for summary and purge",
        sql: include_str!("0002_checkin_date_index.sql"),
    },
];

/// Schema version this build writes.
pub fn latest_version() -> u32 {
    SCHEMA_STEPS.last().map_or(0, |step| step.version)
}

/// Brings the attendance schema up to [`latest_version`].
///
/// Returns how many steps were applied; `0` for an up-to-date database.
pub fn apply_migrations(conn: &mut Connection) -> DbResult<usize> {
    let db_version: u32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    let latest = latest_version();
    if db_version > latest {
        return Err(DbError::UnsupportedSchemaVersion {
            db_version,
            latest_supported: latest,
        });
    }

    let pending: Vec<&SchemaStep> = SCHEMA_STEPS
        .iter()
        .filter(|step| step.version > db_version)
        .collect();
    if pending.is_empty() {
        return Ok(0);
    }

    let tx = conn.transaction()?;
    for step in &pending {
        tx.execute_batch(step.sql)
            .and_then(|()| tx.pragma_update(None, "user_version", step.version))
            .map_err(|source| DbError::Migration {
                version: step.version,
                step: step.purpose,
                source,
            })?;
        info!(
            "event=db_migrate module=db status=ok version={} step=\"{}\"",
            step.version, step.purpose
        );
    }
    tx.commit()?;

    Ok(pending.len())
}
