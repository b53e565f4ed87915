//! Worker database schema.
//!
//! The schema version lives in `PRAGMA user_version`. Migration `n` (1-based)
//! moves the database from version `n - 1` to `n` inside one transaction.

use rusqlite::Connection;

use crate::error::{Result, ShowroomError};

const MIGRATIONS: &[&str] = &[
    include_str!("../../migrations/001_cache_stores.sql"),
    include_str!("../../migrations/002_pending_submissions.sql"),
    include_str!("../../migrations/003_worker_meta.sql"),
];

/// Schema version written by this build.
#[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
pub const LATEST_SCHEMA_VERSION: i32 = MIGRATIONS.len() as i32;

fn storage_err(context: &str, e: &rusqlite::Error) -> ShowroomError {
    ShowroomError::Storage(format!("{context}: {e}"))
}

fn user_version(conn: &Connection) -> Result<i32> {
    conn.pragma_query_value(None, "user_version", |row| row.get(0))
        .map_err(|e| storage_err("read schema version", &e))
}

/// Bring the database up to [`LATEST_SCHEMA_VERSION`]. Returns that version.
///
/// # Errors
/// Returns an error if a migration fails, or if the database was written by
/// a newer build.
pub fn run_migrations(conn: &mut Connection) -> Result<i32> {
    let current = user_version(conn)?;
    if current > LATEST_SCHEMA_VERSION {
        return Err(ShowroomError::Storage(format!(
            "worker database is at schema {current}, this build knows {LATEST_SCHEMA_VERSION}"
        )));
    }

    for (version, sql) in (1..).zip(MIGRATIONS).skip_while(|(v, _)| *v <= current) {
        let tx = conn
            .transaction()
            .map_err(|e| storage_err("begin migration", &e))?;
        tx.execute_batch(sql)
            .map_err(|e| storage_err(&format!("migration {version}"), &e))?;
        tx.pragma_update(None, "user_version", version)
            .map_err(|e| storage_err(&format!("stamp migration {version}"), &e))?;
        tx.commit()
            .map_err(|e| storage_err(&format!("commit migration {version}"), &e))?;
        tracing::debug!(version, "Applied worker migration");
    }

    Ok(LATEST_SCHEMA_VERSION)
}
