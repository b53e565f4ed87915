//! Shared handle to the worker database.
//!
//! The cache store and the pending-submission queue live in one `SQLite`
//! file. Every operation takes the connection lock for a single statement or
//! transaction and releases it before any `.await`.

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use rusqlite::{Connection, OptionalExtension, params};

use crate::error::{Result, ShowroomError};
use crate::storage::schema::run_migrations;

/// Metadata key holding the name of the store the active worker serves from.
pub const META_ACTIVE_STORE: &str = "active_store";

/// Metadata key holding registered sync tags (JSON array).
pub const META_SYNC_TAGS: &str = "sync_tags";

/// Worker database access layer.
#[derive(Debug, Clone)]
pub struct WorkerDb {
    conn: Arc<Mutex<Connection>>,
}

impl WorkerDb {
    /// Create or open a worker database at the given path.
    ///
    /// # Errors
    /// Returns an error if the parent directory cannot be created, the database
    /// cannot be opened, or schema migrations fail.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut conn = Connection::open(path)
            .map_err(|e| ShowroomError::Storage(format!("open worker db: {e}")))?;
        conn.busy_timeout(std::time::Duration::from_secs(5))
            .map_err(|e| ShowroomError::Storage(format!("busy timeout: {e}")))?;

        run_migrations(&mut conn)?;
        tracing::debug!(path = %path.display(), "Opened worker database");

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an in-memory worker database (for testing).
    ///
    /// # Errors
    /// Returns an error if the in-memory database cannot be opened or migrations fail.
    pub fn open_in_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory()
            .map_err(|e| ShowroomError::Storage(format!("open in-memory db: {e}")))?;

        run_migrations(&mut conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Lock the connection.
    pub(crate) fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| ShowroomError::Storage("worker database lock poisoned".to_string()))
    }

    /// Read a metadata value.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub fn get_meta(&self, key: &str) -> Result<Option<String>> {
        let conn = self.lock()?;
        conn.query_row(
            "SELECT value FROM worker_meta WHERE key = ?1",
            [key],
            |row| row.get(0),
        )
        .optional()
        .map_err(|e| ShowroomError::Storage(format!("read meta {key}: {e}")))
    }

    /// Write a metadata value.
    ///
    /// # Errors
    /// Returns an error if the upsert fails.
    pub fn set_meta(&self, key: &str, value: &str) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO worker_meta (key, value) VALUES (?1, ?2) \
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, value],
        )
        .map_err(|e| ShowroomError::Storage(format!("write meta {key}: {e}")))?;
        Ok(())
    }
}
