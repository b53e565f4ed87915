//! Pending-submission queue.
//!
//! Form posts that could not reach the network are kept here, in arrival
//! order, until background sync delivers them. The queue is separate from
//! the response stores so that a version change never drops a lead.

use chrono::{DateTime, Utc};
use reqwest::Method;
use rusqlite::params;
use serde::Serialize;

use crate::core::models::{FetchRequest, RequestMode, parse_url};
use crate::error::{Result, ShowroomError};
use crate::storage::db::WorkerDb;

/// A queued submission.
#[derive(Debug, Clone)]
pub struct PendingSubmission {
    pub id: i64,
    pub request: FetchRequest,
    pub queued_at: DateTime<Utc>,
    pub attempts: u32,
    pub last_error: Option<String>,
}

/// Serializable summary of a queued submission (no body).
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingSummary {
    pub id: i64,
    pub method: String,
    pub url: String,
    pub queued_at: DateTime<Utc>,
    pub attempts: u32,
    pub last_error: Option<String>,
}

impl From<&PendingSubmission> for PendingSummary {
    fn from(pending: &PendingSubmission) -> Self {
        Self {
            id: pending.id,
            method: pending.request.method.to_string(),
            url: pending.request.url.to_string(),
            queued_at: pending.queued_at,
            attempts: pending.attempts,
            last_error: pending.last_error.clone(),
        }
    }
}

/// FIFO queue of pending submissions.
#[derive(Debug, Clone)]
pub struct PendingQueue {
    db: WorkerDb,
}

impl PendingQueue {
    /// Wrap a worker database.
    #[must_use]
    pub const fn new(db: WorkerDb) -> Self {
        Self { db }
    }

    /// Append a request snapshot. Returns its queue id.
    ///
    /// # Errors
    /// Returns an error if the insert fails.
    pub fn enqueue(&self, request: &FetchRequest) -> Result<i64> {
        let headers = serde_json::to_string(&request.headers)?;
        let conn = self.db.lock()?;
        conn.execute(
            "INSERT INTO pending_submissions (method, url, headers, body, queued_at) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                request.method.as_str(),
                request.url.as_str(),
                headers,
                request.body,
                Utc::now().to_rfc3339()
            ],
        )
        .map_err(|e| ShowroomError::Storage(format!("enqueue submission: {e}")))?;
        Ok(conn.last_insert_rowid())
    }

    /// Every queued submission, oldest first.
    ///
    /// Rows that cannot be decoded are skipped with a warning and stay in
    /// the table.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub fn list(&self) -> Result<Vec<PendingSubmission>> {
        let rows = {
            let conn = self.db.lock()?;
            let mut stmt = conn
                .prepare(
                    "SELECT id, method, url, headers, body, queued_at, attempts, last_error \
                     FROM pending_submissions ORDER BY id",
                )
                .map_err(|e| ShowroomError::Storage(format!("prepare queue list: {e}")))?;
            let mapped = stmt
                .query_map([], |row| {
                    Ok(RawRow {
                        id: row.get(0)?,
                        method: row.get(1)?,
                        url: row.get(2)?,
                        headers: row.get(3)?,
                        body: row.get(4)?,
                        queued_at: row.get(5)?,
                        attempts: row.get(6)?,
                        last_error: row.get(7)?,
                    })
                })
                .map_err(|e| ShowroomError::Storage(format!("list queue: {e}")))?;
            mapped
                .collect::<rusqlite::Result<Vec<_>>>()
                .map_err(|e| ShowroomError::Storage(format!("read queue: {e}")))?
        };

        Ok(rows
            .into_iter()
            .filter_map(|row| {
                let id = row.id;
                row.into_pending()
                    .map_err(|e| tracing::warn!(id, error = %e, "Skipping corrupt queued submission"))
                    .ok()
            })
            .collect())
    }

    /// Remove a delivered submission. Returns whether it was still queued.
    ///
    /// # Errors
    /// Returns an error if the delete fails.
    pub fn remove(&self, id: i64) -> Result<bool> {
        let conn = self.db.lock()?;
        let removed = conn
            .execute("DELETE FROM pending_submissions WHERE id = ?1", [id])
            .map_err(|e| ShowroomError::Storage(format!("dequeue {id}: {e}")))?;
        Ok(removed > 0)
    }

    /// Record a failed delivery attempt.
    ///
    /// # Errors
    /// Returns an error if the update fails.
    pub fn record_failure(&self, id: i64, error: &str) -> Result<()> {
        let conn = self.db.lock()?;
        conn.execute(
            "UPDATE pending_submissions SET attempts = attempts + 1, last_error = ?2 \
             WHERE id = ?1",
            params![id, error],
        )
        .map_err(|e| ShowroomError::Storage(format!("record failure for {id}: {e}")))?;
        Ok(())
    }

    /// Number of queued submissions.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub fn len(&self) -> Result<usize> {
        let conn = self.db.lock()?;
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM pending_submissions", [], |row| {
                row.get(0)
            })
            .map_err(|e| ShowroomError::Storage(format!("count queue: {e}")))?;
        Ok(usize::try_from(count).unwrap_or(0))
    }

    /// Whether the queue is empty.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}

struct RawRow {
    id: i64,
    method: String,
    url: String,
    headers: String,
    body: Vec<u8>,
    queued_at: String,
    attempts: u32,
    last_error: Option<String>,
}

impl RawRow {
    fn into_pending(self) -> Result<PendingSubmission> {
        let method = Method::from_bytes(self.method.as_bytes()).map_err(|e| {
            ShowroomError::Storage(format!("corrupt method '{}' in queue: {e}", self.method))
        })?;
        let queued_at = DateTime::parse_from_rfc3339(&self.queued_at)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| ShowroomError::Storage(format!("corrupt queue timestamp: {e}")))?;

        Ok(PendingSubmission {
            id: self.id,
            request: FetchRequest {
                method,
                url: parse_url(&self.url)?,
                headers: serde_json::from_str(&self.headers)?,
                body: self.body,
                mode: RequestMode::Other,
            },
            queued_at,
            attempts: self.attempts,
            last_error: self.last_error,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn queue() -> PendingQueue {
        PendingQueue::new(WorkerDb::open_in_memory().unwrap())
    }

    fn lead(name: &str) -> FetchRequest {
        FetchRequest::post_json(
            "https://cars.example/api/submit-lead",
            &serde_json::json!({ "firstName": name }),
        )
        .unwrap()
    }

    #[test]
    fn fifo_order_and_full_snapshot() {
        let queue = queue();
        let first = queue.enqueue(&lead("Ada")).unwrap();
        let second = queue.enqueue(&lead("Grace")).unwrap();
        assert!(first < second);

        let pending = queue.list().unwrap();
        assert_eq!(pending.len(), 2);
        assert_eq!(pending[0].id, first);
        assert_eq!(pending[0].request, lead("Ada"));
        assert_eq!(pending[1].request.header("content-type"), Some("application/json"));
    }

    #[test]
    fn failures_are_counted_and_remove_dequeues() {
        let queue = queue();
        let id = queue.enqueue(&lead("Ada")).unwrap();

        queue.record_failure(id, "connection refused").unwrap();
        queue.record_failure(id, "timeout").unwrap();
        let pending = &queue.list().unwrap()[0];
        assert_eq!(pending.attempts, 2);
        assert_eq!(pending.last_error.as_deref(), Some("timeout"));

        assert!(queue.remove(id).unwrap());
        assert!(!queue.remove(id).unwrap());
        assert!(queue.is_empty().unwrap());
    }

    #[test]
    fn corrupt_rows_are_skipped() {
        let queue = queue();
        queue.enqueue(&lead("Ada")).unwrap();
        queue
            .db
            .lock()
            .unwrap()
            .execute(
                "INSERT INTO pending_submissions (method, url, headers, body, queued_at) \
                 VALUES ('POST', 'not a url', '[]', x'', 'yesterday')",
                [],
            )
            .unwrap();
        queue.enqueue(&lead("Grace")).unwrap();

        let pending = queue.list().unwrap();
        assert_eq!(pending.len(), 2);
        assert_eq!(pending[1].request, lead("Grace"));
        assert_eq!(queue.len().unwrap(), 3);
    }
}
