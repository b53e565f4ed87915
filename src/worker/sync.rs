//! Background sync of queued form submissions.
//!
//! A sync pass walks the pending queue oldest-first and retries each entry
//! once. An entry is delivered when the fetch resolves with a status below
//! 500; a network failure or a 5xx keeps it queued with the error recorded.
//! One entry failing never stops the pass.

use serde::Serialize;

use super::fetcher::Fetcher;
use crate::error::Result;
use crate::storage::WorkerDb;
use crate::storage::db::META_SYNC_TAGS;
use crate::storage::queue::PendingQueue;

/// Outcome of one sync pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    /// Entries retried.
    pub attempted: usize,
    /// Entries delivered and dequeued.
    pub delivered: usize,
    /// Entries still queued after the pass.
    pub remaining: usize,
}

/// Registered sync tags, persisted so a restart still syncs.
#[derive(Debug, Clone)]
pub struct SyncRegistry {
    db: WorkerDb,
}

impl SyncRegistry {
    #[must_use]
    pub const fn new(db: WorkerDb) -> Self {
        Self { db }
    }

    /// Registered tags in registration order.
    ///
    /// # Errors
    /// Returns an error if the stored list cannot be read.
    pub fn tags(&self) -> Result<Vec<String>> {
        match self.db.get_meta(META_SYNC_TAGS)? {
            Some(raw) => Ok(serde_json::from_str(&raw)?),
            None => Ok(Vec::new()),
        }
    }

    /// Register a tag. Registering twice is a no-op.
    ///
    /// # Errors
    /// Returns an error if the list cannot be written.
    pub fn register(&self, tag: &str) -> Result<()> {
        let mut tags = self.tags()?;
        if !tags.iter().any(|t| t == tag) {
            tags.push(tag.to_string());
            self.db.set_meta(META_SYNC_TAGS, &serde_json::to_string(&tags)?)?;
            tracing::debug!(tag, "Sync tag registered");
        }
        Ok(())
    }

    /// Drop a tag once its work is done.
    ///
    /// # Errors
    /// Returns an error if the list cannot be written.
    pub fn unregister(&self, tag: &str) -> Result<()> {
        let mut tags = self.tags()?;
        let before = tags.len();
        tags.retain(|t| t != tag);
        if tags.len() != before {
            self.db.set_meta(META_SYNC_TAGS, &serde_json::to_string(&tags)?)?;
        }
        Ok(())
    }
}

/// Retry every queued submission once, oldest first.
///
/// Storage errors on a single entry are logged and the pass moves on.
///
/// # Errors
/// Returns an error only if the queue itself cannot be read or counted.
pub async fn replay<F: Fetcher>(queue: &PendingQueue, fetcher: &F) -> Result<SyncReport> {
    let pending = queue.list()?;
    let mut report = SyncReport {
        attempted: pending.len(),
        ..SyncReport::default()
    };

    for entry in pending {
        match fetcher.fetch(&entry.request).await {
            Ok(response) if response.status < 500 => {
                report.delivered += 1;
                tracing::info!(
                    id = entry.id,
                    url = %entry.request.url,
                    status = response.status,
                    "Queued submission delivered"
                );
                if let Err(e) = queue.remove(entry.id) {
                    tracing::error!(id = entry.id, error = %e, "Delivered submission could not be dequeued");
                }
            }
            Ok(response) => {
                let reason = format!("HTTP {}", response.status);
                tracing::warn!(id = entry.id, url = %entry.request.url, %reason, "Queued submission rejected, will retry");
                note_failure(queue, entry.id, &reason);
            }
            Err(e) => {
                tracing::warn!(id = entry.id, url = %entry.request.url, error = %e, "Queued submission still undeliverable");
                note_failure(queue, entry.id, &e.to_string());
            }
        }
    }

    report.remaining = queue.len()?;
    Ok(report)
}

fn note_failure(queue: &PendingQueue, id: i64, reason: &str) {
    if let Err(e) = queue.record_failure(id, reason) {
        tracing::warn!(id, error = %e, "Could not record failed delivery");
    }
}
