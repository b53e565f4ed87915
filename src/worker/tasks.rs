//! Tracked background work.
//!
//! Stale-while-revalidate answers from the store and keeps fetching after
//! the response has gone out. Those fetches are spawned here instead of
//! being dropped on the runtime, so each one is logged and counted and
//! tests can wait for them with [`BackgroundTasks::settle`].

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::task::JoinSet;

use crate::error::Result;

/// Counters for background work.
#[derive(Debug, Default)]
pub struct TaskStats {
    /// Tasks spawned.
    pub spawned: AtomicU64,
    /// Tasks that finished with `Ok`.
    pub completed: AtomicU64,
    /// Tasks that returned an error or panicked.
    pub failed: AtomicU64,
}

impl TaskStats {
    /// Tasks spawned but not yet finished.
    #[must_use]
    pub fn in_flight(&self) -> u64 {
        let done = self.completed.load(Ordering::Relaxed) + self.failed.load(Ordering::Relaxed);
        self.spawned.load(Ordering::Relaxed).saturating_sub(done)
    }
}

/// Owner of detached worker tasks.
#[derive(Debug, Default)]
pub struct BackgroundTasks {
    set: Mutex<JoinSet<()>>,
    stats: Arc<TaskStats>,
}

impl BackgroundTasks {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn a labelled task onto the current runtime.
    ///
    /// The outcome is logged and counted; it is never returned to a caller.
    pub fn spawn<Fut>(&self, label: &'static str, task: Fut)
    where
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let stats = Arc::clone(&self.stats);
        stats.spawned.fetch_add(1, Ordering::Relaxed);

        let mut set = self.set.lock().unwrap_or_else(PoisonError::into_inner);
        // Reap finished tasks so the set does not grow without bound.
        while let Some(joined) = set.try_join_next() {
            if joined.is_err() {
                stats.failed.fetch_add(1, Ordering::Relaxed);
            }
        }

        set.spawn(async move {
            match task.await {
                Ok(()) => {
                    stats.completed.fetch_add(1, Ordering::Relaxed);
                    tracing::debug!(task = label, "Background task completed");
                }
                Err(e) => {
                    stats.failed.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!(task = label, error = %e, "Background task failed");
                }
            }
        });
    }

    /// Wait until every task spawned so far (and any they spawn) has finished.
    pub async fn settle(&self) {
        loop {
            let mut pending = {
                let mut set = self.set.lock().unwrap_or_else(PoisonError::into_inner);
                if set.is_empty() {
                    return;
                }
                std::mem::take(&mut *set)
            };

            while let Some(joined) = pending.join_next().await {
                if let Err(e) = joined {
                    self.stats.failed.fetch_add(1, Ordering::Relaxed);
                    tracing::error!(error = %e, "Background task panicked");
                }
            }
        }
    }

    /// Shared counters.
    #[must_use]
    pub fn stats(&self) -> &TaskStats {
        &self.stats
    }
}
