//! Offline-first request handling.
//!
//! [`OfflineWorker`] plays the role of a site's service worker: it owns the
//! versioned cache stores, classifies every request to one caching strategy,
//! queues form posts that cannot reach the network and replays them on sync.

pub mod classify;
pub mod config;
pub mod connectivity;
pub mod fetcher;
pub mod lifecycle;
pub mod messages;
pub mod notify;
pub mod strategy;
pub mod sync;
pub mod tasks;

use std::sync::{Arc, Mutex, PoisonError};

use serde_json::json;
use tokio::sync::Mutex as AsyncMutex;

use crate::core::models::{CacheKey, FetchRequest, FetchResponse};
use crate::error::{Result, ShowroomError};
use crate::storage::db::META_ACTIVE_STORE;
use crate::storage::{CacheStorage, PendingQueue, WorkerDb};

pub use classify::{Route, Strategy, classify};
pub use config::WorkerConfig;
pub use fetcher::{Fetcher, HttpFetcher};
pub use lifecycle::{ActivateReport, InstallReport, WorkerState};
pub use messages::{WorkerMessage, WorkerReply};
pub use notify::{ClickOutcome, Notification};
pub use strategy::StrategyContext;
pub use sync::{SyncRegistry, SyncReport};
pub use tasks::BackgroundTasks;

/// Message returned to the page when a submission was queued offline.
pub const QUEUED_MESSAGE: &str =
    "You're offline. Your submission was saved and will be sent when you're back online.";

/// The offline worker for one deployed version.
pub struct OfflineWorker<F: Fetcher> {
    config: Arc<WorkerConfig>,
    storage: CacheStorage,
    queue: PendingQueue,
    sync_tags: SyncRegistry,
    fetcher: Arc<F>,
    tasks: BackgroundTasks,
    state: Mutex<WorkerState>,
    /// Store kept from an earlier version after this one failed to install.
    resumed_store: Mutex<Option<String>>,
    /// One sync pass at a time, so no queued entry is sent twice.
    sync_pass: AsyncMutex<()>,
}

impl<F: Fetcher> OfflineWorker<F> {
    /// Create a worker over a database and a network.
    #[must_use]
    pub fn new(config: WorkerConfig, db: WorkerDb, fetcher: F) -> Self {
        Self {
            config: Arc::new(config),
            storage: CacheStorage::new(db.clone()),
            queue: PendingQueue::new(db.clone()),
            sync_tags: SyncRegistry::new(db),
            fetcher: Arc::new(fetcher),
            tasks: BackgroundTasks::new(),
            state: Mutex::new(WorkerState::Parsed),
            resumed_store: Mutex::new(None),
            sync_pass: AsyncMutex::new(()),
        }
    }

    #[must_use]
    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    #[must_use]
    pub const fn storage(&self) -> &CacheStorage {
        &self.storage
    }

    #[must_use]
    pub const fn queue(&self) -> &PendingQueue {
        &self.queue
    }

    #[must_use]
    pub const fn sync_registry(&self) -> &SyncRegistry {
        &self.sync_tags
    }

    #[must_use]
    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    /// Detached revalidations.
    #[must_use]
    pub const fn tasks(&self) -> &BackgroundTasks {
        &self.tasks
    }

    /// Store requests are answered from: the current version's, or the one
    /// kept by [`OfflineWorker::start`] after a failed install.
    #[must_use]
    pub fn serving_store(&self) -> String {
        self.resumed_store
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .unwrap_or_else(|| self.config.store_name())
    }

    #[must_use]
    pub fn state(&self) -> WorkerState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_state(&self, next: WorkerState) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        tracing::debug!(from = %*state, to = %next, "Worker state change");
        *state = next;
    }

    /// Whether this worker answers requests (activated and clients claimed).
    #[must_use]
    pub fn is_controlling(&self) -> bool {
        self.state() == WorkerState::Activated
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Precache the manifest into the current store.
    ///
    /// On failure the worker becomes [`WorkerState::Redundant`].
    ///
    /// # Errors
    /// Returns [`ShowroomError::Lifecycle`] if an install is not allowed now,
    /// or the precache error.
    pub async fn install(&self) -> Result<InstallReport> {
        let current = self.state();
        if !current.can_install() {
            return Err(ShowroomError::Lifecycle(format!(
                "cannot install from state {current}"
            )));
        }

        self.set_state(WorkerState::Installing);
        match lifecycle::install(&self.config, &self.storage, self.fetcher.as_ref()).await {
            Ok(report) => {
                self.set_state(WorkerState::Installed);
                Ok(report)
            }
            Err(e) => {
                tracing::error!(error = %e, version = self.config.version(), "Install failed");
                self.set_state(WorkerState::Redundant);
                Err(e)
            }
        }
    }

    /// Delete stale stores and claim clients.
    ///
    /// A fresh worker may activate a store installed by an earlier process.
    ///
    /// # Errors
    /// Returns [`ShowroomError::Lifecycle`] from a redundant or busy worker,
    /// [`ShowroomError::StoreNotInstalled`] if nothing was installed.
    pub fn activate(&self) -> Result<ActivateReport> {
        let previous = self.state();
        if matches!(
            previous,
            WorkerState::Redundant | WorkerState::Installing | WorkerState::Activating
        ) {
            return Err(ShowroomError::Lifecycle(format!(
                "cannot activate from state {previous}"
            )));
        }

        self.set_state(WorkerState::Activating);
        match lifecycle::activate(&self.config, &self.storage) {
            Ok(report) => {
                *self.resumed_store.lock().unwrap_or_else(PoisonError::into_inner) = None;
                self.set_state(WorkerState::Activated);
                Ok(report)
            }
            Err(e) => {
                self.set_state(previous);
                Err(e)
            }
        }
    }

    /// Install and activate without waiting.
    ///
    /// If the install fails while a store from an earlier run is still on
    /// disk (the recorded active store, else this version's own), the worker
    /// keeps answering from that store and nothing is deleted.
    ///
    /// # Errors
    /// Returns the install error when there is nothing to fall back on, or
    /// the activation error.
    pub async fn start(&self) -> Result<ActivateReport> {
        if let Err(e) = self.install().await {
            return match self.resume_previous() {
                Ok(Some(report)) => Ok(report),
                Ok(None) => Err(e),
                Err(lookup) => {
                    tracing::warn!(error = %lookup, "Could not look up a previous store");
                    Err(e)
                }
            };
        }
        self.activate()
    }

    fn resume_previous(&self) -> Result<Option<ActivateReport>> {
        let candidates = [
            self.storage.db().get_meta(META_ACTIVE_STORE)?,
            Some(self.config.store_name()),
        ];
        for store in candidates.into_iter().flatten() {
            if self.storage.has_store(&store)? {
                tracing::warn!(store = %store, version = self.config.version(), "Install failed, serving previous store");
                *self.resumed_store.lock().unwrap_or_else(PoisonError::into_inner) = Some(store.clone());
                self.set_state(WorkerState::Activated);
                return Ok(Some(ActivateReport {
                    store,
                    deleted: Vec::new(),
                }));
            }
        }
        Ok(None)
    }

    // =========================================================================
    // Fetch handling
    // =========================================================================

    /// Answer one request.
    ///
    /// # Errors
    /// Returns the network error when neither the strategy nor the store
    /// fallback produced a response.
    pub async fn handle_fetch(&self, request: FetchRequest) -> Result<FetchResponse> {
        if !self.is_controlling() {
            return self.fetcher.fetch(&request).await;
        }

        match classify(&self.config, &request) {
            Route::Passthrough => self.fetcher.fetch(&request).await,
            Route::Submission => self.submit_or_queue(&request).await,
            Route::Cached(strategy) => {
                let store = self.serving_store();
                let ctx = StrategyContext {
                    store: &store,
                    storage: &self.storage,
                    fetcher: &self.fetcher,
                    tasks: &self.tasks,
                };
                match strategy::run(strategy, &ctx, &request).await {
                    Ok(response) => Ok(response),
                    Err(e) => self.fallback(&request, &store, e),
                }
            }
        }
    }

    /// Last resort after a strategy failed: the offline page for navigations,
    /// otherwise whatever the store holds for the request.
    fn fallback(&self, request: &FetchRequest, store: &str, error: ShowroomError) -> Result<FetchResponse> {
        let key = if request.is_navigation() {
            match self.config.resolve(self.config.offline_page()) {
                Ok(url) => CacheKey::get(&url),
                Err(_) => return Err(error),
            }
        } else {
            request.cache_key()
        };

        match self.storage.match_key(store, &key) {
            Ok(Some(response)) => {
                tracing::info!(url = %request.url, fallback = %key, error = %error, "Serving offline fallback");
                Ok(response)
            }
            Ok(None) => Err(error),
            Err(lookup) => {
                tracing::warn!(error = %lookup, "Fallback lookup failed");
                Err(error)
            }
        }
    }

    /// Forward a form post; if the network is unreachable, queue it for sync.
    async fn submit_or_queue(&self, request: &FetchRequest) -> Result<FetchResponse> {
        match self.fetcher.fetch(request).await {
            Ok(response) => Ok(response),
            Err(e) if e.is_connectivity() => {
                let id = self.queue.enqueue(request)?;
                self.sync_tags.register(self.config.sync_tag())?;
                tracing::info!(id, url = %request.url, error = %e, "Submission queued for background sync");
                FetchResponse::worker_json(
                    202,
                    &json!({
                        "success": true,
                        "queued": true,
                        "message": QUEUED_MESSAGE,
                    }),
                )
            }
            Err(e) => Err(e),
        }
    }

    // =========================================================================
    // Messages, sync and push
    // =========================================================================

    /// Entry count of the current store.
    ///
    /// # Errors
    /// Returns an error if the store cannot be read.
    pub fn cache_size(&self) -> Result<usize> {
        self.storage.entry_count(&self.serving_store())
    }

    /// Handle a page message. Returns the reply, if the message has one.
    ///
    /// # Errors
    /// Returns the activation or storage error.
    pub fn handle_message(&self, message: WorkerMessage) -> Result<Option<WorkerReply>> {
        match message {
            WorkerMessage::SkipWaiting => {
                if self.state() == WorkerState::Installed {
                    self.activate()?;
                } else {
                    tracing::debug!(state = %self.state(), "SKIP_WAITING ignored");
                }
                Ok(None)
            }
            WorkerMessage::GetCacheSize => Ok(Some(WorkerReply::CacheSize {
                size: self.cache_size()?,
            })),
        }
    }

    /// Run a sync pass for `tag`. Unknown tags are ignored (`Ok(None)`).
    ///
    /// The tag stays registered while entries remain queued. Passes never
    /// overlap: a second caller waits and then sees only what is left.
    ///
    /// # Errors
    /// Returns an error if the queue cannot be read or updated.
    pub async fn sync(&self, tag: &str) -> Result<Option<SyncReport>> {
        if tag != self.config.sync_tag() {
            tracing::debug!(tag, "Ignoring unknown sync tag");
            return Ok(None);
        }

        let _pass = self.sync_pass.lock().await;
        let report = sync::replay(&self.queue, self.fetcher.as_ref()).await?;
        if report.remaining == 0 {
            self.sync_tags.unregister(tag)?;
        }
        tracing::info!(
            tag,
            attempted = report.attempted,
            delivered = report.delivered,
            remaining = report.remaining,
            "Background sync finished"
        );
        Ok(Some(report))
    }

    /// Fire every registered tag, as a browser does when it comes online.
    ///
    /// # Errors
    /// Returns the first sync error.
    pub async fn fire_registered_syncs(&self) -> Result<Vec<SyncReport>> {
        let mut reports = Vec::new();
        for tag in self.sync_tags.tags()? {
            if let Some(report) = self.sync(&tag).await? {
                reports.push(report);
            }
        }
        Ok(reports)
    }

    /// Turn a push payload into the notification to show.
    #[must_use]
    pub fn push(&self, payload: Option<&str>) -> Notification {
        let notification = Notification::from_push(payload);
        tracing::debug!(body = %notification.body, "Push received");
        notification
    }
}
