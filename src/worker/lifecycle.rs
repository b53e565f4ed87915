//! Install and activate.
//!
//! ```text
//! Parsed -> Installing -> Installed (waiting) -> Activating -> Activated
//!               \
//!                +-> Redundant   (any precache failure)
//! ```
//!
//! Install fetches the whole precache manifest before writing anything and
//! then commits every entry in one transaction, so a failed install leaves
//! no trace and the previous version keeps serving. Activate deletes every
//! store except the current one.

use futures::future::try_join_all;
use serde::Serialize;

use super::config::WorkerConfig;
use super::fetcher::Fetcher;
use crate::core::models::{CacheKey, FetchRequest, FetchResponse};
use crate::error::{Result, ShowroomError};
use crate::storage::CacheStorage;
use crate::storage::db::META_ACTIVE_STORE;

/// Lifecycle state of one worker version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerState {
    /// Constructed, nothing done yet.
    #[default]
    Parsed,
    Installing,
    /// Precache committed; waiting to activate.
    Installed,
    Activating,
    /// Controls clients.
    Activated,
    /// Install failed; this version will never serve.
    Redundant,
}

impl WorkerState {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Parsed => "parsed",
            Self::Installing => "installing",
            Self::Installed => "installed",
            Self::Activating => "activating",
            Self::Activated => "activated",
            Self::Redundant => "redundant",
        }
    }

    /// Whether install may start from this state.
    ///
    /// Re-installing an installed or active version is allowed and rewrites
    /// the same entries.
    #[must_use]
    pub const fn can_install(&self) -> bool {
        matches!(self, Self::Parsed | Self::Installed | Self::Activated)
    }
}

impl std::fmt::Display for WorkerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of a successful install.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InstallReport {
    pub store: String,
    pub entries: usize,
}

/// Result of an activation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivateReport {
    pub store: String,
    /// Stale stores removed.
    pub deleted: Vec<String>,
}

/// Fetch the precache manifest and commit it to the current store.
///
/// # Errors
/// Returns [`ShowroomError::PrecacheFailed`] if any entry cannot be fetched
/// or answers with a non-2xx status; nothing is written in that case.
pub async fn install<F: Fetcher>(
    config: &WorkerConfig,
    storage: &CacheStorage,
    fetcher: &F,
) -> Result<InstallReport> {
    let store = config.store_name();
    tracing::info!(
        store = %store,
        entries = config.precache().len(),
        "Installing worker"
    );

    let fetches = config
        .precache()
        .iter()
        .map(|path| precache_one(config, fetcher, path));
    let entries = try_join_all(fetches).await?;

    storage.put_all(&store, &entries)?;

    tracing::info!(store = %store, entries = entries.len(), "Precache committed");
    Ok(InstallReport {
        store,
        entries: entries.len(),
    })
}

async fn precache_one<F: Fetcher>(
    config: &WorkerConfig,
    fetcher: &F,
    path: &str,
) -> Result<(CacheKey, FetchResponse)> {
    let url = config.resolve(path)?;
    let request = FetchRequest::new(reqwest::Method::GET, url);

    let response = fetcher
        .fetch(&request)
        .await
        .map_err(|e| ShowroomError::PrecacheFailed {
            path: path.to_string(),
            reason: e.to_string(),
        })?;

    if !response.is_success() {
        return Err(ShowroomError::PrecacheFailed {
            path: path.to_string(),
            reason: format!("HTTP {}", response.status),
        });
    }

    tracing::debug!(path, status = response.status, "Precached");
    Ok((request.cache_key(), response))
}

/// Delete every store but the current one and record it as active.
///
/// # Errors
/// Returns [`ShowroomError::StoreNotInstalled`] if the current store does
/// not exist, or a storage error if a delete fails.
pub fn activate(config: &WorkerConfig, storage: &CacheStorage) -> Result<ActivateReport> {
    let store = config.store_name();
    if !storage.has_store(&store)? {
        return Err(ShowroomError::StoreNotInstalled(config.version().to_string()));
    }

    let mut deleted = Vec::new();
    for name in storage.store_names()? {
        if name != store {
            storage.delete_store(&name)?;
            tracing::info!(store = %name, "Deleted stale cache store");
            deleted.push(name);
        }
    }

    storage.db().set_meta(META_ACTIVE_STORE, &store)?;
    tracing::info!(store = %store, deleted = deleted.len(), "Worker activated");

    Ok(ActivateReport { store, deleted })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::WorkerDb;
    use crate::test_utils::ScriptedFetcher;

    fn setup() -> (WorkerConfig, CacheStorage, ScriptedFetcher) {
        let config = WorkerConfig::new("https://cars.example")
            .unwrap()
            .with_precache(["/", "/offline"]);
        let storage = CacheStorage::new(WorkerDb::open_in_memory().unwrap());
        let fetcher = ScriptedFetcher::new();
        fetcher.respond("https://cars.example/", 200, "home");
        fetcher.respond("https://cars.example/offline", 200, "offline");
        (config, storage, fetcher)
    }

    #[tokio::test]
    async fn install_commits_whole_manifest() {
        let (config, storage, fetcher) = setup();
        let report = install(&config, &storage, &fetcher).await.unwrap();
        assert_eq!(report.store, "showroom-v1");
        assert_eq!(report.entries, 2);
        assert_eq!(storage.entry_count("showroom-v1").unwrap(), 2);
    }

    #[tokio::test]
    async fn failed_entry_commits_nothing() {
        let (config, storage, fetcher) = setup();
        fetcher.respond("https://cars.example/offline", 500, "boom");

        let err = install(&config, &storage, &fetcher).await.unwrap_err();
        assert_eq!(err.error_code(), "SHOW-S001");
        assert!(!storage.has_store("showroom-v1").unwrap());
    }

    #[tokio::test]
    async fn activate_requires_installed_store() {
        let (config, storage, _) = setup();
        let err = activate(&config, &storage).unwrap_err();
        assert_eq!(err.error_code(), "SHOW-S002");
    }

    #[tokio::test]
    async fn activate_keeps_only_current_store() {
        let (config, storage, fetcher) = setup();
        install(&config, &storage, &fetcher).await.unwrap();
        let next = config.clone().with_version("v2");
        install(&next, &storage, &fetcher).await.unwrap();

        let report = activate(&next, &storage).unwrap();
        assert_eq!(report.deleted, vec!["showroom-v1".to_string()]);
        assert_eq!(storage.store_names().unwrap(), vec!["showroom-v2".to_string()]);
        assert_eq!(
            storage.db().get_meta(META_ACTIVE_STORE).unwrap().as_deref(),
            Some("showroom-v2")
        );
    }

    #[test]
    fn install_allowed_states() {
        assert!(WorkerState::Parsed.can_install());
        assert!(WorkerState::Activated.can_install());
        assert!(!WorkerState::Installing.can_install());
        assert!(!WorkerState::Redundant.can_install());
    }
}
