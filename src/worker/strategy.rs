//! The three caching strategies.
//!
//! Only a response with status exactly 200 is ever written to the store.
//! The store is shared by every client of the edge, so requests carrying
//! credentials and responses marked `private` or `no-store` are never
//! written either. Store read or write failures never fail a request: a
//! failed lookup is a miss and a failed write is logged.

use std::sync::Arc;

use tokio::sync::oneshot;

use super::classify::Strategy;
use super::fetcher::Fetcher;
use super::tasks::BackgroundTasks;
use crate::core::models::{CacheKey, FetchRequest, FetchResponse};
use crate::error::{Result, ShowroomError};
use crate::storage::CacheStorage;

/// Everything a strategy needs from the worker.
pub struct StrategyContext<'a, F: Fetcher> {
    /// Current store name.
    pub store: &'a str,
    pub storage: &'a CacheStorage,
    pub fetcher: &'a Arc<F>,
    pub tasks: &'a BackgroundTasks,
}

/// Run one strategy for a request.
///
/// # Errors
/// Returns the network error when the strategy has no cached answer.
pub async fn run<F: Fetcher>(
    strategy: Strategy,
    ctx: &StrategyContext<'_, F>,
    request: &FetchRequest,
) -> Result<FetchResponse> {
    tracing::debug!(%strategy, url = %request.url, "Handling request");
    match strategy {
        Strategy::CacheFirst => cache_first(ctx, request).await,
        Strategy::NetworkFirst => network_first(ctx, request).await,
        Strategy::StaleWhileRevalidate => stale_while_revalidate(ctx, request).await,
    }
}

/// Serve a stored response without touching the network; fetch on a miss.
///
/// # Errors
/// Propagates the fetch error on a miss.
pub async fn cache_first<F: Fetcher>(
    ctx: &StrategyContext<'_, F>,
    request: &FetchRequest,
) -> Result<FetchResponse> {
    let key = request.cache_key();
    if let Some(hit) = lookup(ctx.storage, ctx.store, &key) {
        tracing::debug!(%key, "Cache hit");
        return Ok(hit);
    }

    let response = ctx.fetcher.fetch(request).await?;
    store_if_cacheable(ctx.storage, ctx.store, request, &response);
    Ok(response)
}

/// Prefer the network; use the store only when the fetch itself fails.
///
/// Non-200 answers are returned as-is and never cached.
///
/// # Errors
/// Returns the original fetch error when nothing is stored.
pub async fn network_first<F: Fetcher>(
    ctx: &StrategyContext<'_, F>,
    request: &FetchRequest,
) -> Result<FetchResponse> {
    let key = request.cache_key();
    match ctx.fetcher.fetch(request).await {
        Ok(response) => {
            store_if_cacheable(ctx.storage, ctx.store, request, &response);
            Ok(response)
        }
        Err(e) => {
            if let Some(hit) = lookup(ctx.storage, ctx.store, &key) {
                tracing::info!(%key, error = %e, "Network failed, serving cached response");
                Ok(hit)
            } else {
                Err(e)
            }
        }
    }
}

/// Answer from the store when possible and refresh it in the background.
///
/// The fetch starts before the store lookup. On a hit the caller gets the
/// stored response at once and the fetch continues as a tracked task; on a
/// miss the caller waits for the fetch.
///
/// # Errors
/// Returns the fetch error on a miss.
pub async fn stale_while_revalidate<F: Fetcher>(
    ctx: &StrategyContext<'_, F>,
    request: &FetchRequest,
) -> Result<FetchResponse> {
    let key = request.cache_key();
    let (tx, rx) = oneshot::channel();

    let fetcher = Arc::clone(ctx.fetcher);
    let storage = ctx.storage.clone();
    let store = ctx.store.to_string();
    let owned_request = request.clone();
    let owned_key = key.clone();
    ctx.tasks.spawn("revalidate", async move {
        let result = fetcher.fetch(&owned_request).await;
        let outcome = match &result {
            Ok(response) if may_store(&owned_request, response) => {
                storage.put(&store, &owned_key, response).map(|_| ())
            }
            Ok(response) => {
                tracing::debug!(key = %owned_key, status = response.status, "Not caching response");
                Ok(())
            }
            Err(e) => Err(ShowroomError::Other(anyhow::anyhow!(
                "revalidate {owned_key}: {e}"
            ))),
        };
        if tx.send(result).is_err() {
            tracing::trace!(key = %owned_key, "Revalidated after stale response was served");
        }
        outcome
    });

    if let Some(hit) = lookup(ctx.storage, ctx.store, &key) {
        tracing::debug!(%key, "Serving stale response, revalidating");
        return Ok(hit);
    }

    rx.await.unwrap_or_else(|_| {
        Err(ShowroomError::Other(anyhow::anyhow!(
            "revalidation task for {key} ended without a result"
        )))
    })
}

fn lookup(storage: &CacheStorage, store: &str, key: &CacheKey) -> Option<FetchResponse> {
    match storage.match_key(store, key) {
        Ok(hit) => hit,
        Err(e) => {
            tracing::warn!(%key, error = %e, "Cache lookup failed, treating as miss");
            None
        }
    }
}

/// Whether a network answer may go into the shared store.
#[must_use]
pub fn may_store(request: &FetchRequest, response: &FetchResponse) -> bool {
    let credentialed = request.header("authorization").is_some() || request.header("cookie").is_some();
    response.is_cacheable() && !credentialed && !response.is_private()
}

fn store_if_cacheable(storage: &CacheStorage, store: &str, request: &FetchRequest, response: &FetchResponse) {
    let key = request.cache_key();
    if !may_store(request, response) {
        tracing::debug!(%key, status = response.status, "Not caching response");
        return;
    }
    if let Err(e) = storage.put(store, &key, response) {
        tracing::warn!(%key, error = %e, "Failed to store response");
    }
}
