//! Request classification.
//!
//! Every request the worker sees is routed exactly once: same-origin GETs
//! get one of the three caching strategies, same-origin API posts go through
//! the offline queue, and everything else goes straight to the network.

use reqwest::Method;

use super::config::WorkerConfig;
use crate::core::models::FetchRequest;

/// Caching strategy for a same-origin GET.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Strategy {
    /// Serve from the store; fetch only on a miss.
    CacheFirst,
    /// Fetch first; fall back to the store when the network fails.
    NetworkFirst,
    /// Serve the store immediately and refresh it in the background.
    StaleWhileRevalidate,
}

impl Strategy {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::CacheFirst => "cache-first",
            Self::NetworkFirst => "network-first",
            Self::StaleWhileRevalidate => "stale-while-revalidate",
        }
    }
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the worker does with a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Cross-origin or non-GET: forward untouched.
    Passthrough,
    /// Same-origin `POST /api/*`: forward, queue if the network is down.
    Submission,
    /// Same-origin GET handled by a caching strategy.
    Cached(Strategy),
}

/// Route a request.
#[must_use]
pub fn classify(config: &WorkerConfig, request: &FetchRequest) -> Route {
    if !config.is_same_origin(&request.url) {
        return Route::Passthrough;
    }

    let path = request.url.path();
    if request.method == Method::GET {
        Route::Cached(strategy_for_path(path, config.static_extensions()))
    } else if request.method == Method::POST && path.starts_with("/api/") {
        Route::Submission
    } else {
        Route::Passthrough
    }
}

/// Pick the strategy for a same-origin GET path. First match wins.
#[must_use]
pub fn strategy_for_path(path: &str, static_extensions: &[String]) -> Strategy {
    let lower = path.to_ascii_lowercase();

    if static_extensions.iter().any(|ext| lower.contains(ext.as_str())) {
        return Strategy::CacheFirst;
    }
    if path.starts_with("/api/") {
        return Strategy::NetworkFirst;
    }
    if path.ends_with('/') || lower.contains(".html") || !path.contains('.') {
        return Strategy::StaleWhileRevalidate;
    }
    Strategy::NetworkFirst
}
