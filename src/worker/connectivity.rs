//! Connectivity monitor.
//!
//! Probes the origin on an interval and fires every registered sync tag
//! when the network comes back.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use reqwest::{Client, Url};

use super::OfflineWorker;
use super::fetcher::Fetcher;

/// Change observed by a probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    CameOnline,
    WentOffline,
    Unchanged,
}

/// Last known network state.
#[derive(Debug)]
pub struct NetworkState {
    online: AtomicBool,
}

impl NetworkState {
    /// Start in the given state.
    #[must_use]
    pub const fn new(online: bool) -> Self {
        Self {
            online: AtomicBool::new(online),
        }
    }

    #[must_use]
    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    /// Record a probe result and report the transition.
    pub fn observe(&self, online: bool) -> Transition {
        let was_online = self.online.swap(online, Ordering::SeqCst);
        match (was_online, online) {
            (false, true) => Transition::CameOnline,
            (true, false) => Transition::WentOffline,
            _ => Transition::Unchanged,
        }
    }
}

/// Whether the origin answers at all. Any HTTP status counts as online.
pub async fn probe(client: &Client, origin: &Url) -> bool {
    client.head(origin.clone()).send().await.is_ok()
}

/// Probe forever, syncing on every offline-to-online transition.
pub async fn run<F: Fetcher>(
    worker: Arc<OfflineWorker<F>>,
    client: Client,
    interval: Duration,
    state: Arc<NetworkState>,
) {
    let origin = worker.config().origin().clone();
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        let online = probe(&client, &origin).await;
        match state.observe(online) {
            Transition::CameOnline => {
                tracing::info!(%origin, "Network back online, firing sync");
                match worker.fire_registered_syncs().await {
                    Ok(reports) => {
                        for report in reports {
                            tracing::info!(
                                attempted = report.attempted,
                                delivered = report.delivered,
                                remaining = report.remaining,
                                "Sync pass finished"
                            );
                        }
                    }
                    Err(e) => tracing::warn!(error = %e, "Sync pass failed"),
                }
            }
            Transition::WentOffline => tracing::warn!(%origin, "Origin unreachable"),
            Transition::Unchanged => tracing::trace!(online, "Connectivity unchanged"),
        }
    }
}
