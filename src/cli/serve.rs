//! `serve` and `edge` commands.

use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;

use crate::core::http::{PROBE_TIMEOUT, build_client};
use crate::error::Result;
use crate::leads::LeadService;
use crate::server::{self, ApiServer, EdgeServer};
use crate::storage::config::ResolvedConfig;
use crate::worker::connectivity::{self, NetworkState};

use super::worker::open_worker;

/// Run the lead API until Ctrl-C.
///
/// # Errors
/// Returns an error if the address is invalid or cannot be bound.
pub async fn execute_serve(config: &ResolvedConfig) -> Result<()> {
    let addr = config.api_listen()?;
    let client = build_client(config.timeout())?;
    let service = LeadService::from_config(&config.config, &client);

    if config.config.sheets.webhook_url.is_none() {
        tracing::warn!("No spreadsheet webhook configured; submissions will fail");
    }

    let listener = TcpListener::bind(addr).await?;
    server::serve(listener, Arc::new(ApiServer::new(service)), server::ctrl_c()).await
}

/// Run the edge proxy until Ctrl-C.
///
/// Installs and activates the current version first. If the origin cannot
/// be precached the proxy still starts and forwards every request.
///
/// # Errors
/// Returns an error if the database cannot be opened or the address bound.
pub async fn execute_edge(config: &ResolvedConfig) -> Result<()> {
    let addr = config.edge_listen()?;
    let worker = Arc::new(open_worker(config)?);

    match worker.start().await {
        Ok(report) => tracing::info!(
            store = %report.store,
            deleted = report.deleted.len(),
            "Worker active"
        ),
        Err(e) => tracing::error!(
            error = %e,
            "Worker failed to start; forwarding requests without caching"
        ),
    }

    let probe_client = build_client(PROBE_TIMEOUT)?;
    let interval = Duration::from_secs(config.config.edge.probe_interval_seconds);
    tokio::spawn(connectivity::run(
        Arc::clone(&worker),
        probe_client,
        interval,
        Arc::new(NetworkState::new(true)),
    ));

    let listener = TcpListener::bind(addr).await?;
    server::serve(listener, Arc::new(EdgeServer::new(worker)), server::ctrl_c()).await
}
