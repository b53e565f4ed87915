//! Network access for the worker.
//!
//! Strategies never talk to reqwest directly; they go through [`Fetcher`],
//! so tests can script the network (see `test_utils::ScriptedFetcher`).

use std::future::Future;
use std::time::Duration;

use reqwest::Client;

use crate::core::http::build_client;
use crate::core::models::{FetchRequest, FetchResponse, ResponseSource};
use crate::error::{Result, ShowroomError};

/// Request headers that describe the hop, not the resource.
const HOP_BY_HOP: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
    "host",
    "content-length",
    "accept-encoding",
];

/// Whether a header must not be copied across the proxy.
#[must_use]
pub fn is_hop_by_hop(name: &str) -> bool {
    HOP_BY_HOP.iter().any(|h| h.eq_ignore_ascii_case(name))
}

/// Performs a network fetch.
///
/// Resolves with any HTTP status; only transport failures are errors.
pub trait Fetcher: Send + Sync + 'static {
    fn fetch(&self, request: &FetchRequest) -> impl Future<Output = Result<FetchResponse>> + Send;
}

/// [`Fetcher`] backed by a reqwest client.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
    timeout: Duration,
}

impl HttpFetcher {
    /// Wrap an existing client. `timeout` is only used for error reporting.
    #[must_use]
    pub const fn new(client: Client, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    /// Build a client with the given timeout.
    ///
    /// # Errors
    /// Returns an error if the client cannot be constructed.
    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        Ok(Self::new(build_client(timeout)?, timeout))
    }
}

impl Fetcher for HttpFetcher {
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchResponse> {
        let url = request.url.as_str();
        let mut builder = self
            .client
            .request(request.method.clone(), request.url.clone());
        for (name, value) in &request.headers {
            if !is_hop_by_hop(name) {
                builder = builder.header(name.as_str(), value.as_str());
            }
        }
        if !request.body.is_empty() {
            builder = builder.body(request.body.clone());
        }

        let response = builder
            .send()
            .await
            .map_err(|e| ShowroomError::from_reqwest(url, &e, self.timeout.as_secs()))?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter(|(name, _)| !is_hop_by_hop(name.as_str()))
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        let body = response
            .bytes()
            .await
            .map_err(|e| ShowroomError::from_reqwest(url, &e, self.timeout.as_secs()))?
            .to_vec();

        tracing::trace!(%url, status, bytes = body.len(), "Network fetch complete");

        Ok(FetchResponse {
            status,
            headers,
            body,
            source: ResponseSource::Network,
        })
    }
}
