//! HTTP client utilities.
//!
//! One configured reqwest client is shared by the worker's network fetcher,
//! the connectivity probe and the lead collaborators.

use std::time::Duration;

use reqwest::{Client, ClientBuilder, redirect};

use crate::error::{Result, ShowroomError};

/// Default timeout for HTTP requests.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Timeout for connectivity probes.
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Build a configured HTTP client.
///
/// Redirects are not followed: the worker caches exactly what the origin
/// answered for a URL, and a redirect response is not a 200.
///
/// # Errors
///
/// Returns error if client construction fails.
pub fn build_client(timeout: Duration) -> Result<Client> {
    ClientBuilder::new()
        .timeout(timeout)
        .redirect(redirect::Policy::none())
        .user_agent(format!("showroom/{}", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| ShowroomError::Config(format!("HTTP client: {e}")))
}

/// POST a JSON body and require a 2xx answer.
///
/// Returns the response body text on success so callers can log it.
///
/// # Errors
///
/// Returns [`ShowroomError::Network`]/[`ShowroomError::Timeout`] on transport
/// failure and [`ShowroomError::HttpStatus`] on a non-2xx answer.
pub async fn post_json<T: serde::Serialize + ?Sized>(
    client: &Client,
    url: &str,
    bearer: Option<&str>,
    body: &T,
) -> Result<String> {
    let mut request = client.post(url).json(body);
    if let Some(token) = bearer {
        request = request.bearer_auth(token);
    }

    let response = request
        .send()
        .await
        .map_err(|e| ShowroomError::from_reqwest(url, &e, DEFAULT_TIMEOUT.as_secs()))?;

    let status = response.status();
    if !status.is_success() {
        return Err(ShowroomError::HttpStatus {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }

    response
        .text()
        .await
        .map_err(|e| ShowroomError::from_reqwest(url, &e, DEFAULT_TIMEOUT.as_secs()))
}
