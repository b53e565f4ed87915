//! Edge caching proxy.
//!
//! Sits in front of the site origin and sends every request through the
//! offline worker, the way a browser routes page fetches through a service
//! worker. A few `/__worker/*` routes stand in for the page-to-worker
//! channels (messages, sync, push).

use std::sync::Arc;

use hyper::body::Incoming;
use hyper::header::{HeaderName, HeaderValue};
use hyper::http::request::Parts;
use hyper::{Method, Request, Response};
use serde_json::json;

use super::{Body, Handler, json_response, read_body, with_status};
use crate::core::models::{FetchRequest, FetchResponse, RequestMode, ResponseSource};
use crate::error::{Result, ShowroomError};
use crate::worker::fetcher::is_hop_by_hop;
use crate::worker::{Fetcher, OfflineWorker, WorkerMessage};

pub const ROUTE_MESSAGE: &str = "/__worker/message";
pub const ROUTE_SYNC: &str = "/__worker/sync";
pub const ROUTE_PUSH: &str = "/__worker/push";

/// Response header naming where an answer came from.
pub const SOURCE_HEADER: &str = "x-showroom-source";

/// Proxy in front of the origin.
pub struct EdgeServer<F: Fetcher> {
    worker: Arc<OfflineWorker<F>>,
}

impl<F: Fetcher> EdgeServer<F> {
    #[must_use]
    pub const fn new(worker: Arc<OfflineWorker<F>>) -> Self {
        Self { worker }
    }

    #[must_use]
    pub fn worker(&self) -> &OfflineWorker<F> {
        &self.worker
    }

    async fn control(&self, path: &str, parts: &Parts, body: &[u8]) -> Response<Body> {
        if parts.method != Method::POST {
            return error_response(&ShowroomError::InvalidRequest(format!(
                "{path} only accepts POST"
            )));
        }

        match path {
            ROUTE_MESSAGE => {
                let reply = WorkerMessage::parse(body).and_then(|m| self.worker.handle_message(m));
                match reply {
                    Ok(Some(reply)) => json_response(200, &reply),
                    Ok(None) => with_status(204, "text/plain", Vec::new()),
                    Err(e) => error_response(&e),
                }
            }
            ROUTE_SYNC => {
                let tag = query_param(self.worker.config().origin(), parts.uri.query(), "tag")
                    .unwrap_or_else(|| self.worker.config().sync_tag().to_string());
                match self.worker.sync(&tag).await {
                    Ok(Some(report)) => json_response(200, &report),
                    Ok(None) => json_response(200, &json!({ "tag": tag, "ignored": true })),
                    Err(e) => error_response(&e),
                }
            }
            _ => {
                let text = String::from_utf8_lossy(body);
                let notification = self.worker.push(Some(&text));
                json_response(200, &notification)
            }
        }
    }
}

impl<F: Fetcher> Handler for EdgeServer<F> {
    async fn handle(&self, request: Request<Incoming>) -> Response<Body> {
        let (parts, body) = request.into_parts();
        let path = parts.uri.path().to_string();

        let body = match read_body(body).await {
            Ok(body) => body,
            Err(e) => return error_response(&e),
        };

        if matches!(path.as_str(), ROUTE_MESSAGE | ROUTE_SYNC | ROUTE_PUSH) {
            return self.control(&path, &parts, &body).await;
        }

        let request = match to_fetch_request(self.worker.config().origin(), &parts, body) {
            Ok(request) => request,
            Err(e) => return error_response(&e),
        };

        match self.worker.handle_fetch(request).await {
            Ok(response) => {
                tracing::debug!(%path, status = response.status, source = ?response.source, "Edge response");
                to_http_response(response)
            }
            Err(e) => {
                tracing::warn!(%path, error = %e, code = e.error_code(), "No response available");
                error_response(&e)
            }
        }
    }
}

/// Rebuild an incoming request against the origin.
///
/// Only the path and query of the request target are used, so the result
/// always points at the origin host whatever authority the client sent.
///
/// # Errors
/// Returns [`ShowroomError::InvalidRequest`] if the target is not a path.
pub fn to_fetch_request(origin: &reqwest::Url, parts: &Parts, body: Vec<u8>) -> Result<FetchRequest> {
    let path = parts.uri.path();
    if !path.starts_with('/') {
        return Err(ShowroomError::InvalidRequest(format!("bad target '{}'", parts.uri)));
    }
    let mut url = origin.clone();
    url.set_path(path);
    url.set_query(parts.uri.query());

    let headers: Vec<(String, String)> = parts
        .headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_string(), v.to_string()))
        })
        .collect();

    let mut request = FetchRequest::new(parts.method.clone(), url);
    request.headers = headers;
    request.body = body;
    request.mode = navigation_mode(&request);
    Ok(request)
}

/// Navigation when the browser says so, or when a GET prefers HTML.
fn navigation_mode(request: &FetchRequest) -> RequestMode {
    let fetch_mode = request.header("sec-fetch-mode");
    let wants_html = request.method == Method::GET
        && request
            .header("accept")
            .is_some_and(|accept| accept.contains("text/html"));

    if fetch_mode == Some("navigate") || (fetch_mode.is_none() && wants_html) {
        RequestMode::Navigate
    } else {
        RequestMode::Other
    }
}

fn to_http_response(response: FetchResponse) -> Response<Body> {
    let source = match response.source {
        ResponseSource::Network => "network",
        ResponseSource::Cache => "cache",
        ResponseSource::Worker => "worker",
    };

    let mut http = with_status(response.status, "application/octet-stream", response.body);
    let headers = http.headers_mut();
    headers.remove(hyper::header::CONTENT_TYPE);
    for (name, value) in &response.headers {
        if is_hop_by_hop(name) {
            continue;
        }
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            headers.append(name, value);
        }
    }
    headers.insert(SOURCE_HEADER, HeaderValue::from_static(source));
    http
}

fn error_response(error: &ShowroomError) -> Response<Body> {
    json_response(
        error.http_status(),
        &json!({
            "success": false,
            "message": error.to_string(),
            "code": error.error_code(),
        }),
    )
}

/// Decoded value of a query parameter; empty values count as absent.
fn query_param(base: &reqwest::Url, query: Option<&str>, name: &str) -> Option<String> {
    let mut url = base.clone();
    url.set_query(Some(query?));
    url.query_pairs()
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.into_owned())
        .filter(|value| !value.is_empty())
}
