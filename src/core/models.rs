//! Request and response models shared by the worker, the store and the
//! edge proxy.
//!
//! These are plain owned values: a cached response is a full snapshot
//! (status, headers, body), so handing one out is always a clone and never a
//! view into the store.

use chrono::{DateTime, Utc};
use reqwest::{Method, Url};
use serde::{Deserialize, Serialize};

use crate::error::{Result, ShowroomError};

// =============================================================================
// Request
// =============================================================================

/// How the page issued a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestMode {
    /// Top-level document load.
    Navigate,
    /// Anything else (subresources, XHR, form posts).
    #[default]
    Other,
}

/// A request intercepted by the worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub method: Method,
    pub url: Url,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
    pub mode: RequestMode,
}

impl FetchRequest {
    /// Build a request from parts.
    #[must_use]
    pub const fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            headers: Vec::new(),
            body: Vec::new(),
            mode: RequestMode::Other,
        }
    }

    /// Plain GET for a URL string.
    ///
    /// # Errors
    ///
    /// Returns [`ShowroomError::InvalidRequest`] if the URL does not parse.
    pub fn get(url: &str) -> Result<Self> {
        Ok(Self::new(Method::GET, parse_url(url)?))
    }

    /// GET issued as a top-level navigation.
    ///
    /// # Errors
    ///
    /// Returns [`ShowroomError::InvalidRequest`] if the URL does not parse.
    pub fn navigate(url: &str) -> Result<Self> {
        let mut request = Self::get(url)?;
        request.mode = RequestMode::Navigate;
        request
            .headers
            .push(("accept".to_string(), "text/html".to_string()));
        Ok(request)
    }

    /// POST with a JSON body.
    ///
    /// # Errors
    ///
    /// Returns [`ShowroomError::InvalidRequest`] if the URL does not parse.
    pub fn post_json(url: &str, body: &serde_json::Value) -> Result<Self> {
        let mut request = Self::new(Method::POST, parse_url(url)?);
        request.body = serde_json::to_vec(body)?;
        request
            .headers
            .push(("content-type".to_string(), "application/json".to_string()));
        Ok(request)
    }

    /// Add a header.
    #[must_use]
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers
            .push((name.to_ascii_lowercase(), value.to_string()));
        self
    }

    /// First value of a header (case-insensitive).
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Whether this is a top-level navigation.
    #[must_use]
    pub fn is_navigation(&self) -> bool {
        self.mode == RequestMode::Navigate
    }

    /// Normalized store key: upper-case method plus URL without fragment.
    #[must_use]
    pub fn cache_key(&self) -> CacheKey {
        let mut url = self.url.clone();
        url.set_fragment(None);
        CacheKey {
            method: self.method.as_str().to_ascii_uppercase(),
            url: url.to_string(),
        }
    }

    /// ASCII origin of the request URL (`scheme://host:port`).
    #[must_use]
    pub fn origin(&self) -> String {
        self.url.origin().ascii_serialization()
    }
}

/// Parse an absolute URL.
///
/// # Errors
///
/// Returns [`ShowroomError::InvalidRequest`] if the URL does not parse.
pub fn parse_url(url: &str) -> Result<Url> {
    Url::parse(url).map_err(|e| ShowroomError::InvalidRequest(format!("bad URL '{url}': {e}")))
}

/// Store key for a request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CacheKey {
    pub method: String,
    pub url: String,
}

impl CacheKey {
    /// GET key for an absolute URL.
    #[must_use]
    pub fn get(url: &Url) -> Self {
        let mut url = url.clone();
        url.set_fragment(None);
        Self {
            method: "GET".to_string(),
            url: url.to_string(),
        }
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.method, self.url)
    }
}

// =============================================================================
// Response
// =============================================================================

/// Where a response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ResponseSource {
    /// Fresh from the network.
    Network,
    /// Served from the cache store.
    Cache,
    /// Synthesized by the worker itself.
    Worker,
}

/// A full response snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
    pub source: ResponseSource,
}

impl FetchResponse {
    /// Network response with a body.
    #[must_use]
    pub fn network(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: body.into(),
            source: ResponseSource::Network,
        }
    }

    /// Response synthesized by the worker with a JSON body.
    ///
    /// # Errors
    ///
    /// Returns an error if the value cannot be serialized.
    pub fn worker_json(status: u16, value: &serde_json::Value) -> Result<Self> {
        Ok(Self {
            status,
            headers: vec![(
                "content-type".to_string(),
                "application/json".to_string(),
            )],
            body: serde_json::to_vec(value)?,
            source: ResponseSource::Worker,
        })
    }

    /// Add a header.
    #[must_use]
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers
            .push((name.to_ascii_lowercase(), value.to_string()));
        self
    }

    /// Only an exact 200 is eligible for caching.
    #[must_use]
    pub const fn is_cacheable(&self) -> bool {
        self.status == 200
    }

    /// First value of a header (case-insensitive).
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Whether the origin marked this response as per-user or unstorable.
    #[must_use]
    pub fn is_private(&self) -> bool {
        self.header("cache-control").is_some_and(|value| {
            value.split(',').any(|directive| {
                let directive = directive.trim();
                directive.eq_ignore_ascii_case("private")
                    || directive.eq_ignore_ascii_case("no-store")
            })
        })
    }

    /// Whether the status is 2xx.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }

    /// Copy of this response marked as served from cache.
    #[must_use]
    pub fn from_cache(mut self) -> Self {
        self.source = ResponseSource::Cache;
        self
    }

    /// Body as UTF-8 text (lossy).
    #[must_use]
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// A response as persisted in the store, with its write time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredEntry {
    pub key: CacheKey,
    pub response: FetchResponse,
    pub stored_at: DateTime<Utc>,
}
