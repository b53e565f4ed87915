//! Immutable worker configuration.
//!
//! Built once from the resolved settings and shared behind an `Arc`; nothing
//! in the worker mutates it after construction.

use reqwest::Url;

use crate::core::models::parse_url;
use crate::error::{Result, ShowroomError};
use crate::storage::config::WorkerSettings;

/// Cache policy for one deployed version of the site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerConfig {
    origin: Url,
    cache_prefix: String,
    version: String,
    offline_page: String,
    precache: Vec<String>,
    static_extensions: Vec<String>,
    sync_tag: String,
}

impl WorkerConfig {
    /// Default policy for a site origin.
    ///
    /// # Errors
    /// Returns [`ShowroomError::InvalidRequest`] if the origin does not parse.
    pub fn new(origin: &str) -> Result<Self> {
        Self::from_settings(&WorkerSettings::default(), origin)
    }

    /// Build from the `[worker]` config section.
    ///
    /// # Errors
    /// Returns an error if the origin is not an absolute http(s) URL.
    pub fn from_settings(settings: &WorkerSettings, origin: &str) -> Result<Self> {
        let origin = parse_url(origin)?;
        if origin.cannot_be_a_base() || !matches!(origin.scheme(), "http" | "https") {
            return Err(ShowroomError::ConfigInvalid {
                key: "edge.origin".to_string(),
                message: format!("'{origin}' is not an http(s) origin"),
            });
        }

        Ok(Self {
            origin,
            cache_prefix: settings.cache_prefix.clone(),
            version: settings.version.clone(),
            offline_page: settings.offline_page.clone(),
            precache: settings.precache.clone(),
            static_extensions: settings
                .static_extensions
                .iter()
                .map(|ext| ext.to_ascii_lowercase())
                .collect(),
            sync_tag: settings.sync_tag.clone(),
        })
    }

    /// Same policy under another version tag.
    #[must_use]
    pub fn with_version(mut self, version: &str) -> Self {
        self.version = version.to_string();
        self
    }

    /// Same policy with another precache manifest.
    #[must_use]
    pub fn with_precache<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.precache = paths.into_iter().map(Into::into).collect();
        self
    }

    /// Name of the current store: `{prefix}-{version}`.
    #[must_use]
    pub fn store_name(&self) -> String {
        format!("{}-{}", self.cache_prefix, self.version)
    }

    #[must_use]
    pub const fn origin(&self) -> &Url {
        &self.origin
    }

    #[must_use]
    pub fn version(&self) -> &str {
        &self.version
    }

    #[must_use]
    pub fn cache_prefix(&self) -> &str {
        &self.cache_prefix
    }

    #[must_use]
    pub fn offline_page(&self) -> &str {
        &self.offline_page
    }

    #[must_use]
    pub fn precache(&self) -> &[String] {
        &self.precache
    }

    #[must_use]
    pub fn static_extensions(&self) -> &[String] {
        &self.static_extensions
    }

    #[must_use]
    pub fn sync_tag(&self) -> &str {
        &self.sync_tag
    }

    /// Absolute URL for a root-relative path on the origin.
    ///
    /// # Errors
    /// Returns [`ShowroomError::InvalidRequest`] if the path cannot be joined.
    pub fn resolve(&self, path: &str) -> Result<Url> {
        self.origin
            .join(path)
            .map_err(|e| ShowroomError::InvalidRequest(format!("bad path '{path}': {e}")))
    }

    /// Whether a URL belongs to the fronted origin.
    #[must_use]
    pub fn is_same_origin(&self, url: &Url) -> bool {
        url.origin() == self.origin.origin()
    }
}
