//! Core infrastructure: request/response models, HTTP client and logging.

pub mod http;
pub mod logging;
pub mod models;

pub use models::{
    CacheKey, FetchRequest, FetchResponse, RequestMode, ResponseSource, StoredEntry, parse_url,
};
