//! Storage for configuration, the worker cache and the pending queue.

pub mod cache_store;
pub mod config;
pub mod db;
pub mod paths;
pub mod queue;
pub mod schema;

pub use cache_store::CacheStorage;
pub use config::{
    CliOverrides, Config, ConfigSource, ConfigSources, ENV_CACHE_VERSION, ENV_CONFIG,
    ENV_EMAIL_API_KEY, ENV_EMAIL_TO, ENV_ORIGIN, ENV_SHEETS_URL, ENV_TIMEOUT, ResolvedConfig,
};
pub use db::WorkerDb;
pub use paths::AppPaths;
pub use queue::{PendingQueue, PendingSubmission, PendingSummary};
pub use schema::{LATEST_SCHEMA_VERSION, run_migrations};
