//! Configuration file loading and management.
//!
//! Loads configuration from:
//! - Linux/macOS: `~/.config/showroom/config.toml`
//! - Windows: `%APPDATA%/showroom/config.toml`
//!
//! ## Precedence
//!
//! Settings are resolved with the following precedence (highest first):
//! 1. CLI flags
//! 2. Environment variables
//! 3. Config file
//! 4. Built-in defaults
//!
//! ## Environment Variables
//!
//! - `SHOWROOM_CONFIG`: Override config file path
//! - `SHOWROOM_ORIGIN`: Site origin the edge worker fronts
//! - `SHOWROOM_CACHE_VERSION`: Cache version tag
//! - `SHOWROOM_TIMEOUT`: Network timeout in seconds
//! - `SHOWROOM_SHEETS_URL`: Spreadsheet webhook URL
//! - `SHOWROOM_EMAIL_API_KEY`: Email API key
//! - `SHOWROOM_EMAIL_TO`: Recipient for credit-application notifications

use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::AppPaths;
use crate::error::{Result, ShowroomError};

// =============================================================================
// Environment Variable Names
// =============================================================================

/// Environment variable to override config file path.
pub const ENV_CONFIG: &str = "SHOWROOM_CONFIG";
/// Environment variable for the site origin.
pub const ENV_ORIGIN: &str = "SHOWROOM_ORIGIN";
/// Environment variable for the cache version tag.
pub const ENV_CACHE_VERSION: &str = "SHOWROOM_CACHE_VERSION";
/// Environment variable for timeout in seconds.
pub const ENV_TIMEOUT: &str = "SHOWROOM_TIMEOUT";
/// Environment variable for the spreadsheet webhook.
pub const ENV_SHEETS_URL: &str = "SHOWROOM_SHEETS_URL";
/// Environment variable for the email API key.
pub const ENV_EMAIL_API_KEY: &str = "SHOWROOM_EMAIL_API_KEY";
/// Environment variable for the notification recipient.
pub const ENV_EMAIL_TO: &str = "SHOWROOM_EMAIL_TO";

/// Default precache manifest: home, offline fallback, web manifest and the
/// four primary page routes.
pub const DEFAULT_PRECACHE: &[&str] = &[
    "/",
    "/offline",
    "/manifest.json",
    "/inventory",
    "/calculator",
    "/booking",
    "/credit-application",
];

/// Extensions served cache-first.
pub const DEFAULT_STATIC_EXTENSIONS: &[&str] = &[
    ".js", ".css", ".png", ".jpg", ".jpeg", ".gif", ".webp", ".svg", ".ico", ".woff", ".woff2",
    ".ttf", ".otf", ".eot",
];

/// Tag under which queued form submissions are synced.
pub const DEFAULT_SYNC_TAG: &str = "background-sync-form";

// =============================================================================
// Resolved Configuration
// =============================================================================

/// Values supplied on the command line, if any.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    /// Explicit config file path.
    pub config_path: Option<PathBuf>,
    /// Listen address for whichever server is being started.
    pub listen: Option<String>,
    /// Site origin for the edge worker.
    pub origin: Option<String>,
    /// Worker database path.
    pub database: Option<PathBuf>,
}

/// Where a configuration value came from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConfigSource {
    /// Value from CLI flag.
    Cli,
    /// Value from environment variable.
    Env,
    /// Value from config file.
    ConfigFile,
    /// Built-in default.
    #[default]
    Default,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cli => write!(f, "CLI flag"),
            Self::Env => write!(f, "environment variable"),
            Self::ConfigFile => write!(f, "config file"),
            Self::Default => write!(f, "default"),
        }
    }
}

/// Tracks the source of the settings most often overridden.
#[derive(Debug, Clone, Default)]
pub struct ConfigSources {
    pub origin: ConfigSource,
    pub version: ConfigSource,
    pub timeout: ConfigSource,
    pub sheets: ConfigSource,
    pub email_key: ConfigSource,
}

/// Fully resolved configuration after merging CLI, env vars, and config file.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// Effective settings, with overrides applied.
    pub config: Config,
    /// Listen address chosen by the CLI, if any.
    pub listen_override: Option<SocketAddr>,
    /// Worker database path.
    pub database: PathBuf,
    /// Source of each overridable setting.
    pub sources: ConfigSources,
}

impl ResolvedConfig {
    /// Resolve final configuration from CLI overrides, environment variables
    /// and the config file.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The config file exists but is invalid
    /// - Any resolved value is invalid
    pub fn resolve(overrides: &CliOverrides) -> Result<Self> {
        let mut config = Self::load_config(overrides.config_path.as_deref())?;
        let mut sources = ConfigSources::default();

        Self::apply_origin(&mut config, overrides, &mut sources.origin);
        Self::apply_env_string(
            ENV_CACHE_VERSION,
            &mut config.worker.version,
            &mut sources.version,
        );
        Self::apply_timeout(&mut config, &mut sources.timeout);
        Self::apply_env_option(ENV_SHEETS_URL, &mut config.sheets.webhook_url, &mut sources.sheets);
        Self::apply_env_option(
            ENV_EMAIL_API_KEY,
            &mut config.email.api_key,
            &mut sources.email_key,
        );
        let mut to_source = ConfigSource::Default;
        Self::apply_env_option(ENV_EMAIL_TO, &mut config.email.to, &mut to_source);

        config.validate()?;

        let listen_override = overrides
            .listen
            .as_deref()
            .map(|raw| parse_listen("--listen", raw))
            .transpose()?;

        let database = overrides
            .database
            .clone()
            .or_else(|| config.edge.database.clone())
            .unwrap_or_else(|| AppPaths::new().worker_db_file());

        Ok(Self {
            config,
            listen_override,
            database,
            sources,
        })
    }

    /// Network timeout as a duration.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.config.general.timeout_seconds)
    }

    /// Listen address for the API server.
    ///
    /// # Errors
    /// Returns an error if the configured address does not parse.
    pub fn api_listen(&self) -> Result<SocketAddr> {
        match self.listen_override {
            Some(addr) => Ok(addr),
            None => parse_listen("server.listen", &self.config.server.listen),
        }
    }

    /// Listen address for the edge proxy.
    ///
    /// # Errors
    /// Returns an error if the configured address does not parse.
    pub fn edge_listen(&self) -> Result<SocketAddr> {
        match self.listen_override {
            Some(addr) => Ok(addr),
            None => parse_listen("edge.listen", &self.config.edge.listen),
        }
    }

    /// Load config file, respecting the CLI path and `SHOWROOM_CONFIG`.
    fn load_config(explicit: Option<&Path>) -> Result<Config> {
        if let Some(path) = explicit {
            return Config::load_from(path);
        }
        if let Ok(path) = std::env::var(ENV_CONFIG) {
            Config::load_from(Path::new(&path))
        } else {
            Config::load()
        }
    }

    fn apply_origin(config: &mut Config, overrides: &CliOverrides, source: &mut ConfigSource) {
        // 1. CLI flag
        if let Some(origin) = &overrides.origin {
            *source = ConfigSource::Cli;
            config.edge.origin.clone_from(origin);
            return;
        }

        // 2. Environment variable
        if let Some(origin) = env_non_empty(ENV_ORIGIN) {
            *source = ConfigSource::Env;
            config.edge.origin = origin;
            return;
        }

        // 3. Config file (or default, indistinguishable once loaded)
        *source = if config.edge.origin == EdgeConfig::default().origin {
            ConfigSource::Default
        } else {
            ConfigSource::ConfigFile
        };
    }

    fn apply_timeout(config: &mut Config, source: &mut ConfigSource) {
        if let Some(timeout) = env_non_empty(ENV_TIMEOUT).and_then(|v| v.parse::<u64>().ok()) {
            *source = ConfigSource::Env;
            config.general.timeout_seconds = timeout;
        } else {
            *source = ConfigSource::ConfigFile;
        }
    }

    fn apply_env_string(var: &str, target: &mut String, source: &mut ConfigSource) {
        if let Some(value) = env_non_empty(var) {
            *source = ConfigSource::Env;
            *target = value;
        } else {
            *source = ConfigSource::ConfigFile;
        }
    }

    fn apply_env_option(var: &str, target: &mut Option<String>, source: &mut ConfigSource) {
        if let Some(value) = env_non_empty(var) {
            *source = ConfigSource::Env;
            *target = Some(value);
        } else if target.is_some() {
            *source = ConfigSource::ConfigFile;
        } else {
            *source = ConfigSource::Default;
        }
    }
}

fn env_non_empty(var: &str) -> Option<String> {
    std::env::var(var)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_listen(key: &str, raw: &str) -> Result<SocketAddr> {
    raw.parse().map_err(|e| ShowroomError::ConfigInvalid {
        key: key.to_string(),
        message: format!("'{raw}' is not a socket address: {e}"),
    })
}

fn check_url(key: &str, raw: &str) -> Result<()> {
    let url = reqwest::Url::parse(raw).map_err(|e| ShowroomError::ConfigInvalid {
        key: key.to_string(),
        message: format!("'{raw}' is not a URL: {e}"),
    })?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ShowroomError::ConfigInvalid {
            key: key.to_string(),
            message: format!("'{raw}' must be http or https"),
        });
    }
    Ok(())
}

// =============================================================================
// Config file
// =============================================================================

/// Application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings.
    pub general: GeneralConfig,
    /// Lead API server.
    pub server: ServerConfig,
    /// Edge caching proxy.
    pub edge: EdgeConfig,
    /// Offline worker cache policy.
    pub worker: WorkerSettings,
    /// Spreadsheet collaborator.
    pub sheets: SheetsConfig,
    /// Email collaborator.
    pub email: EmailConfig,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Timeout for outbound network requests in seconds.
    pub timeout_seconds: u64,
    /// Default log level (error, warn, info, debug, trace).
    pub log_level: Option<String>,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: 30,
            log_level: None,
        }
    }
}

/// Lead API server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Listen address.
    pub listen: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: "127.0.0.1:3000".to_string(),
        }
    }
}

/// Edge proxy settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EdgeConfig {
    /// Listen address.
    pub listen: String,
    /// Site origin the worker fronts.
    pub origin: String,
    /// Seconds between connectivity probes.
    pub probe_interval_seconds: u64,
    /// Worker database path (defaults to the data directory).
    pub database: Option<PathBuf>,
}

impl Default for EdgeConfig {
    fn default() -> Self {
        Self {
            listen: "127.0.0.1:8080".to_string(),
            origin: "http://127.0.0.1:3000".to_string(),
            probe_interval_seconds: 15,
            database: None,
        }
    }
}

/// Offline worker cache policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerSettings {
    /// Store name prefix; the store is `{cache_prefix}-{version}`.
    pub cache_prefix: String,
    /// Deployed version tag.
    pub version: String,
    /// Path of the offline fallback page (must be precached).
    pub offline_page: String,
    /// Precache manifest.
    pub precache: Vec<String>,
    /// Extensions served cache-first.
    pub static_extensions: Vec<String>,
    /// Background sync tag for queued submissions.
    pub sync_tag: String,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            cache_prefix: "showroom".to_string(),
            version: "v1".to_string(),
            offline_page: "/offline".to_string(),
            precache: DEFAULT_PRECACHE.iter().map(ToString::to_string).collect(),
            static_extensions: DEFAULT_STATIC_EXTENSIONS
                .iter()
                .map(ToString::to_string)
                .collect(),
            sync_tag: DEFAULT_SYNC_TAG.to_string(),
        }
    }
}

/// Spreadsheet collaborator settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SheetsConfig {
    /// Webhook that appends rows to the lead spreadsheet.
    pub webhook_url: Option<String>,
}

/// Email collaborator settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmailConfig {
    /// Send endpoint of the email API.
    pub api_url: String,
    /// API key (bearer token).
    pub api_key: Option<String>,
    /// Sender address.
    pub from: String,
    /// Recipient of credit-application notifications.
    pub to: Option<String>,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.resend.com/emails".to_string(),
            api_key: None,
            from: "Showroom Leads <leads@showroom.local>".to_string(),
            to: None,
        }
    }
}

impl EmailConfig {
    /// Whether enough is set to send mail.
    #[must_use]
    pub fn is_configured(&self) -> bool {
        self.api_key.as_deref().is_some_and(|k| !k.is_empty())
            && self.to.as_deref().is_some_and(|t| !t.is_empty())
    }
}

impl Config {
    /// Load configuration from the default config file path.
    ///
    /// Returns default config if the file doesn't exist.
    ///
    /// # Errors
    /// Returns error only if the file exists but is invalid.
    pub fn load() -> Result<Self> {
        Self::load_from(&AppPaths::new().config_file())
    }

    /// Load configuration from a specific path.
    ///
    /// Returns default config if the file doesn't exist.
    ///
    /// # Errors
    /// Returns error only if the file exists but is invalid.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!(?path, "Config file not found, using defaults");
            return Ok(Self::default());
        }

        tracing::debug!(?path, "Loading config file");
        let content = fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| ShowroomError::ConfigParse {
            path: path.display().to_string(),
            message: e.to_string(),
        })
    }

    /// Save configuration to a specific path.
    ///
    /// # Errors
    /// Returns an error if serialization or the write fails.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| ShowroomError::Config(format!("Failed to serialize config: {e}")))?;

        fs::write(path, content)?;
        tracing::debug!(?path, "Config file saved");
        Ok(())
    }

    /// Validate configuration values.
    ///
    /// Checks that:
    /// - Timeout is within reasonable bounds (1-300 seconds)
    /// - URLs are absolute http(s) URLs
    /// - The version tag and prefix are non-empty and name-safe
    /// - Every precache path is root-relative and the offline page is precached
    ///
    /// # Errors
    /// Returns the first invalid value found.
    pub fn validate(&self) -> Result<()> {
        if self.general.timeout_seconds == 0 || self.general.timeout_seconds > 300 {
            return Err(ShowroomError::ConfigInvalid {
                key: "general.timeout_seconds".to_string(),
                message: "Timeout must be between 1 and 300 seconds".to_string(),
            });
        }

        check_url("edge.origin", &self.edge.origin)?;
        if let Some(url) = &self.sheets.webhook_url {
            check_url("sheets.webhook_url", url)?;
        }
        check_url("email.api_url", &self.email.api_url)?;

        if self.edge.probe_interval_seconds == 0 {
            return Err(ShowroomError::ConfigInvalid {
                key: "edge.probe_interval_seconds".to_string(),
                message: "Probe interval must be greater than 0".to_string(),
            });
        }

        for (key, value) in [
            ("worker.cache_prefix", &self.worker.cache_prefix),
            ("worker.version", &self.worker.version),
        ] {
            let name_safe = value
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'));
            if value.is_empty() || !name_safe {
                return Err(ShowroomError::ConfigInvalid {
                    key: key.to_string(),
                    message: format!("'{value}' must be non-empty and use [A-Za-z0-9._-]"),
                });
            }
        }

        if let Some(bad) = self.worker.precache.iter().find(|p| !p.starts_with('/')) {
            return Err(ShowroomError::ConfigInvalid {
                key: "worker.precache".to_string(),
                message: format!("'{bad}' must start with '/'"),
            });
        }

        if !self.worker.precache.contains(&self.worker.offline_page) {
            return Err(ShowroomError::ConfigInvalid {
                key: "worker.offline_page".to_string(),
                message: format!(
                    "'{}' must be listed in worker.precache",
                    self.worker.offline_page
                ),
            });
        }

        if self.worker.sync_tag.is_empty() {
            return Err(ShowroomError::ConfigInvalid {
                key: "worker.sync_tag".to_string(),
                message: "Sync tag must not be empty".to_string(),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{TestDir, make_test_config_toml};
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.general.timeout_seconds, 30);
        assert_eq!(config.worker.precache.len(), 7);
        assert_eq!(config.worker.sync_tag, "background-sync-form");
    }

    #[test]
    fn load_missing_file_returns_default() {
        let config = Config::load_from(Path::new("/nonexistent/path/config.toml")).unwrap();
        assert_eq!(config.worker.version, "v1");
    }

    #[test]
    fn load_valid_toml() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[general]
timeout_seconds = 10

[edge]
origin = "https://cars.example"

[worker]
version = "v7"
offline_page = "/offline"
precache = ["/", "/offline"]

[sheets]
webhook_url = "https://sheets.example/append"
"#
        )
        .unwrap();

        let config = Config::load_from(file.path()).unwrap();
        assert_eq!(config.general.timeout_seconds, 10);
        assert_eq!(config.edge.origin, "https://cars.example");
        assert_eq!(config.worker.version, "v7");
        assert_eq!(config.worker.precache, vec!["/", "/offline"]);
        assert_eq!(
            config.sheets.webhook_url.as_deref(),
            Some("https://sheets.example/append")
        );
        // Untouched sections keep defaults.
        assert_eq!(config.server.listen, "127.0.0.1:3000");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn load_invalid_toml_returns_parse_error() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "this is not valid toml {{{{").unwrap();

        let err = Config::load_from(file.path()).unwrap_err();
        assert_eq!(err.error_code(), "SHOW-C001");
    }

    #[test]
    fn sample_config_fills_every_section() {
        let dir = TestDir::new();
        dir.create_file("config.toml", &make_test_config_toml());

        let config = Config::load_from(&dir.file_path("config.toml")).unwrap();
        assert_eq!(config.general.timeout_seconds, 5);
        assert_eq!(config.general.log_level.as_deref(), Some("debug"));
        assert_eq!(config.worker.version, "v3");
        assert!(config.email.is_configured());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn roundtrip_save_load() {
        let dir = TestDir::new();
        let path = dir.file_path("nested/config.toml");

        let mut config = Config::default();
        config.worker.version = "v2".to_string();
        config.email.to = Some("sales@cars.example".to_string());

        config.save_to(&path).unwrap();
        assert!(dir.file_exists("nested/config.toml"));
        assert!(dir.read_file("nested/config.toml").unwrap().contains("[worker]"));
        let loaded = Config::load_from(&path).unwrap();

        assert_eq!(loaded.worker.version, "v2");
        assert_eq!(loaded.email.to.as_deref(), Some("sales@cars.example"));
    }

    #[test]
    fn offline_page_must_be_precached() {
        let mut config = Config::default();
        config.worker.precache.retain(|p| p != "/offline");
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("worker.offline_page"));
    }

    #[test]
    fn precache_paths_must_be_rooted() {
        let mut config = Config::default();
        config.worker.precache.push("inventory".to_string());
        assert!(config.validate().is_err());
    }

    #[test]
    fn version_must_be_name_safe() {
        let mut config = Config::default();
        config.worker.version = "v 2".to_string();
        assert!(config.validate().is_err());
        config.worker.version = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn origin_must_be_http() {
        let mut config = Config::default();
        config.edge.origin = "ftp://cars.example".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn timeout_bounds() {
        let mut config = Config::default();
        config.general.timeout_seconds = 0;
        assert!(config.validate().is_err());
        config.general.timeout_seconds = 301;
        assert!(config.validate().is_err());
    }

    #[test]
    fn email_configured_needs_key_and_recipient() {
        let mut email = EmailConfig::default();
        assert!(!email.is_configured());
        email.api_key = Some("re_123".to_string());
        assert!(!email.is_configured());
        email.to = Some("sales@cars.example".to_string());
        assert!(email.is_configured());
    }
}
