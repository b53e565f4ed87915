//! Structured logging setup.
//!
//! Both servers log every request at `info`, so the default level is `info`.
//! Output goes to stderr unless `SHOWROOM_LOG_FILE` names a file.
//!
//! Level precedence: `--log-level` > `SHOWROOM_LOG` > `[general] log_level`
//! > `info`. `--verbose` raises anything quieter than `debug` to `debug`.
//! `RUST_LOG`, when set, replaces the computed filter entirely.

use std::fs::OpenOptions;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt};

const ENV_LEVEL: &str = "SHOWROOM_LOG";
const ENV_FORMAT: &str = "SHOWROOM_LOG_FORMAT";
const ENV_FILE: &str = "SHOWROOM_LOG_FILE";

/// Dependencies that are chatty below `warn`.
const QUIET_TARGETS: &[&str] = &["hyper", "hyper_util", "reqwest", "rusqlite"];

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Multi-field human-readable lines.
    #[default]
    Human,
    /// One JSON object per event.
    Json,
    /// Terse single lines with targets.
    Compact,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "human" | "pretty" => Ok(Self::Human),
            "json" | "jsonl" => Ok(Self::Json),
            "compact" => Ok(Self::Compact),
            other => Err(format!("unknown log format '{other}'")),
        }
    }
}

/// Minimum level of emitted events.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "trace" => Ok(Self::Trace),
            "debug" | "verbose" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "warn" | "warning" => Ok(Self::Warn),
            "error" | "critical" => Ok(Self::Error),
            other => Err(format!("unknown log level '{other}'")),
        }
    }
}

/// Resolved logging configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogSettings {
    pub level: LogLevel,
    pub format: LogFormat,
    pub file: Option<PathBuf>,
}

impl LogSettings {
    /// Combine CLI flags, `SHOWROOM_LOG*` variables and the config file value.
    ///
    /// Unparseable values are skipped, falling through to the next source.
    #[must_use]
    pub fn resolve(
        cli_level: Option<&str>,
        config_level: Option<&str>,
        json: bool,
        verbose: bool,
    ) -> Self {
        let env_level = env_value(ENV_LEVEL);
        let level = [cli_level, env_level.as_deref(), config_level]
            .into_iter()
            .flatten()
            .find_map(|raw| raw.parse::<LogLevel>().ok())
            .unwrap_or_default();
        let level = if verbose { level.min(LogLevel::Debug) } else { level };

        let format = if json {
            LogFormat::Json
        } else {
            env_value(ENV_FORMAT)
                .and_then(|raw| raw.parse().ok())
                .unwrap_or_default()
        };

        Self {
            level,
            format,
            file: env_value(ENV_FILE).map(PathBuf::from),
        }
    }

    /// Filter directive used when `RUST_LOG` is unset.
    #[must_use]
    pub fn directive(&self) -> String {
        let mut directive = format!("showroom={}", self.level.as_str());
        for target in QUIET_TARGETS {
            directive.push_str(&format!(",{target}=warn"));
        }
        directive
    }
}

fn env_value(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Install the global subscriber.
///
/// Returns `false` if one was already installed; the first one stays. A log
/// file that cannot be opened falls back to stderr.
pub fn init(settings: &LogSettings) -> bool {
    let writer = match settings.file.as_deref().map(|path| {
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| (path.to_path_buf(), e))
    }) {
        Some(Ok(file)) => BoxMakeWriter::new(Arc::new(file)),
        Some(Err((path, e))) => {
            eprintln!("warning: cannot open log file {}: {e}", path.display());
            BoxMakeWriter::new(std::io::stderr)
        }
        None => BoxMakeWriter::new(std::io::stderr),
    };

    let layer: Box<dyn Layer<Registry> + Send + Sync> = match settings.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(false)
            .with_writer(writer)
            .boxed(),
        LogFormat::Compact => fmt::layer().compact().with_writer(writer).boxed(),
        LogFormat::Human => fmt::layer().with_target(false).with_writer(writer).boxed(),
    };

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(settings.directive()));

    tracing_subscriber::registry()
        .with(layer)
        .with(filter)
        .try_init()
        .is_ok()
}
