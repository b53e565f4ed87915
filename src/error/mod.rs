//! Error types for showroom.
//!
//! Uses `thiserror` for structured error types that map to exit codes and
//! HTTP statuses.
//!
//! ## Error Taxonomy
//!
//! Errors are categorized into six main categories:
//! - **Validation**: Malformed or missing form fields, bad worker messages
//! - **Network**: Fetch failures, timeouts, unexpected upstream statuses
//! - **Storage**: Cache store and pending-queue database failures
//! - **Configuration**: Config file parsing, validation, or missing values
//! - **Downstream**: Spreadsheet or email collaborator failures
//! - **Internal**: Unexpected errors, bugs, or unclassified issues
//!
//! Each error has a stable error code (e.g., `SHOW-N001`) for programmatic handling.

use thiserror::Error;

// =============================================================================
// Error Categories
// =============================================================================

/// High-level error categories for classification and routing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Invalid input from a caller (form payloads, worker messages).
    Validation,
    /// Network issues (offline, timeout, DNS, upstream status).
    Network,
    /// Cache store or queue database issues.
    Storage,
    /// Configuration issues (parse errors, invalid values).
    Configuration,
    /// External collaborator issues (spreadsheet, email).
    Downstream,
    /// Internal errors (bugs, unexpected state, unclassified).
    Internal,
}

impl ErrorCategory {
    /// Returns a human-readable description of the category.
    #[must_use]
    pub const fn description(&self) -> &'static str {
        match self {
            Self::Validation => "Validation error",
            Self::Network => "Network error",
            Self::Storage => "Storage error",
            Self::Configuration => "Configuration error",
            Self::Downstream => "Downstream error",
            Self::Internal => "Internal error",
        }
    }

    /// Returns a short code prefix for this category.
    #[must_use]
    pub const fn code_prefix(&self) -> &'static str {
        match self {
            Self::Validation => "V",
            Self::Network => "N",
            Self::Storage => "S",
            Self::Configuration => "C",
            Self::Downstream => "D",
            Self::Internal => "X",
        }
    }
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.description())
    }
}

// =============================================================================
// Exit Codes
// =============================================================================

/// Process exit codes for the `showroom` binary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ExitCode {
    /// Success
    Success = 0,
    /// Unexpected failure
    GeneralError = 1,
    /// Config or input could not be parsed/validated
    ParseError = 3,
    /// Timeout
    Timeout = 4,
    /// Origin unreachable (install or sync could not reach the network)
    Offline = 5,
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> Self {
        code as Self
    }
}

/// A single invalid form field.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct FieldError {
    /// Field name as it appears in the JSON payload.
    pub field: String,
    /// Human-readable reason.
    pub message: String,
}

impl FieldError {
    /// Create a field error.
    #[must_use]
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Main error type for showroom operations.
///
/// Each variant has:
/// - A stable error code (e.g., `SHOW-N001`)
/// - A category for classification
/// - A retryable flag for retry logic
#[derive(Error, Debug)]
pub enum ShowroomError {
    // ==========================================================================
    // Validation errors (Category: Validation)
    // ==========================================================================
    /// Form payload failed schema validation.
    #[error("invalid form data: {} field(s) rejected", errors.len())]
    InvalidForm { errors: Vec<FieldError> },

    /// Request body or message could not be understood.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    // ==========================================================================
    // Network errors (Category: Network)
    // ==========================================================================
    /// The network fetch itself failed (offline, DNS, connection refused).
    #[error("network error fetching {url}: {message}")]
    Network { url: String, message: String },

    /// Request timed out after specified duration.
    #[error("request timeout after {seconds}s for {url}")]
    Timeout { url: String, seconds: u64 },

    /// Upstream answered with a status the caller cannot accept.
    #[error("HTTP {status} from {url}")]
    HttpStatus { url: String, status: u16 },

    // ==========================================================================
    // Cache errors (Category: Storage)
    // ==========================================================================
    /// A precache manifest entry could not be fetched and stored.
    #[error("precache failed for {path}: {reason}")]
    PrecacheFailed { path: String, reason: String },

    /// No worker has been installed for the current version.
    #[error("no cache store installed for version {0}")]
    StoreNotInstalled(String),

    /// Worker is not in a state that allows the requested transition.
    #[error("invalid lifecycle transition: {0}")]
    Lifecycle(String),

    /// Database operation failed.
    #[error("storage error: {0}")]
    Storage(String),

    // ==========================================================================
    // Configuration errors (Category: Configuration)
    // ==========================================================================
    /// Error parsing configuration file.
    #[error("config parse error at {path}: {message}")]
    ConfigParse { path: String, message: String },

    /// Invalid value in configuration.
    #[error("invalid config value for '{key}': {message}")]
    ConfigInvalid { key: String, message: String },

    /// Generic configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    // ==========================================================================
    // Downstream errors (Category: Downstream)
    // ==========================================================================
    /// Spreadsheet append was rejected or unreachable.
    #[error("spreadsheet write failed: {0}")]
    SheetWrite(String),

    /// Email notification was rejected or unreachable.
    #[error("email send failed: {0}")]
    EmailSend(String),

    /// Collaborator is not configured.
    #[error("{0} is not configured")]
    NotConfigured(&'static str),

    // ==========================================================================
    // I/O errors (Category: Internal)
    // ==========================================================================
    /// I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // ==========================================================================
    // Generic wrapper (Category: Internal)
    // ==========================================================================
    /// Catch-all for other errors.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ShowroomError {
    /// Build a network error from a reqwest failure, keeping timeouts distinct.
    #[must_use]
    pub fn from_reqwest(url: &str, err: &reqwest::Error, timeout_secs: u64) -> Self {
        if err.is_timeout() {
            Self::Timeout {
                url: url.to_string(),
                seconds: timeout_secs,
            }
        } else {
            Self::Network {
                url: url.to_string(),
                message: err.to_string(),
            }
        }
    }

    /// Map error to process exit code.
    #[must_use]
    pub const fn exit_code(&self) -> ExitCode {
        match self {
            Self::InvalidForm { .. }
            | Self::InvalidRequest(_)
            | Self::ConfigParse { .. }
            | Self::ConfigInvalid { .. }
            | Self::Config(_)
            | Self::NotConfigured(_) => ExitCode::ParseError,

            Self::Timeout { .. } => ExitCode::Timeout,

            Self::Network { .. } | Self::PrecacheFailed { .. } => ExitCode::Offline,

            Self::HttpStatus { .. }
            | Self::StoreNotInstalled(_)
            | Self::Lifecycle(_)
            | Self::Storage(_)
            | Self::SheetWrite(_)
            | Self::EmailSend(_)
            | Self::Io(_)
            | Self::Json(_)
            | Self::Other(_) => ExitCode::GeneralError,
        }
    }

    /// Returns the error category for classification and routing.
    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidForm { .. } | Self::InvalidRequest(_) => ErrorCategory::Validation,

            Self::Network { .. } | Self::Timeout { .. } | Self::HttpStatus { .. } => {
                ErrorCategory::Network
            }

            Self::PrecacheFailed { .. }
            | Self::StoreNotInstalled(_)
            | Self::Lifecycle(_)
            | Self::Storage(_) => ErrorCategory::Storage,

            Self::ConfigParse { .. } | Self::ConfigInvalid { .. } | Self::Config(_) => {
                ErrorCategory::Configuration
            }

            Self::SheetWrite(_) | Self::EmailSend(_) | Self::NotConfigured(_) => {
                ErrorCategory::Downstream
            }

            Self::Io(_) | Self::Json(_) | Self::Other(_) => ErrorCategory::Internal,
        }
    }

    /// Returns a stable error code for programmatic handling.
    ///
    /// Format: `SHOW-{category}{number}`.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidForm { .. } => "SHOW-V001",
            Self::InvalidRequest(_) => "SHOW-V002",

            Self::Network { .. } => "SHOW-N001",
            Self::Timeout { .. } => "SHOW-N002",
            Self::HttpStatus { .. } => "SHOW-N003",

            Self::PrecacheFailed { .. } => "SHOW-S001",
            Self::StoreNotInstalled(_) => "SHOW-S002",
            Self::Lifecycle(_) => "SHOW-S003",
            Self::Storage(_) => "SHOW-S099",

            Self::ConfigParse { .. } => "SHOW-C001",
            Self::ConfigInvalid { .. } => "SHOW-C002",
            Self::Config(_) => "SHOW-C099",

            Self::SheetWrite(_) => "SHOW-D001",
            Self::EmailSend(_) => "SHOW-D002",
            Self::NotConfigured(_) => "SHOW-D003",

            Self::Io(_) => "SHOW-X001",
            Self::Json(_) => "SHOW-X002",
            Self::Other(_) => "SHOW-X099",
        }
    }

    /// Returns whether the error is potentially recoverable by retrying.
    ///
    /// Validation errors are never retried.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Network { .. }
                | Self::Timeout { .. }
                | Self::SheetWrite(_)
                | Self::EmailSend(_)
        )
    }

    /// Whether this error means the network could not be reached at all.
    ///
    /// HTTP error statuses are responses, not connectivity failures.
    #[must_use]
    pub const fn is_connectivity(&self) -> bool {
        matches!(self, Self::Network { .. } | Self::Timeout { .. })
    }

    /// HTTP status to answer with when this error reaches a server boundary.
    #[must_use]
    pub const fn http_status(&self) -> u16 {
        match self {
            Self::InvalidForm { .. } | Self::InvalidRequest(_) => 400,
            Self::Timeout { .. } => 504,
            Self::Network { .. } | Self::HttpStatus { .. } => 502,
            Self::NotConfigured(_) => 503,
            _ => 500,
        }
    }
}

/// Result type alias for showroom operations.
pub type Result<T> = std::result::Result<T, ShowroomError>;
