//! Shared helpers for integration tests.
//!
//! - `fixtures`: origin and collaborator mocks, worker construction
//! - `logger`: per-test structured progress logging
//! - `log_capture`: assertions on tracing output

pub mod fixtures;
pub mod log_capture;
pub mod logger;
