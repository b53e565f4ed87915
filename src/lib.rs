//! showroom - lead capture API and offline-first edge cache.
//!
//! The lead API validates inquiry, booking and credit-application forms and
//! forwards them to a spreadsheet webhook and an email API. The edge worker
//! fronts the site with versioned response stores, three caching strategies
//! and a queue that replays form posts made while offline.

// Note: deny (not forbid) to allow #[allow(unsafe_code)] in test helpers for env var manipulation
#![deny(unsafe_code)]
#![warn(clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod cli;
pub mod core;
pub mod error;
pub mod leads;
pub mod server;
pub mod storage;
pub mod worker;

/// Test utilities module - included in test builds or when test-utils feature is enabled.
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use error::{ExitCode, Result, ShowroomError};

// Re-export test utilities for external test crates
#[cfg(any(test, feature = "test-utils"))]
pub use test_utils::*;
